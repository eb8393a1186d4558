//! `farefriend config` command
//!
//! Get or set configuration values.
//!
//! # Usage
//! ```bash
//! farefriend config                          # Show all config
//! farefriend config tariff.per_km_rate       # Get specific value
//! farefriend config tariff.per_km_rate 18.5  # Set value
//! farefriend config --path                   # Show config locations
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use toml_edit::{DocumentMut, Item, Value};

use super::utils::find_farefriend_dir;
use crate::config::{Config, DIR_NAME};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config key (e.g., tariff.per_km_rate, locale.utc_offset_minutes)
    pub key: Option<String>,

    /// Value to set
    pub value: Option<String>,

    /// List all config values
    #[arg(long)]
    pub list: bool,

    /// Show config file path
    #[arg(long)]
    pub path: bool,

    /// Use global config (~/.farefriend/config.toml) instead of local
    #[arg(short, long)]
    pub global: bool,
}

fn global_config_path() -> PathBuf {
    Config::global_config_path().unwrap_or_else(|| PathBuf::from(DIR_NAME).join("config.toml"))
}

fn local_config_path() -> PathBuf {
    find_farefriend_dir()
        .unwrap_or_else(|_| PathBuf::from(DIR_NAME))
        .join("config.toml")
}

pub fn run(args: ConfigArgs, explicit: Option<&Path>) -> Result<()> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None if args.global => global_config_path(),
        None => local_config_path(),
    };

    if args.path {
        println!("Global: {}", global_config_path().display());
        println!("Local:  {}", local_config_path().display());
        println!();
        if config_path.exists() {
            println!("✓ Active: {}", config_path.display());
        } else {
            println!("⚠ No config file found at {}", config_path.display());
        }
        return Ok(());
    }

    if args.list || (args.key.is_none() && args.value.is_none()) {
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            println!("📋 Configuration ({}):\n", config_path.display());
            println!("{}", content);
        } else {
            println!("📋 No config file at {}, using defaults:\n", config_path.display());
            println!("{}", toml::to_string_pretty(&Config::default())?);
        }
        return Ok(());
    }

    if let Some(key) = &args.key {
        if let Some(value) = &args.value {
            set_config_value(&config_path, key, value)?;
            println!("✅ Set {} = {} (in {})", key, value, config_path.display());
        } else {
            match get_config_value(&config_path, key)? {
                Some(v) => println!("{}", v),
                None => println!("(not set)"),
            }
        }
    }

    Ok(())
}

/// Set a nested config value using dot notation (e.g., "tariff.night_window.start_hour").
///
/// The edited file must still load as a valid config, otherwise nothing is written.
fn set_config_value(path: &Path, key: &str, val: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = content.parse().context("Failed to parse config.toml")?;

    let parts: Vec<&str> = key.split('.').collect();
    let Some((last, sections)) = parts.split_last() else {
        bail!("Empty config key");
    };
    if sections.is_empty() {
        bail!("Key must name a section: {} (e.g. tariff.{})", key, key);
    }
    if sections.len() > 2 {
        bail!("Key too deep: {}. Max depth is section.group.key", key);
    }

    let mut table: &mut Item = doc.as_item_mut();
    for section in sections {
        if table.get(section).is_none() {
            table[section] = toml_edit::table();
        }
        table = &mut table[section];
        if !table.is_table_like() {
            bail!("{} is a value, not a section", section);
        }
    }
    table[last] = toml_edit::value(parse_toml_value(val));

    let updated = doc.to_string();
    toml::from_str::<Config>(&updated)
        .map_err(anyhow::Error::from)
        .and_then(|config| config.validate())
        .with_context(|| format!("Invalid value for {}: {}", key, val))?;

    fs::write(path, updated)?;
    Ok(())
}

/// Get a config value by dot notation key
fn get_config_value(path: &Path, key: &str) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let doc: toml::Value = content.parse().context("Failed to parse config.toml")?;

    let val = key
        .split('.')
        .try_fold(&doc, |node, part| node.get(part));

    Ok(val.map(|v| match v {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }))
}

/// Parse string value to appropriate TOML type
fn parse_toml_value(s: &str) -> Value {
    if let Ok(b) = s.parse::<bool>() {
        return Value::from(b);
    }

    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }

    if let Ok(f) = s.parse::<f64>() {
        return Value::from(f);
    }

    Value::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");

        set_config_value(&path, "tariff.per_km_rate", "18.5")?;
        set_config_value(&path, "tariff.night_window.start_hour", "22")?;

        assert_eq!(get_config_value(&path, "tariff.per_km_rate")?, Some("18.5".into()));
        assert_eq!(
            get_config_value(&path, "tariff.night_window.start_hour")?,
            Some("22".into())
        );

        let config = Config::load_from(&path)?;
        assert_eq!(config.tariff.per_km_rate, 18.5);
        assert_eq!(config.tariff.night_window.start_hour, 22);
        assert_eq!(config.tariff.night_window.end_hour, 5);
        Ok(())
    }

    #[test]
    fn test_invalid_value_is_not_written() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");

        assert!(set_config_value(&path, "learning.min_reports", "lots").is_err());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_inverted_factor_bounds_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        set_config_value(&path, "learning.max_factor", "2.5")?;

        // min_factor 3 would exceed max_factor 2.5
        let err = set_config_value(&path, "learning.min_factor", "3").unwrap_err();
        assert!(format!("{:#}", err).contains("min_factor"));

        assert_eq!(get_config_value(&path, "learning.min_factor")?, None);
        assert_eq!(Config::load_from(&path)?.learning.max_factor, 2.5);
        Ok(())
    }

    #[test]
    fn test_parse_toml_value() {
        assert_eq!(parse_toml_value("true").as_bool(), Some(true));
        assert_eq!(parse_toml_value("3").as_integer(), Some(3));
        assert_eq!(parse_toml_value("2.6").as_float(), Some(2.6));
        assert_eq!(parse_toml_value("IST").as_str(), Some("IST"));
    }
}
