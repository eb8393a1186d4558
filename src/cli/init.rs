//! `farefriend init` command
//!
//! # Usage
//! ```bash
//! farefriend init                    # Initialize in current directory
//! farefriend init /path/to/project   # Initialize in specific path
//! farefriend init --global           # Initialize global ~/.farefriend
//! ```

use anyhow::{bail, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, DIR_NAME};
use crate::core::storage::SqliteStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Initialize global config (~/.farefriend)
    #[arg(long)]
    pub global: bool,

    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let base_path = if args.global {
        directories::UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        args.path.unwrap_or_else(|| PathBuf::from("."))
    };

    let dir = base_path.join(DIR_NAME);

    if is_repo(&base_path) && !args.force {
        bail!(
            "Directory {} is already a farefriend repository. Use --force to reinitialize.",
            base_path.display()
        );
    }

    println!("🛺 Initializing farefriend in: {}", base_path.display());

    fs::create_dir_all(&dir)?;

    let config_path = dir.join("config.toml");
    Config::default().save_to(&config_path)?;

    // Opening the store creates the schema
    let db_path = dir.join("data.db");
    SqliteStore::open(&db_path)?;

    println!("\n✅ Initialized farefriend repository");
    println!("   Config: {}", config_path.display());
    println!("   Database: {}", db_path.display());
    println!("\nNext steps:");
    println!("  farefriend estimate \"Bandra Station\" \"Carter Road\" --distance 3.2");
    println!("  farefriend report #0 70");
    println!("  farefriend history \"Bandra Station\" \"Carter Road\"");

    Ok(())
}

fn is_repo(path: &Path) -> bool {
    path.join(DIR_NAME).exists()
}
