//! Core module - Business logic
//!
//! Tariff arithmetic, trip history, factor learning and prediction.
//! Nothing here touches the terminal or the config files.

pub mod engine;
pub mod error;
pub mod geo;
pub mod learner;
pub mod predictor;
pub mod route;
pub mod storage;
pub mod tariff;
pub mod trip;
pub mod trip_store;
