//! Core domain types and logic.

pub mod analysis;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod indicator_set;
pub mod industry;
pub mod ohlcv;
pub mod series;
pub mod signal;
