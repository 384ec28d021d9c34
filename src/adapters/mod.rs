//! Concrete adapter implementations for ports.

pub mod console_report;
pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod reference_cache;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod twse_adapter;
pub mod twse_isin_adapter;
