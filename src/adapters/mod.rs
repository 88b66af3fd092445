//! Concrete adapter implementations for ports.

pub mod console_notifier;
pub mod csv_adapter;
pub mod csv_ledger_adapter;
pub mod file_config_adapter;
pub mod http_data_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod telegram_adapter;
