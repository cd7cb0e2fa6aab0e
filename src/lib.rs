//! finlog: a personal/small-business finance tracker core.
//!
//! Records monthly revenue and expense entries in a pluggable key-value
//! store with backup rotation and corruption recovery, and derives
//! statistics, trends, forecasts and anomaly flags that a presentation
//! layer renders. All engine output is plain data.

pub mod anomaly;
pub mod config;
pub mod export;
pub mod file_storage;
pub mod forecast;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tasks;

pub use finlog_core::{FinancialRecord, MonthlyAggregate, RecordDraft, RecordKind, YearSeries};
