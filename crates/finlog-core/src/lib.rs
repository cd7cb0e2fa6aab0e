//! Core types and traits for finlog storage backends.
//!
//! This crate provides the `KeyValueStore` trait and the domain model for
//! financial records, enabling pluggable persistence implementations while
//! keeping the analytics engines free of storage concerns.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{FinancialRecord, MonthlyAggregate, RecordKind, YearSeries, MONTH_NAMES};
pub use models::write::RecordDraft;
pub use storage::{KeyValueStore, StorageError};
