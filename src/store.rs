use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use finlog_core::storage::{KeyValueStore, StorageError};
use finlog_core::{FinancialRecord, RecordDraft, RecordKind, YearSeries};

use crate::scheduler::Clock;

const STATE_VERSION: u32 = 1;
const FUTURE_WINDOW_DAYS: i64 = 30;
const MAX_AMOUNT: Decimal = dec!(1_000_000);
const DEFAULT_CATEGORY: &str = "general";

static DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key namespace: the primary blob lives at `<ns>_records`, backups at
    /// `<ns>_backup_<epoch-millis>`, transient caches at `<ns>_cache_*`.
    pub namespace: String,
    pub cache_ttl: Duration,
    pub max_backups: usize,
    pub max_record_age_days: i64,
    /// Expenses above this amount are flagged for review (warning only).
    pub review_threshold: Decimal,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "finlog".to_string(),
            cache_ttl: Duration::minutes(5),
            max_backups: 5,
            max_record_age_days: 3650,
            review_threshold: dec!(50_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub code: &'static str,
    pub message: String,
}

/// Outcome of validating a draft: every violated rule, not just the first.
/// Warnings never block a save.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Validation(Vec<ValidationError>),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub enum StoreEvent {
    DataUpdated { record: FinancialRecord },
    DataRemoved { id: String },
}

pub trait StoreObserver: Send + Sync {
    fn on_event(&self, event: &StoreEvent);
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Substring match against description and category.
    pub text: Option<String>,
    pub kind: Option<RecordKind>,
    pub category: Option<String>,
    pub from: Option<Date>,
    pub to: Option<Date>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

struct CachedSnapshot {
    records: Vec<FinancialRecord>,
    loaded_at: OffsetDateTime,
}

#[derive(Serialize)]
struct StoredState<'a> {
    version: u32,
    records: &'a [FinancialRecord],
}

/// Owns the canonical record collection: validation, persistence, backup
/// rotation, corruption recovery, and observer fan-out. All state lives on
/// this struct; construction and teardown are explicit.
pub struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    cache: RwLock<Option<CachedSnapshot>>,
    observers: RwLock<Vec<(String, Arc<dyn StoreObserver>)>>,
}

impl RecordStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: StoreConfig) -> Self {
        Self {
            kv,
            clock,
            config,
            cache: RwLock::new(None),
            observers: RwLock::new(Vec::new()),
        }
    }

    fn records_key(&self) -> String {
        format!("{}_records", self.config.namespace)
    }

    fn backup_prefix(&self) -> String {
        format!("{}_backup_", self.config.namespace)
    }

    fn cache_prefix(&self) -> String {
        format!("{}_cache_", self.config.namespace)
    }

    pub fn register_observer(&self, name: impl Into<String>, observer: Arc<dyn StoreObserver>) {
        self.observers.write().unwrap().push((name.into(), observer));
    }

    fn notify(&self, event: &StoreEvent) {
        let observers = self.observers.read().unwrap();
        for (name, observer) in observers.iter() {
            // One misbehaving observer must not block the others
            let observer = observer.clone();
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(event))).is_err() {
                tracing::warn!(observer = %name, "observer panicked during notification");
            }
        }
    }

    /// Collects every violated rule for a draft against the current
    /// collection. Duplicate `(date, amount, kind)` triples and oversized
    /// expenses come back as warnings, not rejections.
    pub fn validate(&self, draft: &RecordDraft, existing: &[FinancialRecord]) -> ValidationReport {
        let mut report = ValidationReport::default();
        let today = self.clock.now().date();

        if draft.amount < Decimal::ZERO {
            report.errors.push(ValidationError {
                field: "amount",
                message: "amount must not be negative".to_string(),
            });
        }
        if draft.amount > MAX_AMOUNT {
            report.errors.push(ValidationError {
                field: "amount",
                message: format!("amount must not exceed {}", MAX_AMOUNT),
            });
        }

        let category_len = draft.category.trim().chars().count();
        if !(2..=50).contains(&category_len) {
            report.errors.push(ValidationError {
                field: "category",
                message: "category must be between 2 and 50 characters".to_string(),
            });
        }
        if draft.description.chars().count() > 200 {
            report.errors.push(ValidationError {
                field: "description",
                message: "description must not exceed 200 characters".to_string(),
            });
        }

        if draft.date > today + Duration::days(FUTURE_WINDOW_DAYS) {
            report.errors.push(ValidationError {
                field: "date",
                message: format!(
                    "date must not be more than {} days in the future",
                    FUTURE_WINDOW_DAYS
                ),
            });
        }
        if draft.date < today - Duration::days(self.config.max_record_age_days) {
            report.errors.push(ValidationError {
                field: "date",
                message: format!(
                    "date must not be more than {} days in the past",
                    self.config.max_record_age_days
                ),
            });
        }

        if draft.kind == RecordKind::Expense && draft.amount > self.config.review_threshold {
            report.warnings.push(ValidationWarning {
                code: "review",
                message: format!(
                    "expense of {} exceeds the review threshold of {}",
                    draft.amount, self.config.review_threshold
                ),
            });
        }

        let is_duplicate = existing.iter().any(|r| {
            r.date == draft.date
                && r.amount == draft.amount
                && r.kind == draft.kind
                && draft.id.as_deref() != Some(r.id.as_str())
        });
        if is_duplicate {
            report.warnings.push(ValidationWarning {
                code: "duplicate",
                message: format!(
                    "a {} record for {} with amount {} already exists",
                    draft.kind, draft.date, draft.amount
                ),
            });
        }

        report
    }

    /// Validates and upserts a record, persists the full collection, writes
    /// a timestamped backup, prunes old backups, invalidates the cache and
    /// notifies observers.
    pub fn save(&self, draft: RecordDraft) -> Result<FinancialRecord, StoreError> {
        let mut records = self.load_or_recover()?;

        let report = self.validate(&draft, &records);
        if !report.is_valid() {
            return Err(StoreError::Validation(report.errors));
        }
        for warning in &report.warnings {
            tracing::warn!(code = warning.code, "{}", warning.message);
        }

        let now = self.clock.now();
        let id = draft
            .id
            .clone()
            .unwrap_or_else(|| generate_id(now));

        let record = match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                existing.date = draft.date;
                existing.kind = draft.kind;
                existing.amount = draft.amount;
                existing.category = draft.category;
                existing.description = draft.description;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let record = FinancialRecord {
                    id,
                    date: draft.date,
                    kind: draft.kind,
                    amount: draft.amount,
                    category: draft.category,
                    description: draft.description,
                    created_at: now,
                    updated_at: now,
                };
                records.push(record.clone());
                record
            }
        };

        self.persist(&records)?;
        self.invalidate_cache();
        self.notify(&StoreEvent::DataUpdated {
            record: record.clone(),
        });

        Ok(record)
    }

    /// Deletes a record by id. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.load_or_recover()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }

        self.persist(&records)?;
        self.invalidate_cache();
        self.notify(&StoreEvent::DataRemoved { id: id.to_string() });
        Ok(true)
    }

    /// Returns the collection, serving a cached snapshot while it is
    /// younger than the configured TTL. A corrupt primary blob falls back
    /// to the newest readable backup; with nothing recoverable the result
    /// is empty, never an error.
    pub fn get_all(&self) -> Result<Vec<FinancialRecord>, StoreError> {
        {
            let cache = self.cache.read().unwrap();
            if let Some(snapshot) = cache.as_ref() {
                if self.clock.now() - snapshot.loaded_at < self.config.cache_ttl {
                    return Ok(snapshot.records.clone());
                }
            }
        }

        let records = self.load_or_recover()?;
        *self.cache.write().unwrap() = Some(CachedSnapshot {
            records: records.clone(),
            loaded_at: self.clock.now(),
        });
        Ok(records)
    }

    /// Order-preserving predicate composition over the collection.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<FinancialRecord>, StoreError> {
        let needle = filter.text.as_ref().map(|t| t.to_lowercase());
        let category = filter.category.as_ref().map(|c| c.to_lowercase());

        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| match &needle {
                Some(text) => {
                    r.description.to_lowercase().contains(text)
                        || r.category.to_lowercase().contains(text)
                }
                None => true,
            })
            .filter(|r| filter.kind.map_or(true, |k| r.kind == k))
            .filter(|r| {
                category
                    .as_ref()
                    .map_or(true, |c| r.category.to_lowercase() == *c)
            })
            .filter(|r| filter.from.map_or(true, |d| r.date >= d))
            .filter(|r| filter.to.map_or(true, |d| r.date <= d))
            .filter(|r| filter.min_amount.map_or(true, |a| r.amount >= a))
            .filter(|r| filter.max_amount.map_or(true, |a| r.amount <= a))
            .collect())
    }

    pub fn year_series(&self, year: i32) -> Result<YearSeries, StoreError> {
        Ok(YearSeries::from_records(year, &self.get_all()?))
    }

    /// Writes a backup of the current collection without touching the
    /// primary blob. Exposed for the scheduler's periodic snapshot task.
    pub fn snapshot_backup(&self) -> Result<(), StoreError> {
        let records = self.load_or_recover()?;
        let payload = encode_state(&records)?;
        self.write_backup(&payload);
        Ok(())
    }

    fn persist(&self, records: &[FinancialRecord]) -> Result<(), StoreError> {
        let payload = encode_state(records)?;
        self.set_with_recovery(&self.records_key(), &payload)?;
        self.write_backup(&payload);
        Ok(())
    }

    /// A failed write triggers an emergency cleanup of transient cache keys
    /// and exactly one retry before the error surfaces.
    fn set_with_recovery(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self.kv.set(key, value) {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(error = %first, "persist failed, clearing transient keys and retrying");
                if let Ok(keys) = self.kv.keys_with_prefix(&self.cache_prefix()) {
                    for stale in keys {
                        let _ = self.kv.remove(&stale);
                    }
                }
                self.kv.set(key, value)
            }
        }
    }

    /// Backup failures are logged but never fail the save: the primary blob
    /// is already durable at this point.
    fn write_backup(&self, payload: &str) {
        let key = format!("{}{}", self.backup_prefix(), epoch_millis(self.clock.now()));
        if let Err(e) = self.kv.set(&key, payload) {
            tracing::warn!(error = %e, "backup write failed");
            return;
        }
        if let Err(e) = self.prune_backups() {
            tracing::warn!(error = %e, "backup pruning failed");
        }
    }

    fn prune_backups(&self) -> Result<(), StorageError> {
        let keys = self.kv.keys_with_prefix(&self.backup_prefix())?;
        if keys.len() <= self.config.max_backups {
            return Ok(());
        }
        // Keys embed epoch millis, so ascending key order is oldest first
        for stale in &keys[..keys.len() - self.config.max_backups] {
            self.kv.remove(stale)?;
            tracing::debug!(key = %stale, "pruned backup");
        }
        Ok(())
    }

    fn invalidate_cache(&self) {
        *self.cache.write().unwrap() = None;
    }

    fn load_or_recover(&self) -> Result<Vec<FinancialRecord>, StoreError> {
        let now = self.clock.now();
        match self.kv.get(&self.records_key())? {
            None => Ok(Vec::new()),
            Some(raw) => match parse_state(&raw, now) {
                Ok(records) => Ok(records),
                Err(reason) => {
                    tracing::warn!(%reason, "primary store corrupt, attempting backup recovery");
                    self.recover_from_backups(now)
                }
            },
        }
    }

    fn recover_from_backups(&self, now: OffsetDateTime) -> Result<Vec<FinancialRecord>, StoreError> {
        let keys = self.kv.keys_with_prefix(&self.backup_prefix())?;
        for key in keys.iter().rev() {
            let Some(raw) = self.kv.get(key)? else {
                continue;
            };
            match parse_state(&raw, now) {
                Ok(records) => {
                    tracing::info!(backup = %key, count = records.len(), "recovered from backup");
                    return Ok(records);
                }
                Err(reason) => {
                    tracing::warn!(backup = %key, %reason, "backup unreadable, trying older one");
                }
            }
        }
        tracing::warn!("no readable backup found, starting from an empty collection");
        Ok(Vec::new())
    }
}

fn encode_state(records: &[FinancialRecord]) -> Result<String, StoreError> {
    serde_json::to_string(&StoredState {
        version: STATE_VERSION,
        records,
    })
    .map_err(|e| StoreError::Storage(StorageError::Serialization(e.to_string())))
}

/// Parses a persisted blob, migrating the legacy bare-array shape (v0) and
/// sanitizing every entry: records missing amount, date or kind are
/// dropped; recoverable fields are coerced.
fn parse_state(raw: &str, now: OffsetDateTime) -> Result<Vec<FinancialRecord>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    let items = match value {
        Value::Object(ref map) => {
            let version = map.get("version").and_then(Value::as_u64).unwrap_or(0);
            if version > u64::from(STATE_VERSION) {
                return Err(format!("unsupported store version {}", version));
            }
            map.get("records")
                .and_then(Value::as_array)
                .ok_or("missing records array")?
                .clone()
        }
        Value::Array(items) => {
            tracing::debug!("migrating legacy store blob without version field");
            items
        }
        _ => return Err("unexpected store shape".to_string()),
    };

    Ok(items
        .iter()
        .filter_map(|item| sanitize_record(item, now))
        .collect())
}

fn sanitize_record(value: &Value, now: OffsetDateTime) -> Option<FinancialRecord> {
    let obj = value.as_object()?;

    let date_raw = obj.get("date")?.as_str()?;
    let date = Date::parse(date_raw.get(..10)?, DATE_FORMAT).ok()?;

    // Legacy blobs call the field "type"
    let kind_raw = obj.get("kind").or_else(|| obj.get("type"))?.as_str()?;
    let kind = RecordKind::from_str(kind_raw).ok()?;

    let amount = match obj.get("amount")? {
        Value::Number(n) => Decimal::from_f64_retain(n.as_f64()?)?,
        Value::String(s) => Decimal::from_str(s).ok()?,
        _ => return None,
    };

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| generate_id(now));

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let timestamp = |field: &str| {
        obj.get(field)
            .and_then(Value::as_i64)
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
            .unwrap_or(now)
    };

    Some(FinancialRecord {
        id,
        date,
        kind,
        amount,
        category,
        description,
        created_at: timestamp("created_at"),
        updated_at: timestamp("updated_at"),
    })
}

fn epoch_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Time-based id with a random suffix; collision probability is treated as
/// negligible.
fn generate_id(now: OffsetDateTime) -> String {
    format!("{}-{}", epoch_millis(now), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn sanitize_coerces_legacy_fields() {
        let raw = serde_json::json!({
            "date": "2023-04-05T12:00:00Z",
            "type": "REVENUE",
            "amount": "1250.50",
            "category": "  ",
        });
        let record = sanitize_record(&raw, now()).unwrap();
        assert_eq!(record.date.to_string(), "2023-04-05");
        assert_eq!(record.kind, RecordKind::Revenue);
        assert_eq!(record.amount, dec!(1250.50));
        assert_eq!(record.category, "general");
        assert!(!record.id.is_empty());
    }

    #[test]
    fn sanitize_drops_records_missing_required_fields() {
        let missing_amount = serde_json::json!({"date": "2023-04-05", "kind": "expense"});
        let missing_date = serde_json::json!({"kind": "expense", "amount": 10});
        let bad_kind = serde_json::json!({"date": "2023-04-05", "kind": "transfer", "amount": 10});
        assert!(sanitize_record(&missing_amount, now()).is_none());
        assert!(sanitize_record(&missing_date, now()).is_none());
        assert!(sanitize_record(&bad_kind, now()).is_none());
    }

    #[test]
    fn parse_state_accepts_legacy_bare_array() {
        let raw = r#"[{"date":"2023-01-02","type":"expense","amount":42.0}]"#;
        let records = parse_state(raw, now()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::Expense);
    }

    #[test]
    fn parse_state_rejects_future_versions() {
        let raw = r#"{"version": 99, "records": []}"#;
        assert!(parse_state(raw, now()).is_err());
    }

    #[test]
    fn generated_ids_are_time_prefixed_and_unique() {
        let a = generate_id(now());
        let b = generate_id(now());
        assert!(a.starts_with("1700000000000-"));
        assert_ne!(a, b);
    }
}
