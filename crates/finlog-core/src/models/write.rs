use rust_decimal::Decimal;
use time::Date;

use super::RecordKind;

/// Write model for the record store. The store assigns the id and the
/// created/updated timestamps on save when they are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub id: Option<String>,
    pub date: Date,
    pub kind: RecordKind,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
}

impl RecordDraft {
    pub fn new(date: Date, kind: RecordKind, amount: Decimal, category: impl Into<String>) -> Self {
        Self {
            id: None,
            date,
            kind,
            amount,
            category: category.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
