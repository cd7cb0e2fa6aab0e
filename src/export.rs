use finlog_core::{FinancialRecord, YearSeries, MONTH_NAMES};

/// Spreadsheet-friendly CSV: UTF-8 BOM so older spreadsheet imports detect
/// the encoding, semicolon delimiter, `\r\n` line endings.
const BOM: &str = "\u{feff}";
const DELIMITER: char = ';';

fn field(raw: &str) -> String {
    if raw.contains(DELIMITER) || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn line(fields: &[String]) -> String {
    let mut out = fields.join(&DELIMITER.to_string());
    out.push_str("\r\n");
    out
}

pub fn records_csv(records: &[FinancialRecord]) -> String {
    let mut out = String::from(BOM);
    out.push_str(&line(&[
        "Date".to_string(),
        "Type".to_string(),
        "Amount".to_string(),
        "Category".to_string(),
        "Description".to_string(),
    ]));
    for record in records {
        out.push_str(&line(&[
            record.date.to_string(),
            record.kind.to_string(),
            record.amount.to_string(),
            field(&record.category),
            field(&record.description),
        ]));
    }
    out
}

pub fn monthly_summary_csv(series: &YearSeries) -> String {
    let mut out = String::from(BOM);
    out.push_str(&line(&[
        "Month".to_string(),
        "Revenue".to_string(),
        "Losses".to_string(),
        "Purchases".to_string(),
        "Net".to_string(),
    ]));
    for m in &series.months {
        out.push_str(&line(&[
            MONTH_NAMES[m.month as usize].to_string(),
            m.revenue.to_string(),
            m.losses.to_string(),
            m.purchases.to_string(),
            m.net().to_string(),
        ]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use finlog_core::{RecordKind, YearSeries};
    use rust_decimal_macros::dec;
    use time::macros::date;
    use time::OffsetDateTime;

    fn record(description: &str, category: &str) -> FinancialRecord {
        FinancialRecord {
            id: "r1".to_string(),
            date: date!(2023 - 06 - 15),
            kind: RecordKind::Expense,
            amount: dec!(99.95),
            category: category.to_string(),
            description: description.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn starts_with_bom_and_header() {
        let csv = records_csv(&[]);
        assert!(csv.starts_with('\u{feff}'));
        assert!(csv.contains("Date;Type;Amount;Category;Description"));
    }

    #[test]
    fn quotes_fields_containing_delimiter_or_quotes() {
        let csv = records_csv(&[record("lunch; with client", "office")]);
        assert!(csv.contains("\"lunch; with client\""));

        let csv = records_csv(&[record("said \"hello\"", "office")]);
        assert!(csv.contains("\"said \"\"hello\"\"\""));

        let csv = records_csv(&[record("line\nbreak", "office")]);
        assert!(csv.contains("\"line\nbreak\""));
    }

    #[test]
    fn plain_fields_stay_unquoted() {
        let csv = records_csv(&[record("plain", "office")]);
        assert!(csv.contains("2023-06-15;expense;99.95;office;plain\r\n"));
    }

    #[test]
    fn monthly_summary_lists_all_twelve_months() {
        let csv = monthly_summary_csv(&YearSeries::empty(2023));
        assert_eq!(csv.matches("\r\n").count(), 13);
        assert!(csv.contains("January;0;0;0;0"));
        assert!(csv.contains("December;0;0;0;0"));
    }
}
