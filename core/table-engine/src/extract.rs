//! FILENAME: core/table-engine/src/extract.rs
//! PURPOSE: Converts raw cell text into a typed value.
//! CONTEXT: Coercion never fails. Text that does not match the column's
//! format becomes `TypedValue::Empty`, which renders as an empty string and
//! sorts first.

use crate::schema::ColumnDescriptor;
use engine::{ColumnType, TypedValue};

pub fn extract_value(raw: &str, column: &ColumnDescriptor) -> TypedValue {
    match column.kind {
        ColumnType::String => TypedValue::Text(raw.to_string()),
        ColumnType::Number => {
            let spec = &column.formats.number;
            match spec.parse_text(raw) {
                Some(value) => TypedValue::Number {
                    value,
                    kind: spec.kind(),
                },
                None => TypedValue::Empty,
            }
        }
        ColumnType::Boolean => {
            TypedValue::Boolean(raw.trim().to_lowercase() == column.yes_token().trim().to_lowercase())
        }
        ColumnType::Date => {
            let format = column.field_format();
            format
                .parse_date(raw)
                .map(|value| TypedValue::Date {
                    value,
                    format: format.clone(),
                })
                .unwrap_or_default()
        }
        ColumnType::Time => {
            let format = column.field_format();
            format
                .parse_time(raw)
                .map(|value| TypedValue::Time {
                    value,
                    format: format.clone(),
                })
                .unwrap_or_default()
        }
        ColumnType::DateTime => {
            let format = column.field_format();
            format
                .parse_datetime(raw)
                .map(|value| TypedValue::DateTime {
                    value,
                    format: format.clone(),
                })
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ColumnConfig, TableConfig};
    use crate::formatter::format_default;
    use crate::schema::derive_columns;
    use chrono::{NaiveDate, NaiveTime};
    use engine::NumberKind;
    use rustc_hash::FxHashMap;

    fn column(json: &str) -> ColumnDescriptor {
        let config: ColumnConfig = serde_json::from_str(json).unwrap();
        let table = TableConfig::default().with_column("C", config);
        let (mut columns, _) = derive_columns(&["C".to_string()], &table, &FxHashMap::default());
        columns.remove(0)
    }

    #[test]
    fn strings_pass_through() {
        let c = column(r#"{}"#);
        assert_eq!(extract_value("  keep me ", &c), TypedValue::text("  keep me "));
    }

    #[test]
    fn numbers_parse_with_the_column_pattern() {
        let c = column(r##"{ "type": "number", "number-format": "#.##0,00 €" }"##);
        assert_eq!(
            extract_value("1.234,50 €", &c),
            TypedValue::Number {
                value: 1234.5,
                kind: NumberKind::Currency("€".into())
            }
        );
        assert_eq!(extract_value("n/a", &c), TypedValue::Empty);
        assert_eq!(extract_value("", &c), TypedValue::Empty);
    }

    #[test]
    fn percent_divides_by_hundred() {
        let c = column(r#"{ "type": "number", "number-format": "0%" }"#);
        assert_eq!(extract_value("45%", &c).as_number(), Some(0.45));
    }

    #[test]
    fn booleans_match_the_yes_token() {
        let c = column(r#"{ "type": "boolean", "yes-format": "Y", "no-format": "N" }"#);
        assert_eq!(extract_value("Y", &c), TypedValue::Boolean(true));
        assert_eq!(extract_value(" y ", &c), TypedValue::Boolean(true));
        assert_eq!(extract_value("N", &c), TypedValue::Boolean(false));
        assert_eq!(extract_value("", &c), TypedValue::Boolean(false));
    }

    #[test]
    fn dates_use_the_resolved_format() {
        let c = column(r#"{ "type": "date", "date-format": "DD.MM.YYYY" }"#);
        let value = extract_value("05.03.2024", &c);
        assert_eq!(
            value,
            TypedValue::Date {
                value: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                format: c.field_format().clone(),
            }
        );
        assert_eq!(extract_value("2024-03-05", &c), TypedValue::Empty);
    }

    #[test]
    fn times_ignore_the_date_format() {
        let c = column(r#"{ "type": "time", "date-format": "DD.MM.YYYY" }"#);
        match extract_value("09:45", &c) {
            TypedValue::Time { value, .. } => {
                assert_eq!(value, NaiveTime::from_hms_opt(9, 45, 0).unwrap())
            }
            other => panic!("Expected time, got {:?}", other),
        }
    }

    #[test]
    fn datetime_accepts_date_only_text() {
        let c = column(r#"{ "type": "datetime" }"#);
        match extract_value("2024-01-02", &c) {
            TypedValue::DateTime { value, .. } => {
                assert_eq!(value.to_string(), "2024-01-02 00:00:00")
            }
            other => panic!("Expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn formatted_values_extract_back_equal() {
        let number = column(r##"{ "type": "number", "number-format": "$#,##0.00" }"##);
        let value = extract_value("$9,876.50", &number);
        assert_eq!(extract_value(&format_default(&value, &number), &number), value);

        let date = column(r#"{ "type": "date", "date-format": "MMM D, YYYY" }"#);
        let value = extract_value("Jul 4, 2021", &date);
        assert!(!value.is_empty());
        assert_eq!(extract_value(&format_default(&value, &date), &date), value);

        let flag = column(r#"{ "type": "boolean", "yes-format": "on", "no-format": "off" }"#);
        for b in [true, false] {
            let value = TypedValue::Boolean(b);
            assert_eq!(extract_value(&format_default(&value, &flag), &flag), value);
        }
    }
}
