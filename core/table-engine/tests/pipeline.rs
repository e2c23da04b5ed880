//! FILENAME: core/table-engine/tests/pipeline.rs
//! End-to-end renders through `TableEngine`.

use chrono::NaiveDate;
use std::sync::Arc;
use table_engine::*;

fn raw(columns: &[&str], rows: &[&[&str]]) -> Arc<RawTableData> {
    Arc::new(RawTableData::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    ))
}

fn people() -> Arc<RawTableData> {
    raw(&["Name", "Age"], &[&["Ann", "30"], &["Bo", "25"]])
}

fn config(json: &str) -> Arc<TableConfig> {
    Arc::new(TableConfig::from_json(json).unwrap())
}

fn names(engine: &TableEngine) -> Vec<String> {
    engine
        .rows()
        .iter()
        .map(|row| row.cells[0].formatted.clone())
        .collect()
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn unconfigured_table_uses_defaults() {
    let engine = TableEngine::new(Arc::new(TableConfig::default()), people());

    let columns = engine.columns();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].alias, "Name");
    assert_eq!(columns[1].alias, "Age");
    assert!(columns.iter().all(|c| c.kind == ColumnType::String));

    assert_eq!(engine.rows().len(), 2);
    assert_eq!(engine.total(), 2);
    let ages: Vec<&TypedValue> = engine.rows().iter().map(|r| r.value("Age").unwrap()).collect();
    assert_eq!(ages, vec![&TypedValue::text("30"), &TypedValue::text("25")]);
}

#[test]
fn number_column_yields_numbers() {
    let engine = TableEngine::new(config(r#"{ "columns": { "Age": { "type": "number" } } }"#), people());
    let ages: Vec<Option<f64>> = engine
        .rows()
        .iter()
        .map(|r| r.value("Age").and_then(TypedValue::as_number))
        .collect();
    assert_eq!(ages, vec![Some(30.0), Some(25.0)]);
}

#[test]
fn second_page_of_size_one() {
    let engine = TableEngine::new(
        config(r#"{ "pagination": { "page-size": 1, "page-sizes": [1, 5, 10] } }"#),
        people(),
    );
    assert_eq!(names(&engine), vec!["Ann"]);

    let mut engine = engine;
    engine.update_pagination(PaginationPatch::page(2));
    assert_eq!(names(&engine), vec!["Bo"]);
    assert_eq!(engine.total(), 2);
    assert_eq!(engine.page_count(), 2);
    assert_eq!(engine.pagination().unwrap().page_sizes, vec![1, 5, 10]);
}

#[test]
fn descending_sort_on_age() {
    let mut engine = TableEngine::new(Arc::new(TableConfig::default()), people());
    engine.set_sort(Some("-Age"));
    assert_eq!(names(&engine), vec!["Ann", "Bo"]);
    engine.set_sort(Some("Age"));
    assert_eq!(names(&engine), vec!["Bo", "Ann"]);
}

#[test]
fn filter_on_age() {
    let mut engine = TableEngine::new(Arc::new(TableConfig::default()), people());
    engine.set_filter(Some("Age > 26"));
    assert_eq!(names(&engine), vec!["Ann"]);
    assert_eq!(engine.total(), 1);
}

#[test]
fn boolean_yes_token() {
    let data = raw(&["Done"], &[&["Y"], &["N"], &[""]]);
    let engine = TableEngine::new(
        config(r#"{ "columns": { "Done": { "type": "boolean", "yes-format": "Y", "no-format": "N" } } }"#),
        data,
    );
    let values: Vec<&TypedValue> = engine.rows().iter().map(|r| r.value("Done").unwrap()).collect();
    assert_eq!(
        values,
        vec![
            &TypedValue::Boolean(true),
            &TypedValue::Boolean(false),
            &TypedValue::Boolean(false)
        ]
    );
    assert_eq!(names(&engine), vec!["Y", "N", "N"]);
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn one_descriptor_per_raw_column() {
    let data = raw(&["A", "B", "A", ""], &[&["1"]]);
    let engine = TableEngine::new(config(r#"{ "columns": { "Missing": { "type": "date" } } }"#), data);
    assert_eq!(engine.columns().len(), 4);
    for (i, column) in engine.columns().iter().enumerate() {
        assert_eq!(column.index, i);
    }
    assert_eq!(engine.rows()[0].cells.len(), 4);
    assert_eq!(engine.rows()[0].formatted(), vec!["1", "", "", ""]);
}

#[test]
fn sort_is_stable_in_both_directions() {
    let data = raw(
        &["Name", "Team"],
        &[&["a", "red"], &["b", "blue"], &["c", "red"], &["d", "blue"], &["e", "red"]],
    );
    let mut engine = TableEngine::new(Arc::new(TableConfig::default()), data);
    engine.set_sort(Some("Team"));
    assert_eq!(names(&engine), vec!["b", "d", "a", "c", "e"]);
    engine.set_sort(Some("-Team"));
    assert_eq!(names(&engine), vec!["a", "c", "e", "b", "d"]);
}

#[test]
fn filtering_never_increases_total() {
    let data = raw(
        &["Name", "Age"],
        &[&["a", "10"], &["b", "20"], &["c", "30"], &["d", "40"]],
    );
    let mut engine = TableEngine::new(config(r#"{ "columns": { "Age": { "type": "number" } } }"#), data);
    let unfiltered = engine.total();
    for expr in ["Age > 15", "Age > 15 AND Age < 35", "TRUE", "FALSE", "Name = \"c\"", "Age >"] {
        engine.set_filter(Some(expr));
        assert!(engine.total() <= unfiltered, "{}", expr);
    }
}

#[test]
fn filter_sees_the_whole_dataset() {
    let data = raw(&["Name", "Age"], &[&["a", "10"], &["b", "20"], &["c", "60"]]);
    let mut engine = TableEngine::new(
        config(r#"{ "columns": { "Age": { "type": "number" } }, "pagination": { "page-size": 1 } }"#),
        data,
    );
    engine.set_filter(Some("Age > AVERAGE(Age)"));
    assert_eq!(names(&engine), vec!["c"]);
}

#[test]
fn pipeline_order_is_sort_filter_paginate() {
    let data = raw(
        &["Name", "Age"],
        &[&["a", "50"], &["b", "10"], &["c", "40"], &["d", "30"], &["e", "20"]],
    );
    let mut engine = TableEngine::new(
        config(r#"{ "sort": "-Age", "filter": "Age >= 20", "pagination": { "page-size": 2 },
                   "columns": { "Age": { "type": "number" } } }"#),
        data,
    );
    assert_eq!(names(&engine), vec!["a", "c"]);
    engine.update_pagination(PaginationPatch::page(2));
    assert_eq!(names(&engine), vec!["d", "e"]);
    assert_eq!(engine.total(), 4);
}

#[test]
fn invalid_filter_is_a_diagnostic_and_hides_rows() {
    let mut engine = TableEngine::new(Arc::new(TableConfig::default()), people());
    engine.set_filter(Some("Agee > 26"));
    assert!(engine.rows().is_empty());
    assert_eq!(engine.total(), 0);
    assert!(matches!(
        engine.diagnostics().as_slice(),
        [TableError::Filter { source_text, .. }] if source_text == "Agee > 26"
    ));

    engine.set_filter(None);
    assert_eq!(engine.total(), 2);
    assert!(engine.diagnostics().is_empty());
}

#[test]
fn formatter_rule_and_diagnostics() {
    let engine = TableEngine::new(
        config(
            r#"{ "columns": {
                "Age": { "type": "number", "formatter": "Name & \" is \" & @" },
                "Name": { "formatter": "UPPER(" }
            } }"#,
        ),
        people(),
    );
    assert_eq!(engine.rows()[0].formatted(), vec!["Ann", "Ann is 30"]);
    assert!(matches!(
        engine.diagnostics().as_slice(),
        [TableError::Formatter { column, .. }] if column == "Name"
    ));
}

#[test]
fn formats_apply_per_type() {
    let data = raw(
        &["Price", "Share", "When", "At"],
        &[&["1.234,50 €", "12,5%", "05.03.2024", "2024-03-05 09:30"]],
    );
    let engine = TableEngine::new(
        config(
            r##"{ "date-format": "DD.MM.YYYY", "columns": {
                "Price": { "type": "number", "number-format": "#.##0,00 €" },
                "Share": { "type": "number", "number-format": "0,0%" },
                "When": { "type": "date" },
                "At": { "type": "datetime" }
            } }"##,
        ),
        data,
    );
    let row = &engine.rows()[0];
    assert_eq!(
        row.value("Price"),
        Some(&TypedValue::Number {
            value: 1234.5,
            kind: NumberKind::Currency("€".into())
        })
    );
    assert_eq!(
        row.value("When").and_then(TypedValue::as_instant).map(|d| d.date()),
        NaiveDate::from_ymd_opt(2024, 3, 5)
    );
    assert_eq!(row.formatted(), vec!["1.234,50 €", "12,5%", "05.03.2024", "2024-03-05 09:30"]);
}

#[test]
fn unparseable_cells_render_empty() {
    let data = raw(&["Age"], &[&["thirty"], &["31"]]);
    let mut engine = TableEngine::new(config(r#"{ "columns": { "Age": { "type": "number" } } }"#), data);
    assert_eq!(names(&engine), vec!["", "31"]);
    assert!(engine.rows()[0].value("Age").unwrap().is_empty());
    assert_eq!(engine.rows()[0].cells[0].raw, "thirty");

    engine.set_sort(Some("-Age"));
    assert_eq!(names(&engine), vec!["31", ""]);
}

// ============================================================================
// STATE AND MEMOIZATION
// ============================================================================

#[test]
fn replacing_config_reseeds_state() {
    let mut engine = TableEngine::new(config(r#"{ "sort": "Age" }"#), people());
    engine.set_filter(Some("Age > 100"));
    engine.update_pagination(PaginationPatch::page_size(1));
    assert_eq!(engine.total(), 0);

    engine.set_config(config(r#"{ "sort": "-Name" }"#));
    assert_eq!(engine.sort(), Some("-Name"));
    assert_eq!(engine.filter(), None);
    assert!(engine.pagination().is_none());
    assert_eq!(names(&engine), vec!["Bo", "Ann"]);
}

#[test]
fn alias_renames_columns_for_sort_and_filter() {
    let mut engine = TableEngine::new(
        config(r#"{ "columns": { "Age": { "type": "number", "alias": "years" } } }"#),
        people(),
    );
    engine.set_filter(Some("years < 26"));
    assert_eq!(names(&engine), vec!["Bo"]);

    engine.set_filter(None);
    engine.set_sort(Some("years"));
    assert_eq!(names(&engine), vec!["Bo", "Ann"]);
    assert!(engine.rows()[0].value("years").is_some());
}

#[test]
fn memo_skips_identical_renders() {
    let cfg = config(r#"{ "filter": "Age > 1" }"#);
    let data = people();
    let mut engine = TableEngine::new(cfg.clone(), data.clone());
    let renders = engine.render_count();

    engine.set_filter(Some("Age > 1"));
    engine.set_config(cfg);
    engine.set_data(data);
    assert_eq!(engine.render_count(), renders);

    engine.update_pagination(PaginationPatch::default());
    assert_eq!(engine.render_count(), renders + 1);
    engine.update_pagination(PaginationPatch::default());
    assert_eq!(engine.render_count(), renders + 1);
}

#[test]
fn document_supplies_source_text() {
    let doc = "| Name | Age |\n| --- | --- |\n| *Ann* | 30 |\n| Bo | 25 |\n";
    let reader = PipeTableReader::new(doc);
    let data = Arc::new(reader.to_raw_data());
    let mut engine = TableEngine::new(Arc::new(TableConfig::default()), data);
    assert!(engine.rows()[0].cells.iter().all(|c| c.source.is_empty()));

    engine.set_document(Some(Arc::new(reader)));
    assert_eq!(engine.rows()[0].cells[0].source, "*Ann*");
    assert_eq!(engine.rows()[1].cells[1].source, "25");

    engine.set_document(None);
    assert_eq!(engine.rows()[0].cells[0].source, "");
}

#[test]
fn native_formatter_uses_host_and_wins_over_rule() {
    let mut engine = TableEngine::new(
        config(r#"{ "columns": { "Name": { "formatter": "LOWER(@)" } } }"#),
        people(),
    );
    assert_eq!(names(&engine), vec!["ann", "bo"]);

    let native = |value: &TypedValue, row: &RowValues, env: &FormatEnv<'_>| -> TableResult<String> {
        let host = env
            .host
            .and_then(|h| h.downcast_ref::<&str>())
            .copied()
            .unwrap_or("?");
        let age = row.get("Age").map(TypedValue::to_plain_string).unwrap_or_default();
        Ok(format!("{}:{}({}) of {}", host, value.to_plain_string(), age, env.dataset.len()))
    };
    engine.register_formatter("Name", Arc::new(native));
    assert_eq!(names(&engine), vec!["?:Ann(30) of 2", "?:Bo(25) of 2"]);

    let host: HostHandle = Arc::new("app");
    engine.set_host(Some(host));
    assert_eq!(names(&engine), vec!["app:Ann(30) of 2", "app:Bo(25) of 2"]);

    assert!(engine.unregister_formatter("Name"));
    assert_eq!(names(&engine), vec!["ann", "bo"]);
}

#[test]
fn row_number_in_filter_follows_sort() {
    let engine = TableEngine::new(config(r#"{ "sort": "Age", "filter": "ROWNUM() = 1" }"#), people());
    assert_eq!(names(&engine), vec!["Bo"]);
}

#[test]
fn oversized_filter_is_a_diagnostic() {
    let mut engine = TableEngine::new(Arc::new(TableConfig::default()), people());
    engine.set_filter(Some(&vec!["Age > 0"; 20_000].join(" AND ")));
    assert!(engine.rows().is_empty());
    assert!(matches!(engine.diagnostics().as_slice(), [TableError::Filter { .. }]));

    engine.set_filter(Some(&vec!["Age > 0"; 50].join(" AND ")));
    assert_eq!(engine.total(), 2);
}
