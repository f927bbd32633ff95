//! End-to-end worksheet tests driven by JSON fixtures.

use std::fs;
use std::path::PathBuf;

use appraise_engine::rules::{fields, lint};
use appraise_engine::{
    field_path, Address, EngineOptions, FieldValue, Method, Section, Session, WorksheetInput,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn load(name: &str) -> Session {
    let raw = fs::read_to_string(fixtures_dir().join(name)).expect("read fixture");
    let input: WorksheetInput = serde_json::from_str(&raw).expect("parse fixture");
    Session::from_input(input, EngineOptions::default()).expect("generate worksheet")
}

fn number(value: FieldValue) -> f64 {
    value.try_number().expect("numeric field")
}

// ============================================================================
// WQS
// ============================================================================

#[test]
fn test_wqs_land_fixture() {
    let session = load("wqs_land.json");
    assert!(session.last_report().converged);

    let adjusted = |c| field_path(Section::Calculations(Method::Wqs), Address::Column(c), fields::ADJUSTED_VALUE);
    assert_eq!(session.value(&adjusted(0)), FieldValue::Number(50000.0));
    assert_eq!(session.value(&adjusted(1)), FieldValue::Number(60000.0));
    assert_eq!(session.value(&adjusted(2)), FieldValue::Number(70000.0));

    let column = |c, field| field_path(Section::Calculations(Method::Wqs), Address::Column(c), field);
    assert_eq!(session.value(&column(0, fields::WEIGHT)), FieldValue::Number(1.0 / 3.0));
    assert_eq!(number(session.value(&column(2, fields::WEIGHTED_ADJUST_VALUE))), 23333.33);

    let finals = session.final_values();
    assert_eq!(finals.method, Method::Wqs);
    assert_eq!(number(finals.get(fields::FINAL_VALUE)), 72000.0);
    assert_eq!(number(finals.get(fields::FINAL_VALUE_ROUNDED)), 70000.0);
    assert_eq!(finals.get(fields::COEFFICIENT_OF_DECISION), FieldValue::Text("1.0000".into()));
    assert_eq!(finals.get(fields::STANDARD_ERROR), FieldValue::Text("0.000000".into()));
    assert!((number(finals.get(fields::SLOPE)) - 10000.0).abs() < 1e-6);
    assert!(number(finals.get(fields::INTERSECTION_POINT)).abs() < 1e-6);
    assert_eq!(number(finals.get(fields::APPRAISAL_PRICE)), 7_000_000.0);
    assert_eq!(number(finals.get(fields::APPRAISAL_PRICE_ROUNDED)), 7_000_000.0);
    assert_eq!(number(finals.get(fields::LOWEST_ESTIMATE)), 70000.0);
    assert_eq!(number(finals.get(fields::HIGHEST_ESTIMATE)), 70000.0);
}

#[test]
fn test_wqs_rules_lint_clean() {
    let session = load("wqs_land.json");
    let report = lint(&session.worksheet().rules());
    assert!(report.is_clean(EngineOptions::default().max_passes), "{:?}", report);
}

#[test]
fn test_wqs_collateral_edit_moves_forecast() {
    let mut session = load("wqs_land.json");
    let collateral = |r| field_path(Section::Scores, Address::Row(r), fields::COLLATERAL);
    // x = 0.6 * 6 + 0.4 * 6
    session.edit(&collateral(0), 6.0.into()).expect("watched input");
    let finals = session.final_values();
    assert_eq!(number(finals.get(fields::FINAL_VALUE)), 60000.0);
    assert_eq!(number(finals.get(fields::FINAL_VALUE_ROUNDED)), 60000.0);
}

// ============================================================================
// Sale adjustment grid
// ============================================================================

fn grid_column(c: usize, field: &str) -> appraise_engine::FieldPath {
    field_path(Section::Calculations(Method::SaleGrid), Address::Column(c), field)
}

fn grid_final(field: &str) -> appraise_engine::FieldPath {
    field_path(Section::FinalValue(Method::SaleGrid), Address::Block, field)
}

#[test]
fn test_sale_grid_building_fixture() {
    let session = load("sale_grid_building.json");
    assert!(session.last_report().converged);

    assert_eq!(number(session.value(&grid_column(0, fields::ADJUSTED_VALUE))), 21612.5);
    assert_eq!(number(session.value(&grid_column(0, fields::TOTAL_SECOND_REVISION))), 19062.5);
    assert_eq!(number(session.value(&grid_column(0, fields::TOTAL_ADJUST_VALUE))), 20968.75);
    assert_eq!(number(session.value(&grid_column(1, fields::NUMBER_OF_YEARS))), 4.0);
    assert_eq!(number(session.value(&grid_column(1, fields::ADJUSTED_VALUE))), 24080.0);
    assert_eq!(number(session.value(&grid_column(1, fields::TOTAL_ADJUST_VALUE))), 22876.0);

    let finals = session.final_values();
    assert_eq!(number(finals.get(fields::TOTAL_WEIGHT)), 100.0);
    assert_eq!(number(finals.get(fields::FINAL_VALUE)), 21922.38);
    assert_eq!(number(finals.get(fields::FINAL_VALUE_ROUNDED)), 20000.0);
    assert_eq!(number(finals.get(fields::APPRAISAL_PRICE)), 20000.0);
}

#[test]
fn test_sale_grid_settled_session_is_idle() {
    let mut session = load("sale_grid_building.json");
    assert!(session.sync().is_none());
    assert!(!session.engine().is_pending());
}

#[test]
fn test_sale_grid_rounded_override_survives_recompute() {
    let mut session = load("sale_grid_building.json");
    let rounded = grid_final(fields::FINAL_VALUE_ROUNDED);

    session.edit(&rounded, 25000.0.into());
    assert_eq!(number(session.value(&rounded)), 25000.0);
    assert_eq!(number(session.value(&grid_final(fields::APPRAISAL_PRICE))), 25000.0);

    // Weight everything on survey B.
    session.edit(&grid_column(0, fields::WEIGHT), 0.0.into());
    session.edit(&grid_column(1, fields::WEIGHT), 100.0.into());
    assert_eq!(number(session.value(&grid_final(fields::FINAL_VALUE))), 22876.0);
    assert_eq!(number(session.value(&rounded)), 25000.0);

    session.clear(&rounded);
    assert_eq!(number(session.value(&rounded)), 20000.0);
}

#[test]
fn test_sale_grid_reshape_keeps_edits() {
    let mut session = load("sale_grid_building.json");
    let row = session.add_row("07");
    assert_eq!(row, 2);
    assert!(session.worksheet().check_shape(session.document()).is_ok());

    // The new row starts empty, so nothing moves.
    assert_eq!(number(session.final_values().get(fields::FINAL_VALUE)), 21922.38);

    let removed = session.remove_survey(0).expect("survey 0");
    assert_eq!(removed.id, "MS-2001");
    assert_eq!(session.worksheet().surveys().len(), 1);
    assert_eq!(number(session.value(&grid_column(0, fields::WEIGHT))), 100.0);
    // Former survey B kept its edits when it shifted into column 0.
    assert_eq!(number(session.value(&grid_column(0, fields::TOTAL_ADJUST_VALUE))), 22876.0);
    assert_eq!(number(session.final_values().get(fields::FINAL_VALUE)), 22876.0);
}
