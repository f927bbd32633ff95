//! Weighted Quality Score rules.
//!
//! Each comparable is scored per factor; the weighted scores are totalled per
//! survey, and a least-squares line through (total weighted score, adjusted
//! price) is evaluated at the subject's total weighted score.

use crate::calc::{calc_sum_numbers, calc_weighted_adjust_value, calc_weighted_score, round2, to_fixed};
use crate::document::FieldDocument;
use crate::error::ComputeError;
use crate::path::{field_path, Address, FieldPath, Method, Section};
use crate::regression;
use crate::rule::{DerivedRule, RuleSet};
use crate::value::FieldValue;

use super::{fields, numbers, shared, GridLayout};

const METHOD: Method = Method::Wqs;

fn row(r: usize, field: &str) -> FieldPath {
    field_path(Section::Scores, Address::Row(r), field)
}

fn cell(r: usize, c: usize, field: &str) -> FieldPath {
    field_path(Section::Scores, Address::Cell { row: r, column: c }, field)
}

fn total(field: &str) -> FieldPath {
    field_path(Section::TotalScores, Address::Block, field)
}

fn total_column(c: usize, field: &str) -> FieldPath {
    field_path(Section::TotalScores, Address::Column(c), field)
}

fn final_block(field: &str) -> FieldPath {
    field_path(Section::FinalValue(METHOD), Address::Block, field)
}

fn column(c: usize, field: &str) -> FieldPath {
    field_path(Section::Calculations(METHOD), Address::Column(c), field)
}

/// `target = calc_weighted_score(weight, score)`
fn weighted(target: FieldPath, weight: FieldPath, score: FieldPath) -> DerivedRule {
    DerivedRule::numeric(target, vec![weight.clone(), score.clone()], move |doc, _| {
        calc_weighted_score(doc.number(&weight), doc.number(&score))
    })
}

/// `target = calc_sum(sources)`
fn sum(target: FieldPath, sources: Vec<FieldPath>) -> DerivedRule {
    let deps = sources.clone();
    DerivedRule::numeric(target, deps, move |doc, _| calc_sum_numbers(&numbers(doc, &sources)))
}

/// Rule set for a WQS worksheet.
pub fn build(layout: &GridLayout) -> RuleSet {
    let mut rules = RuleSet::new();
    push_scores(&mut rules, layout);
    push_totals(&mut rules, layout);
    for c in 0..layout.surveys {
        rules.push(shared::adjusted_value_rule(METHOD, c));
        rules.push(weighted_adjust_value_rule(c));
    }
    push_final(&mut rules, layout);
    shared::push_final_tail(&mut rules, METHOD);
    push_estimates(&mut rules);
    rules
}

fn push_scores(rules: &mut RuleSet, layout: &GridLayout) {
    for r in 0..layout.rows {
        let weight = row(r, fields::WEIGHT);
        rules.push(weighted(
            row(r, fields::WEIGHTED_INTENSITY),
            weight.clone(),
            row(r, fields::INTENSITY),
        ));
        for c in 0..layout.surveys {
            rules.push(weighted(
                cell(r, c, fields::WEIGHTED_SURVEY_SCORE),
                weight.clone(),
                cell(r, c, fields::SURVEY_SCORE),
            ));
        }
        rules.push(weighted(
            row(r, fields::COLLATERAL_WEIGHTED_SCORE),
            weight,
            row(r, fields::COLLATERAL),
        ));
    }
}

/// Column weights are fractions of 1.
fn weighted_adjust_value_rule(c: usize) -> DerivedRule {
    let adjusted = column(c, fields::ADJUSTED_VALUE);
    let weight = column(c, fields::WEIGHT);
    DerivedRule::numeric(
        column(c, fields::WEIGHTED_ADJUST_VALUE),
        vec![adjusted.clone(), weight.clone()],
        move |doc, _| calc_weighted_adjust_value(doc.number(&adjusted), doc.number(&weight)),
    )
}

fn push_totals(rules: &mut RuleSet, layout: &GridLayout) {
    let column_of = |field: &str| -> Vec<FieldPath> { (0..layout.rows).map(|r| row(r, field)).collect() };

    rules.push(sum(total(fields::TOTAL_WEIGHT), column_of(fields::WEIGHT)));
    rules.push(sum(
        total(fields::TOTAL_WEIGHTED_INTENSITY),
        column_of(fields::WEIGHTED_INTENSITY),
    ));
    for c in 0..layout.surveys {
        let cells = |field: &str| -> Vec<FieldPath> { (0..layout.rows).map(|r| cell(r, c, field)).collect() };
        rules.push(sum(total_column(c, fields::TOTAL_SURVEY_SCORE), cells(fields::SURVEY_SCORE)));
        rules.push(sum(
            total_column(c, fields::TOTAL_WEIGHTED_SURVEY_SCORE),
            cells(fields::WEIGHTED_SURVEY_SCORE),
        ));
    }
    rules.push(sum(total(fields::TOTAL_COLLATERAL_SCORE), column_of(fields::COLLATERAL)));
    rules.push(sum(
        total(fields::TOTAL_WEIGHTED_COLLATERAL_SCORE),
        column_of(fields::COLLATERAL_WEIGHTED_SCORE),
    ));
}

/// Regression points: x is a survey's total weighted score, y its adjusted value.
#[derive(Debug, Clone)]
struct Points {
    xs: Vec<FieldPath>,
    ys: Vec<FieldPath>,
}

impl Points {
    fn new(surveys: usize) -> Self {
        Self {
            xs: (0..surveys)
                .map(|c| total_column(c, fields::TOTAL_WEIGHTED_SURVEY_SCORE))
                .collect(),
            ys: (0..surveys)
                .map(|c| column(c, fields::ADJUSTED_VALUE))
                .collect(),
        }
    }

    fn deps(&self) -> Vec<FieldPath> {
        self.xs.iter().chain(self.ys.iter()).cloned().collect()
    }

    /// Apply a regression statistic to the current document values.
    fn stat(
        &self,
        doc: &dyn FieldDocument,
        f: fn(&[f64], &[f64]) -> Option<f64>,
    ) -> Result<f64, ComputeError> {
        let ys = numbers(doc, &self.ys);
        let xs = numbers(doc, &self.xs);
        f(&ys, &xs).ok_or(ComputeError::Degenerate)
    }
}

fn push_final(rules: &mut RuleSet, layout: &GridLayout) {
    let points = Points::new(layout.surveys);
    let subject_score = total(fields::TOTAL_WEIGHTED_COLLATERAL_SCORE);

    {
        let points = points.clone();
        let subject_score = subject_score.clone();
        let mut deps = vec![subject_score.clone()];
        deps.extend(points.deps());
        rules.push(DerivedRule::new(final_block(fields::FINAL_VALUE), deps, move |doc, _| {
            let ys = numbers(doc, &points.ys);
            let xs = numbers(doc, &points.xs);
            let value = regression::forecast(doc.number(&subject_score), &ys, &xs).ok_or(ComputeError::Degenerate)?;
            Ok(FieldValue::number(round2(value)))
        }));
    }

    let stat_rule = |field: &str, f: fn(&[f64], &[f64]) -> Option<f64>, digits: Option<usize>| {
        let points = points.clone();
        DerivedRule::new(final_block(field), points.deps(), move |doc, _| {
            let value = points.stat(doc, f)?;
            Ok(match digits {
                Some(digits) => FieldValue::text(to_fixed(value, digits)),
                None => FieldValue::number(value),
            })
        })
    };
    rules.push(stat_rule(fields::COEFFICIENT_OF_DECISION, regression::rsq, Some(4)));
    rules.push(stat_rule(fields::STANDARD_ERROR, regression::steyx, Some(6)));
    rules.push(stat_rule(fields::INTERSECTION_POINT, regression::intercept, None));
    rules.push(stat_rule(fields::SLOPE, regression::slope, None));
}

/// `lowestEstimate` / `highestEstimate`: the rounded final value minus / plus
/// the standard error.
fn push_estimates(rules: &mut RuleSet) {
    let rounded = final_block(fields::FINAL_VALUE_ROUNDED);
    let standard_error = final_block(fields::STANDARD_ERROR);
    for (field, sign) in [(fields::LOWEST_ESTIMATE, -1.0), (fields::HIGHEST_ESTIMATE, 1.0)] {
        let rounded = rounded.clone();
        let standard_error = standard_error.clone();
        rules.push(DerivedRule::numeric(
            final_block(field),
            vec![rounded.clone(), standard_error.clone()],
            move |doc, _| round2(doc.number(&rounded) + sign * doc.number(&standard_error)),
        ));
    }
}
