//! Sale Adjustment Grid rules.
//!
//! Each comparable's price is adjusted (offering discount or time
//! adjustment), revised for land and building area differences against the
//! subject, adjusted per qualitative factor, then weighted into the final
//! value.

use crate::calc::{
    calc_adjust_amount, calc_diff, calc_increase_decrease, calc_sum, calc_sum_numbers, calc_total_second_revision,
    calc_weighted_adjust_value, WeightScale,
};
use crate::path::{field_path, Address, FieldPath, Method, Section};
use crate::rule::{DerivedRule, RuleSet};

use super::{fields, shared, values, GridLayout};

const METHOD: Method = Method::SaleGrid;

fn column(c: usize, field: &str) -> FieldPath {
    field_path(Section::Calculations(METHOD), Address::Column(c), field)
}

fn qualitative(r: usize, c: usize, field: &str) -> FieldPath {
    field_path(Section::Qualitatives, Address::Cell { row: r, column: c }, field)
}

fn final_block(field: &str) -> FieldPath {
    field_path(Section::FinalValue(METHOD), Address::Block, field)
}

/// Rule set for a sale-adjustment-grid worksheet. Column weights are read in
/// `scale`.
pub fn build(layout: &GridLayout, scale: WeightScale) -> RuleSet {
    let mut rules = RuleSet::new();
    for c in 0..layout.surveys {
        rules.push(shared::adjusted_value_rule(METHOD, c));
        push_second_revision(&mut rules, c);
    }
    for r in 0..layout.rows {
        for c in 0..layout.surveys {
            rules.push(adjust_amount_rule(r, c));
        }
    }
    for c in 0..layout.surveys {
        push_column_totals(&mut rules, layout, c, scale);
    }
    push_final(&mut rules, layout);
    shared::push_final_tail(&mut rules, METHOD);
    rules
}

/// Area deficits against the subject, their value deltas, and the revised
/// total of column `c`.
fn push_second_revision(rules: &mut RuleSet, c: usize) {
    let land_area = column(c, fields::LAND_AREA);
    let usable_area = column(c, fields::USABLE_AREA);
    let land_deficit = column(c, fields::LAND_AREA_OF_DEFICIENT);
    let usable_deficit = column(c, fields::USABLE_AREA_OF_DEFICIENT);
    let land_unit_price = column(c, fields::LAND_UNIT_PRICE);
    let building_unit_price = column(c, fields::BUILDING_UNIT_PRICE);
    let land_delta = column(c, fields::LAND_VALUE_INCREASE_DECREASE);
    let building_delta = column(c, fields::BUILDING_VALUE_INCREASE_DECREASE);
    let adjusted = column(c, fields::ADJUSTED_VALUE);

    {
        let land_area = land_area.clone();
        rules.push(DerivedRule::numeric(land_deficit.clone(), vec![land_area.clone()], move |doc, ctx| {
            calc_diff(ctx.property.land_area.unwrap_or(0.0), doc.number(&land_area))
        }));
    }
    {
        let usable_area = usable_area.clone();
        rules.push(DerivedRule::numeric(usable_deficit.clone(), vec![usable_area.clone()], move |doc, ctx| {
            calc_diff(ctx.property.usable_area.unwrap_or(0.0), doc.number(&usable_area))
        }));
    }
    rules.push(delta_rule(land_delta.clone(), land_unit_price, land_deficit));
    rules.push(delta_rule(building_delta.clone(), building_unit_price, usable_deficit));

    rules.push(DerivedRule::numeric(
        column(c, fields::TOTAL_SECOND_REVISION),
        vec![adjusted.clone(), building_delta.clone(), land_delta.clone()],
        move |doc, _| calc_total_second_revision(doc.number(&adjusted), doc.number(&building_delta), doc.number(&land_delta)),
    ));
}

/// `target = calc_increase_decrease(unit_price, deficit)`
fn delta_rule(target: FieldPath, unit_price: FieldPath, deficit: FieldPath) -> DerivedRule {
    DerivedRule::numeric(target, vec![unit_price.clone(), deficit.clone()], move |doc, _| {
        calc_increase_decrease(doc.number(&unit_price), doc.number(&deficit))
    })
}

/// Qualitative adjustment of factor row `r` for survey `c`, as a percentage
/// of the column's second-revision total.
fn adjust_amount_rule(r: usize, c: usize) -> DerivedRule {
    let base = column(c, fields::TOTAL_SECOND_REVISION);
    let pct = qualitative(r, c, fields::ADJUSTMENT_PCT);
    DerivedRule::numeric(
        qualitative(r, c, fields::ADJUST_AMOUNT),
        vec![base.clone(), pct.clone()],
        move |doc, _| calc_adjust_amount(doc.number(&base), doc.number(&pct)),
    )
}

fn push_column_totals(rules: &mut RuleSet, layout: &GridLayout, c: usize, scale: WeightScale) {
    let amounts: Vec<FieldPath> = (0..layout.rows)
        .map(|r| qualitative(r, c, fields::ADJUST_AMOUNT))
        .collect();
    let qualitative_total = column(c, fields::TOTAL_QUALITATIVE_ADJUSTMENT);
    let second_revision = column(c, fields::TOTAL_SECOND_REVISION);
    let adjust_total = column(c, fields::TOTAL_ADJUST_VALUE);
    let weight = column(c, fields::WEIGHT);

    rules.push(DerivedRule::numeric(qualitative_total.clone(), amounts.clone(), move |doc, _| {
        calc_sum(&values(doc, &amounts))
    }));

    {
        let qualitative_total = qualitative_total.clone();
        let second_revision = second_revision.clone();
        rules.push(DerivedRule::numeric(
            adjust_total.clone(),
            vec![second_revision.clone(), qualitative_total.clone()],
            move |doc, _| calc_sum_numbers(&[doc.number(&second_revision), doc.number(&qualitative_total)]),
        ));
    }

    rules.push(DerivedRule::numeric(
        column(c, fields::WEIGHTED_ADJUST_VALUE),
        vec![adjust_total.clone(), weight.clone()],
        move |doc, _| calc_weighted_adjust_value(doc.number(&adjust_total), scale.to_fraction(doc.number(&weight))),
    ));
}

fn push_final(rules: &mut RuleSet, layout: &GridLayout) {
    let weights: Vec<FieldPath> = (0..layout.surveys).map(|c| column(c, fields::WEIGHT)).collect();
    let weighted: Vec<FieldPath> = (0..layout.surveys)
        .map(|c| column(c, fields::WEIGHTED_ADJUST_VALUE))
        .collect();

    rules.push(DerivedRule::numeric(final_block(fields::TOTAL_WEIGHT), weights.clone(), move |doc, _| {
        calc_sum(&values(doc, &weights))
    }));
    rules.push(DerivedRule::numeric(final_block(fields::FINAL_VALUE), weighted.clone(), move |doc, _| {
        calc_sum(&values(doc, &weighted))
    }));
}
