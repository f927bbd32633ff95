//! Rules common to both methods: the adjusted-value pipeline of a
//! calculation column and the rounded tail of the final value block.

use crate::calc::{
    calc_adjusted_value_from_offering_price, calc_adjusted_value_from_selling_price, floor_to_ten_thousands, round2,
};
use crate::document::FieldDocument;
use crate::error::ComputeError;
use crate::path::{field_path, Address, FieldPath, Method, Section};
use crate::rule::{DerivedRule, RuleSet};
use crate::value::FieldValue;

use super::fields;

/// Paths of one calculation column's price inputs.
#[derive(Debug, Clone)]
pub struct PriceInputs {
    pub offering_price: FieldPath,
    pub offering_pct: FieldPath,
    pub offering_amt: FieldPath,
    pub selling_price: FieldPath,
    pub years: FieldPath,
    pub pct_per_year: FieldPath,
}

impl PriceInputs {
    pub fn new(method: Method, column: usize) -> Self {
        let at = |field| field_path(Section::Calculations(method), Address::Column(column), field);
        Self {
            offering_price: at(fields::OFFERING_PRICE),
            offering_pct: at(fields::OFFERING_PRICE_ADJUSTMENT_PCT),
            offering_amt: at(fields::OFFERING_PRICE_ADJUSTMENT_AMT),
            selling_price: at(fields::SELLING_PRICE),
            years: at(fields::NUMBER_OF_YEARS),
            pct_per_year: at(fields::SELLING_PRICE_ADJUSTMENT_YEAR),
        }
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        vec![
            self.offering_price.clone(),
            self.offering_pct.clone(),
            self.offering_amt.clone(),
            self.selling_price.clone(),
            self.years.clone(),
            self.pct_per_year.clone(),
        ]
    }

    /// Offering price when present and non-zero, else the time-adjusted
    /// selling price, else 0.
    pub fn adjusted_value(&self, doc: &dyn FieldDocument) -> f64 {
        if let Some(price) = doc.get(&self.offering_price).try_number().filter(|p| *p != 0.0) {
            return calc_adjusted_value_from_offering_price(
                price,
                doc.number(&self.offering_pct),
                doc.number(&self.offering_amt),
            );
        }
        if let Some(price) = doc.get(&self.selling_price).try_number() {
            return calc_adjusted_value_from_selling_price(price, doc.number(&self.years), doc.number(&self.pct_per_year));
        }
        0.0
    }
}

/// `adjustedValue` of calculation column `column`.
pub fn adjusted_value_rule(method: Method, column: usize) -> DerivedRule {
    let inputs = PriceInputs::new(method, column);
    let target = field_path(Section::Calculations(method), Address::Column(column), fields::ADJUSTED_VALUE);
    DerivedRule::numeric(target, inputs.paths(), move |doc, _| inputs.adjusted_value(doc))
}

/// `finalValueRounded`, `appraisalPrice` and `appraisalPriceRounded` of the
/// final value block. Both rounded fields yield to user edits.
pub fn push_final_tail(rules: &mut RuleSet, method: Method) {
    let block = |field| field_path(Section::FinalValue(method), Address::Block, field);
    let final_value = block(fields::FINAL_VALUE);
    let final_rounded = block(fields::FINAL_VALUE_ROUNDED);
    let land_area = block(fields::LAND_AREA);
    let appraisal = block(fields::APPRAISAL_PRICE);
    let appraisal_rounded = block(fields::APPRAISAL_PRICE_ROUNDED);

    {
        let final_value = final_value.clone();
        rules.push(
            DerivedRule::numeric(final_rounded.clone(), vec![final_value.clone()], move |doc, _| {
                floor_to_ten_thousands(doc.number(&final_value))
            })
            .auto_default(),
        );
    }

    {
        let final_rounded = final_rounded.clone();
        let land_area = land_area.clone();
        rules.push(DerivedRule::new(
            appraisal.clone(),
            vec![final_rounded.clone(), land_area.clone()],
            move |doc, ctx| {
                let rounded = doc.number(&final_rounded);
                if !ctx.property.is_land() {
                    return Ok(FieldValue::number(rounded));
                }
                let area = doc
                    .get(&land_area)
                    .try_number()
                    .ok_or_else(|| ComputeError::MissingInput(land_area.clone()))?;
                Ok(FieldValue::number(round2(rounded * area)))
            },
        ));
    }

    {
        let appraisal = appraisal.clone();
        rules.push(
            DerivedRule::numeric(appraisal_rounded, vec![appraisal.clone()], move |doc, _| {
                floor_to_ten_thousands(doc.number(&appraisal))
            })
            .auto_default(),
        );
    }
}
