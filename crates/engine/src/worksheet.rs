//! Worksheet lifecycle: seeding a document from a template and surveys, and
//! the structural edits (rows, surveys) that reshape it.
//!
//! Every structural operation leaves all grid sections with one column per
//! survey. The caller rebuilds the rule set afterwards (see
//! [`Session`](crate::session::Session)).

use crate::calc::WeightScale;
use crate::document::{FieldDocument, SetOptions};
use crate::engine::EngineOptions;
use crate::error::{RuleSetError, WorksheetError};
use crate::model::{factor_codes, years_since_sale, Property, Survey, Template, TemplateFactor};
use crate::path::{columns_path, field_path, row_path, Address, FieldPath, Method, Section};
use crate::rule::{RuleContext, RuleSet};
use crate::rules::{self, fields, GridLayout};
use crate::value::FieldValue;

/// A factor row of the comparison table or the method's row section.
#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetRow {
    pub factor_code: String,
    /// Template rows cannot be removed.
    pub locked: bool,
}

/// Structure of a generated worksheet. The values live in the document.
#[derive(Debug, Clone)]
pub struct Worksheet {
    method: Method,
    template: Template,
    property: Property,
    surveys: Vec<Survey>,
    comparative_rows: Vec<WorksheetRow>,
    rows: Vec<WorksheetRow>,
    options: EngineOptions,
}

fn put(doc: &mut dyn FieldDocument, path: FieldPath, value: FieldValue) {
    doc.set(&path, value, SetOptions::computed());
}

fn optional(value: Option<f64>) -> FieldValue {
    value.map(FieldValue::number).unwrap_or_default()
}

fn template_rows(factors: &[TemplateFactor]) -> Vec<WorksheetRow> {
    factors
        .iter()
        .map(|f| WorksheetRow {
            factor_code: f.factor_id.clone(),
            locked: true,
        })
        .collect()
}

impl Worksheet {
    /// Reset `doc` and seed every section for `method`.
    pub fn generate(
        method: Method,
        template: Template,
        surveys: Vec<Survey>,
        property: Property,
        options: EngineOptions,
        doc: &mut dyn FieldDocument,
    ) -> Result<Self, WorksheetError> {
        for (i, survey) in surveys.iter().enumerate() {
            if surveys[..i].iter().any(|s| s.id == survey.id) {
                return Err(WorksheetError::DuplicateSurvey(survey.id.clone()));
            }
        }

        let worksheet = Self {
            method,
            comparative_rows: template_rows(&template.comparative_factors),
            rows: template_rows(&template.qualitative_factors),
            template,
            property,
            surveys,
            options,
        };

        doc.reset();
        for r in 0..worksheet.comparative_rows.len() {
            worksheet.seed_comparative_row(doc, r);
        }
        for r in 0..worksheet.rows.len() {
            let template_factor = worksheet.template.qualitative_factors.get(r);
            worksheet.seed_row(doc, r, template_factor);
        }
        for c in 0..worksheet.surveys.len() {
            worksheet.seed_block_columns(doc, c);
        }
        worksheet.seed_final_block(doc);
        worksheet.resplit_weights(doc);

        log::debug!(
            "generated {} worksheet: {} comparative rows, {} rows, {} surveys",
            worksheet.method,
            worksheet.comparative_rows.len(),
            worksheet.rows.len(),
            worksheet.surveys.len()
        );
        Ok(worksheet)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn surveys(&self) -> &[Survey] {
        &self.surveys
    }

    pub fn rows(&self) -> &[WorksheetRow] {
        &self.rows
    }

    pub fn comparative_rows(&self) -> &[WorksheetRow] {
        &self.comparative_rows
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout {
            method: self.method,
            comparative_rows: self.comparative_rows.len(),
            rows: self.rows.len(),
            surveys: self.surveys.len(),
        }
    }

    pub fn context(&self) -> RuleContext {
        RuleContext {
            property: self.property.clone(),
            surveys: self.surveys.clone(),
        }
    }

    pub fn rules(&self) -> RuleSet {
        rules::build_rules(&self.layout(), &self.options)
    }

    pub fn check_shape(&self, doc: &dyn FieldDocument) -> Result<(), RuleSetError> {
        rules::check_shape(doc, &self.layout())
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Append a user row for `factor_code`. Returns its index.
    pub fn add_row(&mut self, doc: &mut dyn FieldDocument, factor_code: &str) -> usize {
        let index = self.rows.len();
        self.rows.push(WorksheetRow {
            factor_code: factor_code.to_string(),
            locked: false,
        });
        self.seed_row(doc, index, None);
        index
    }

    /// Remove user row `index`, shifting later rows up.
    pub fn remove_row(&mut self, doc: &mut dyn FieldDocument, index: usize) -> Result<(), WorksheetError> {
        let len = self.rows.len();
        let row = self.rows.get(index).ok_or(WorksheetError::RowOutOfRange { index, len })?;
        if row.locked {
            return Err(WorksheetError::LockedRow(index));
        }

        let section = self.row_section();
        for r in index..len - 1 {
            doc.move_subtree(&row_path(section, r + 1), &row_path(section, r));
        }
        doc.remove_subtree(&row_path(section, len - 1));
        self.rows.remove(index);
        Ok(())
    }

    // =========================================================================
    // Surveys
    // =========================================================================

    /// Append `survey` as a new column of every grid section.
    pub fn add_survey(&mut self, doc: &mut dyn FieldDocument, survey: Survey) -> Result<usize, WorksheetError> {
        if self.surveys.iter().any(|s| s.id == survey.id) {
            return Err(WorksheetError::DuplicateSurvey(survey.id));
        }
        let c = self.surveys.len();
        self.surveys.push(survey);

        for r in 0..self.comparative_rows.len() {
            self.seed_comparative_cell(doc, r, c);
        }
        for r in 0..self.rows.len() {
            self.seed_row_cell(doc, r, c);
        }
        self.seed_block_columns(doc, c);
        self.resplit_weights(doc);
        Ok(c)
    }

    /// Remove survey column `index` from every grid section, shifting later
    /// columns left.
    pub fn remove_survey(&mut self, doc: &mut dyn FieldDocument, index: usize) -> Result<Survey, WorksheetError> {
        let len = self.surveys.len();
        if index >= len {
            return Err(WorksheetError::SurveyOutOfRange { index, len });
        }

        for list in self.column_lists() {
            for c in index..len - 1 {
                doc.move_subtree(&list.clone().index(c + 1), &list.clone().index(c));
            }
            doc.remove_subtree(&list.index(len - 1));
        }
        let removed = self.surveys.remove(index);
        self.resplit_weights(doc);
        Ok(removed)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    fn row_section(&self) -> Section {
        self.layout().row_section()
    }

    /// Every list of survey columns in the document.
    fn column_lists(&self) -> Vec<FieldPath> {
        let mut lists = Vec::new();
        for (section, rows) in self.layout().grid_sections() {
            match rows {
                Some(rows) => lists.extend((0..rows).map(|r| columns_path(section, Some(r)))),
                None => lists.push(columns_path(section, None)),
            }
        }
        lists
    }

    fn seed_comparative_row(&self, doc: &mut dyn FieldDocument, r: usize) {
        let section = Section::Comparatives(self.method);
        put(
            doc,
            field_path(section, Address::Row(r), fields::FACTOR_CODE),
            FieldValue::text(&self.comparative_rows[r].factor_code),
        );
        for c in 0..self.surveys.len() {
            self.seed_comparative_cell(doc, r, c);
        }
    }

    fn seed_comparative_cell(&self, doc: &mut dyn FieldDocument, r: usize, c: usize) {
        let section = Section::Comparatives(self.method);
        let at = |field| field_path(section, Address::Cell { row: r, column: c }, field);
        let survey = &self.surveys[c];
        put(doc, at(fields::MARKET_ID), FieldValue::text(&survey.id));
        put(doc, at(fields::VALUE), survey.factor(&self.comparative_rows[r].factor_code));
    }

    fn seed_row(&self, doc: &mut dyn FieldDocument, r: usize, template_factor: Option<&TemplateFactor>) {
        let section = self.row_section();
        let at = |field| field_path(section, Address::Row(r), field);
        put(doc, at(fields::FACTOR_CODE), FieldValue::text(&self.rows[r].factor_code));
        if self.method == Method::Wqs {
            put(doc, at(fields::WEIGHT), optional(template_factor.and_then(|f| f.weight)));
            put(doc, at(fields::INTENSITY), optional(template_factor.and_then(|f| f.intensity)));
            put(doc, at(fields::COLLATERAL), FieldValue::Empty);
        }
        for c in 0..self.surveys.len() {
            self.seed_row_cell(doc, r, c);
        }
    }

    fn seed_row_cell(&self, doc: &mut dyn FieldDocument, r: usize, c: usize) {
        let section = self.row_section();
        let at = |field| field_path(section, Address::Cell { row: r, column: c }, field);
        put(doc, at(fields::MARKET_ID), FieldValue::text(&self.surveys[c].id));
        let input = match self.method {
            Method::Wqs => fields::SURVEY_SCORE,
            Method::SaleGrid => fields::ADJUSTMENT_PCT,
        };
        put(doc, at(input), FieldValue::Empty);
    }

    /// Per-survey columns of the single-block sections.
    fn seed_block_columns(&self, doc: &mut dyn FieldDocument, c: usize) {
        let survey = &self.surveys[c];
        if self.method == Method::Wqs {
            put(
                doc,
                field_path(Section::TotalScores, Address::Column(c), fields::MARKET_ID),
                FieldValue::text(&survey.id),
            );
        }

        let at = |field| field_path(Section::Calculations(self.method), Address::Column(c), field);
        let years = years_since_sale(survey, &self.property).map(f64::from);
        put(doc, at(fields::MARKET_ID), FieldValue::text(&survey.id));
        put(doc, at(fields::OFFERING_PRICE), survey.factor(factor_codes::OFFERING_PRICE));
        put(doc, at(fields::OFFERING_PRICE_ADJUSTMENT_PCT), FieldValue::Empty);
        put(doc, at(fields::OFFERING_PRICE_ADJUSTMENT_AMT), FieldValue::Empty);
        put(doc, at(fields::SELLING_PRICE), survey.factor(factor_codes::SELLING_PRICE));
        put(doc, at(fields::NUMBER_OF_YEARS), optional(years));
        put(doc, at(fields::SELLING_PRICE_ADJUSTMENT_YEAR), FieldValue::Empty);

        if self.method == Method::SaleGrid {
            put(doc, at(fields::LAND_AREA), survey.factor(factor_codes::LAND_AREA));
            put(doc, at(fields::USABLE_AREA), survey.factor(factor_codes::USABLE_AREA));
            put(doc, at(fields::LAND_UNIT_PRICE), FieldValue::Empty);
            put(doc, at(fields::BUILDING_UNIT_PRICE), FieldValue::Empty);
        }
    }

    fn seed_final_block(&self, doc: &mut dyn FieldDocument) {
        put(
            doc,
            field_path(Section::FinalValue(self.method), Address::Block, fields::LAND_AREA),
            optional(self.property.land_area),
        );
    }

    /// Give every column an equal share of the total weight. WQS weights are
    /// always fractions; sale-grid weights follow the configured scale.
    fn resplit_weights(&self, doc: &mut dyn FieldDocument) {
        let scale = match self.method {
            Method::Wqs => WeightScale::Fraction,
            Method::SaleGrid => self.options.weight_scale,
        };
        let share = scale.equal_weight(self.surveys.len());
        for c in 0..self.surveys.len() {
            put(
                doc,
                field_path(Section::Calculations(self.method), Address::Column(c), fields::WEIGHT),
                FieldValue::Number(share),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::model::CollateralType;
    use chrono::NaiveDate;

    fn template() -> Template {
        Template {
            template_code: "T-LAND".into(),
            collateral_type_id: "L".into(),
            calculation_factors: vec![],
            comparative_factors: vec![TemplateFactor::new(factor_codes::LAND_AREA)],
            qualitative_factors: vec![
                TemplateFactor::weighted("01", 0.3, 8.0),
                TemplateFactor::weighted("02", 0.7, 5.0),
            ],
        }
    }

    fn surveys(n: usize) -> Vec<Survey> {
        (0..n)
            .map(|i| {
                Survey::new(format!("S-{i}"))
                    .with_factor(factor_codes::LAND_AREA, 90.0 + i as f64)
                    .with_factor(factor_codes::SELLING_PRICE, 21500.0)
                    .with_factor(factor_codes::SELLING_DATE, "2021-07-01")
            })
            .collect()
    }

    fn property() -> Property {
        let mut property = Property::new(CollateralType::Land);
        property.land_area = Some(100.0);
        property.appraisal_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        property
    }

    fn generate(method: Method, n: usize, doc: &mut MemoryDocument) -> Worksheet {
        Worksheet::generate(method, template(), surveys(n), property(), EngineOptions::default(), doc).unwrap()
    }

    fn calc(method: Method, c: usize, field: &str) -> FieldPath {
        field_path(Section::Calculations(method), Address::Column(c), field)
    }

    #[test]
    fn test_generate_seeds_every_section() {
        let mut doc = MemoryDocument::new();
        doc.set(&"stale.value".parse().unwrap(), 1.0.into(), SetOptions::user());
        let ws = generate(Method::Wqs, 3, &mut doc);

        assert!(ws.check_shape(&doc).is_ok());
        assert_eq!(doc.get(&"stale.value".parse().unwrap()), FieldValue::Empty);
        assert_eq!(
            doc.get(&field_path(Section::Scores, Address::Row(0), fields::WEIGHT)),
            FieldValue::Number(0.3)
        );
        assert_eq!(
            doc.get(&field_path(
                Section::Comparatives(Method::Wqs),
                Address::Cell { row: 0, column: 2 },
                fields::VALUE
            )),
            FieldValue::Number(92.0)
        );
        assert_eq!(doc.number(&calc(Method::Wqs, 1, fields::SELLING_PRICE)), 21500.0);
        assert_eq!(doc.number(&calc(Method::Wqs, 1, fields::NUMBER_OF_YEARS)), 2.0);
        assert_eq!(
            doc.number(&field_path(Section::FinalValue(Method::Wqs), Address::Block, fields::LAND_AREA)),
            100.0
        );
        assert!(ws.rows().iter().all(|r| r.locked));
    }

    #[test]
    fn test_wqs_columns_share_weight_equally() {
        let mut doc = MemoryDocument::new();
        let mut ws = generate(Method::Wqs, 4, &mut doc);
        for c in 0..4 {
            assert_eq!(doc.number(&calc(Method::Wqs, c, fields::WEIGHT)), 0.25);
        }

        ws.remove_survey(&mut doc, 3).unwrap();
        assert_eq!(doc.number(&calc(Method::Wqs, 0, fields::WEIGHT)), 1.0 / 3.0);
        ws.add_survey(&mut doc, Survey::new("S-7")).unwrap();
        assert_eq!(doc.number(&calc(Method::Wqs, 3, fields::WEIGHT)), 0.25);
    }

    #[test]
    fn test_duplicate_surveys_rejected() {
        let mut doc = MemoryDocument::new();
        let mut list = surveys(2);
        list.push(list[0].clone());
        let err = Worksheet::generate(Method::Wqs, template(), list, property(), EngineOptions::default(), &mut doc)
            .unwrap_err();
        assert_eq!(err, WorksheetError::DuplicateSurvey("S-0".into()));

        let mut ws = generate(Method::Wqs, 2, &mut doc);
        assert!(ws.add_survey(&mut doc, Survey::new("S-1")).is_err());
    }

    #[test]
    fn test_rows_add_and_remove() {
        let mut doc = MemoryDocument::new();
        let mut ws = generate(Method::Wqs, 2, &mut doc);
        let first = ws.add_row(&mut doc, "09");
        let second = ws.add_row(&mut doc, "10");
        assert_eq!((first, second), (2, 3));
        assert!(ws.check_shape(&doc).is_ok());

        assert_eq!(ws.remove_row(&mut doc, 0), Err(WorksheetError::LockedRow(0)));
        assert_eq!(
            ws.remove_row(&mut doc, 7),
            Err(WorksheetError::RowOutOfRange { index: 7, len: 4 })
        );

        let weight = |r| field_path(Section::Scores, Address::Row(r), fields::WEIGHT);
        doc.set(&weight(3), 0.5.into(), SetOptions::user());
        ws.remove_row(&mut doc, 2).unwrap();
        assert_eq!(ws.rows().len(), 3);
        assert_eq!(ws.rows()[2].factor_code, "10");
        assert_eq!(doc.number(&weight(2)), 0.5);
        assert!(doc.is_dirty(&weight(2)));
        assert_eq!(doc.index_count(&Section::Scores.path()), 3);
        assert!(ws.check_shape(&doc).is_ok());
    }

    #[test]
    fn test_surveys_reshape_every_section() {
        let mut doc = MemoryDocument::new();
        let mut ws = generate(Method::SaleGrid, 2, &mut doc);
        assert_eq!(doc.number(&calc(Method::SaleGrid, 1, fields::WEIGHT)), 50.0);

        let c = ws
            .add_survey(&mut doc, Survey::new("S-9").with_factor(factor_codes::OFFERING_PRICE, 30000.0))
            .unwrap();
        assert_eq!(c, 2);
        assert!(ws.check_shape(&doc).is_ok());
        assert_eq!(doc.number(&calc(Method::SaleGrid, 0, fields::WEIGHT)), 33.33);
        assert_eq!(doc.number(&calc(Method::SaleGrid, 2, fields::OFFERING_PRICE)), 30000.0);

        let removed = ws.remove_survey(&mut doc, 0).unwrap();
        assert_eq!(removed.id, "S-0");
        assert!(ws.check_shape(&doc).is_ok());
        assert_eq!(doc.get(&calc(Method::SaleGrid, 0, fields::MARKET_ID)), FieldValue::text("S-1"));
        assert_eq!(doc.number(&calc(Method::SaleGrid, 1, fields::OFFERING_PRICE)), 30000.0);
        assert_eq!(doc.number(&calc(Method::SaleGrid, 1, fields::WEIGHT)), 50.0);
        assert_eq!(
            doc.get(&field_path(
                Section::Qualitatives,
                Address::Cell { row: 1, column: 1 },
                fields::MARKET_ID
            )),
            FieldValue::text("S-9")
        );

        assert_eq!(
            ws.remove_survey(&mut doc, 5).unwrap_err(),
            WorksheetError::SurveyOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let mut doc = MemoryDocument::new();
        let ws = generate(Method::Wqs, 2, &mut doc);
        doc.remove_subtree(&columns_path(Section::Scores, Some(1)).index(1));
        assert_eq!(
            ws.check_shape(&doc),
            Err(RuleSetError::ShapeMismatch {
                section: "WQSScores",
                row: Some(1),
                expected: 2,
                found: 1,
            })
        );
    }
}
