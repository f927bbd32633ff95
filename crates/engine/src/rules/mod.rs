//! Rule sets for the two valuation methods.
//!
//! Builders return rules in dependency order (every rule reads only inputs
//! and targets declared before it), so a change settles in one pass plus the
//! confirming pass.

pub mod sale_grid;
pub mod shared;
pub mod wqs;

use serde::{Deserialize, Serialize};

use crate::dep_graph::DepGraph;
use crate::document::FieldDocument;
use crate::engine::EngineOptions;
use crate::error::RuleSetError;
use crate::path::{columns_path, FieldPath, Method, Section};
use crate::recalc::CycleReport;
use crate::rule::RuleSet;
use crate::value::FieldValue;

/// Document field names.
pub mod fields {
    // Row and column identity
    pub const FACTOR_CODE: &str = "factorCode";
    pub const MARKET_ID: &str = "marketId";
    pub const VALUE: &str = "value";

    // WQS scoring rows
    pub const WEIGHT: &str = "weight";
    pub const INTENSITY: &str = "intensity";
    pub const WEIGHTED_INTENSITY: &str = "weightedIntensity";
    pub const SURVEY_SCORE: &str = "surveyScore";
    pub const WEIGHTED_SURVEY_SCORE: &str = "weightedSurveyScore";
    pub const COLLATERAL: &str = "collateral";
    pub const COLLATERAL_WEIGHTED_SCORE: &str = "collateralWeightedScore";

    // WQS totals
    pub const TOTAL_WEIGHT: &str = "totalWeight";
    pub const TOTAL_WEIGHTED_INTENSITY: &str = "totalWeightedIntensity";
    pub const TOTAL_SURVEY_SCORE: &str = "totalSurveyScore";
    pub const TOTAL_WEIGHTED_SURVEY_SCORE: &str = "totalWeightedSurveyScore";
    pub const TOTAL_COLLATERAL_SCORE: &str = "totalCollateralScore";
    pub const TOTAL_WEIGHTED_COLLATERAL_SCORE: &str = "totalWeightedCollateralScore";

    // Calculation columns
    pub const OFFERING_PRICE: &str = "offeringPrice";
    pub const OFFERING_PRICE_ADJUSTMENT_PCT: &str = "offeringPriceAdjustmentPct";
    pub const OFFERING_PRICE_ADJUSTMENT_AMT: &str = "offeringPriceAdjustmentAmt";
    pub const SELLING_PRICE: &str = "sellingPrice";
    pub const NUMBER_OF_YEARS: &str = "numberOfYears";
    pub const SELLING_PRICE_ADJUSTMENT_YEAR: &str = "sellingPriceAdjustmentYear";
    pub const ADJUSTED_VALUE: &str = "adjustedValue";

    // Sale-grid second revision
    pub const LAND_AREA: &str = "landArea";
    pub const USABLE_AREA: &str = "usableArea";
    pub const LAND_UNIT_PRICE: &str = "landUnitPrice";
    pub const BUILDING_UNIT_PRICE: &str = "buildingUnitPrice";
    pub const LAND_AREA_OF_DEFICIENT: &str = "landAreaOfDeficient";
    pub const LAND_VALUE_INCREASE_DECREASE: &str = "landValueIncreaseDecrease";
    pub const USABLE_AREA_OF_DEFICIENT: &str = "usableAreaOfDeficient";
    pub const BUILDING_VALUE_INCREASE_DECREASE: &str = "buildingValueIncreaseDecrease";
    pub const TOTAL_SECOND_REVISION: &str = "totalSecondRevision";
    pub const TOTAL_QUALITATIVE_ADJUSTMENT: &str = "totalQualitativeAdjustment";
    pub const TOTAL_ADJUST_VALUE: &str = "totalAdjustValue";
    pub const WEIGHTED_ADJUST_VALUE: &str = "weightedAdjustValue";

    // Sale-grid qualitative rows
    pub const ADJUSTMENT_PCT: &str = "adjustmentPct";
    pub const ADJUST_AMOUNT: &str = "adjustAmount";

    // Final value block
    pub const FINAL_VALUE: &str = "finalValue";
    pub const FINAL_VALUE_ROUNDED: &str = "finalValueRounded";
    pub const COEFFICIENT_OF_DECISION: &str = "coefficientOfDecision";
    pub const STANDARD_ERROR: &str = "standardError";
    pub const INTERSECTION_POINT: &str = "intersectionPoint";
    pub const SLOPE: &str = "slope";
    pub const LOWEST_ESTIMATE: &str = "lowestEstimate";
    pub const HIGHEST_ESTIMATE: &str = "highestEstimate";
    pub const APPRAISAL_PRICE: &str = "appraisalPrice";
    pub const APPRAISAL_PRICE_ROUNDED: &str = "appraisalPriceRounded";
}

/// Shape of a worksheet: how many factor rows and survey columns each grid
/// section holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub method: Method,
    /// Rows of the comparison table.
    pub comparative_rows: usize,
    /// Rows of the scoring (WQS) or qualitative (sale grid) section.
    pub rows: usize,
    pub surveys: usize,
}

impl GridLayout {
    /// Section holding the method's factor rows.
    pub fn row_section(&self) -> Section {
        match self.method {
            Method::Wqs => Section::Scores,
            Method::SaleGrid => Section::Qualitatives,
        }
    }

    /// Every section with one column per survey, with its row count
    /// (`None` for single-block sections).
    pub fn grid_sections(&self) -> Vec<(Section, Option<usize>)> {
        let mut sections = vec![
            (Section::Comparatives(self.method), Some(self.comparative_rows)),
            (self.row_section(), Some(self.rows)),
        ];
        if self.method == Method::Wqs {
            sections.push((Section::TotalScores, None));
        }
        sections.push((Section::Calculations(self.method), None));
        sections
    }
}

/// Rules for `layout`, in dependency order.
pub fn build_rules(layout: &GridLayout, options: &EngineOptions) -> RuleSet {
    match layout.method {
        Method::Wqs => wqs::build(layout),
        Method::SaleGrid => sale_grid::build(layout, options.weight_scale),
    }
}

/// Confirm every grid section has the row and column counts of `layout`.
///
/// Missing leaves are not an error for the engine (they read as empty), but
/// a worksheet whose sections were not reshaped together computes garbage.
pub fn check_shape(doc: &dyn FieldDocument, layout: &GridLayout) -> Result<(), RuleSetError> {
    for (section, rows) in layout.grid_sections() {
        match rows {
            Some(rows) => {
                let found = doc.index_count(&section.path());
                if found != rows {
                    return Err(RuleSetError::RowCountMismatch {
                        section: section.root(),
                        expected: rows,
                        found,
                    });
                }
                for row in 0..rows {
                    let found = doc.index_count(&columns_path(section, Some(row)));
                    if found != layout.surveys {
                        return Err(RuleSetError::ShapeMismatch {
                            section: section.root(),
                            row: Some(row),
                            expected: layout.surveys,
                            found,
                        });
                    }
                }
            }
            None => {
                let found = doc.index_count(&columns_path(section, None));
                if found != layout.surveys {
                    return Err(RuleSetError::ShapeMismatch {
                        section: section.root(),
                        row: None,
                        expected: layout.surveys,
                        found,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Static findings about a rule set.
#[derive(Debug, Default)]
pub struct LintReport {
    pub duplicate_targets: Vec<RuleSetError>,
    pub cycles: Vec<CycleReport>,
    /// `(reader, target read)` pairs where the target is declared later.
    pub forward_reads: Vec<(FieldPath, FieldPath)>,
    /// Worst-case passes needed for one change to settle.
    pub passes_to_settle: usize,
}

impl LintReport {
    /// True if the set would settle within `max_passes` with one writer per target.
    pub fn is_clean(&self, max_passes: usize) -> bool {
        self.duplicate_targets.is_empty() && self.cycles.is_empty() && self.passes_to_settle <= max_passes
    }
}

pub fn lint(rules: &RuleSet) -> LintReport {
    let mut report = LintReport::default();

    let mut seen = rustc_hash::FxHashSet::default();
    for rule in rules.rules() {
        if !seen.insert(&rule.target) {
            report.duplicate_targets.push(RuleSetError::DuplicateTarget(rule.target.clone()));
        }
    }

    let graph = DepGraph::build(rules);
    let target = |id: usize| rules.rules()[id].target.clone();
    for scc in graph.find_cycle_sccs() {
        let targets: Vec<FieldPath> = scc.iter().map(|&id| target(id)).collect();
        report.cycles.push(if targets.len() == 1 {
            CycleReport::self_reference(targets[0].clone())
        } else {
            CycleReport::cycle(targets)
        });
    }
    report.forward_reads = graph
        .forward_reads()
        .into_iter()
        .map(|f| (target(f.reader), target(f.producer)))
        .collect();
    report.passes_to_settle = graph.passes_to_settle();
    report
}

pub(crate) fn numbers(doc: &dyn FieldDocument, paths: &[FieldPath]) -> Vec<f64> {
    paths.iter().map(|p| doc.number(p)).collect()
}

pub(crate) fn values(doc: &dyn FieldDocument, paths: &[FieldPath]) -> Vec<FieldValue> {
    paths.iter().map(|p| doc.get(p)).collect()
}
