//! Field paths for the document.
//!
//! A `FieldPath` uniquely identifies a leaf in the field document. Paths are
//! stored as structured segments and serialized canonically as dot-separated
//! text with integer array indices:
//!
//! ```text
//! WQSScores.2.surveys.0.weightedSurveyScore
//! ```
//!
//! Rule targets and dependencies are always produced by [`field_path`], never
//! by string formatting at the call site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PathError;

/// One segment of a field path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Array position (0-based).
    Index(usize),
    /// Object key.
    Key(String),
}

/// Structured, canonical address of a document field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Create a path with a single key segment.
    pub fn root(key: &str) -> Self {
        Self {
            segments: vec![Segment::Key(key.to_string())],
        }
    }

    /// Append a key segment.
    pub fn key(mut self, key: &str) -> Self {
        self.segments.push(Segment::Key(key.to_string()));
        self
    }

    /// Append an index segment.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `prefix` addresses this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Replace `from` with `to` when it prefixes this path.
    pub fn rebase(&self, from: &FieldPath, to: &FieldPath) -> Option<FieldPath> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(FieldPath { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Index(n) => write!(f, "{n}")?,
                Segment::Key(k) => f.write_str(k)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                let index = part
                    .parse::<usize>()
                    .map_err(|_| PathError::BadIndex(part.to_string()))?;
                segments.push(Segment::Index(index));
            } else {
                segments.push(Segment::Key(part.to_string()));
            }
        }
        Ok(Self { segments })
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Valuation method a worksheet is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Weighted Quality Score.
    Wqs,
    /// Sale Adjustment Grid.
    SaleGrid,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wqs => write!(f, "wqs"),
            Self::SaleGrid => write!(f, "sale_grid"),
        }
    }
}

/// Top-level document sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// Survey factor comparison table (rows × surveys).
    Comparatives(Method),
    /// WQS scoring rows (rows × surveys).
    Scores,
    /// WQS totals (single block, per-survey columns).
    TotalScores,
    /// Sale-grid qualitative adjustment rows (rows × surveys).
    Qualitatives,
    /// Per-survey calculation pipeline.
    Calculations(Method),
    /// Final value block.
    FinalValue(Method),
}

impl Section {
    /// Root key of the section in the document.
    pub fn root(&self) -> &'static str {
        match self {
            Self::Comparatives(Method::Wqs) => "WQSComparatives",
            Self::Comparatives(Method::SaleGrid) => "saleAdjustmentGridComparatives",
            Self::Scores => "WQSScores",
            Self::TotalScores => "WQSTotalScores",
            Self::Qualitatives => "saleAdjustmentGridQualitatives",
            Self::Calculations(Method::Wqs) => "WQSCalculations",
            Self::Calculations(Method::SaleGrid) => "saleAdjustmentGridCalculations",
            Self::FinalValue(Method::Wqs) => "WQSFinalValue",
            Self::FinalValue(Method::SaleGrid) => "saleAdjustmentGridFinalValue",
        }
    }

    /// Path of the whole section.
    pub fn path(&self) -> FieldPath {
        FieldPath::root(self.root())
    }

    /// True if the section has one row per factor.
    pub fn has_rows(&self) -> bool {
        matches!(self, Self::Comparatives(_) | Self::Scores | Self::Qualitatives)
    }
}

/// Key under which per-survey columns are nested.
pub const SURVEYS: &str = "surveys";

/// Position of a field within a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Block,
    Row(usize),
    Column(usize),
    Cell { row: usize, column: usize },
}

/// Canonical path for `field` at `address` in `section`.
///
/// | address | path |
/// |---|---|
/// | `Block` | `root.field` |
/// | `Row(r)` | `root.r.field` |
/// | `Column(c)` | `root.surveys.c.field` |
/// | `Cell { r, c }` | `root.r.surveys.c.field` |
pub fn field_path(section: Section, address: Address, field: &str) -> FieldPath {
    debug_assert!(
        field != SURVEYS && !field.contains('.') && !field.bytes().all(|b| b.is_ascii_digit()),
        "invalid field name: {field}"
    );
    let base = section.path();
    let base = match address {
        Address::Block => base,
        Address::Row(row) => base.index(row),
        Address::Column(column) => base.key(SURVEYS).index(column),
        Address::Cell { row, column } => base.index(row).key(SURVEYS).index(column),
    };
    base.key(field)
}

/// Path of a whole row subtree (`root.r`).
pub fn row_path(section: Section, row: usize) -> FieldPath {
    section.path().index(row)
}

/// Path of the column list that holds `column` within `row` (or the block).
pub fn columns_path(section: Section, row: Option<usize>) -> FieldPath {
    match row {
        Some(r) => section.path().index(r).key(SURVEYS),
        None => section.path().key(SURVEYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_display_matches_data_layer_format() {
        let path = field_path(
            Section::Scores,
            Address::Cell { row: 2, column: 0 },
            "weightedSurveyScore",
        );
        assert_eq!(path.to_string(), "WQSScores.2.surveys.0.weightedSurveyScore");

        let path = field_path(Section::FinalValue(Method::SaleGrid), Address::Block, "finalValue");
        assert_eq!(path.to_string(), "saleAdjustmentGridFinalValue.finalValue");

        let path = field_path(Section::Calculations(Method::Wqs), Address::Column(3), "adjustedValue");
        assert_eq!(path.to_string(), "WQSCalculations.surveys.3.adjustedValue");
    }

    #[test]
    fn test_parse_roundtrip() {
        let text = "WQSScores.12.surveys.4.surveyScore";
        let path: FieldPath = text.parse().unwrap();
        assert_eq!(path.to_string(), text);
        assert_eq!(path.segments()[1], Segment::Index(12));
        assert_eq!(path, field_path(Section::Scores, Address::Cell { row: 12, column: 4 }, "surveyScore"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("".parse::<FieldPath>().is_err());
        assert!("a..b".parse::<FieldPath>().is_err());
        assert!("a.".parse::<FieldPath>().is_err());
    }

    #[test]
    fn test_rebase() {
        let leaf: FieldPath = "WQSScores.3.surveys.2.surveyScore".parse().unwrap();
        let from: FieldPath = "WQSScores.3".parse().unwrap();
        let to: FieldPath = "WQSScores.2".parse().unwrap();
        assert_eq!(
            leaf.rebase(&from, &to).unwrap().to_string(),
            "WQSScores.2.surveys.2.surveyScore"
        );
        assert!(to.rebase(&from, &to).is_none());
    }

    #[test]
    fn test_section_roots_are_unique() {
        let sections = [
            Section::Comparatives(Method::Wqs),
            Section::Comparatives(Method::SaleGrid),
            Section::Scores,
            Section::TotalScores,
            Section::Qualitatives,
            Section::Calculations(Method::Wqs),
            Section::Calculations(Method::SaleGrid),
            Section::FinalValue(Method::Wqs),
            Section::FinalValue(Method::SaleGrid),
        ];
        let roots: HashSet<_> = sections.iter().map(|s| s.root()).collect();
        assert_eq!(roots.len(), sections.len());
    }

    fn address() -> impl Strategy<Value = Address> {
        prop_oneof![
            Just(Address::Block),
            (0usize..20).prop_map(Address::Row),
            (0usize..20).prop_map(Address::Column),
            (0usize..20, 0usize..20).prop_map(|(row, column)| Address::Cell { row, column }),
        ]
    }

    proptest! {
        #[test]
        fn distinct_addresses_give_distinct_paths(
            a in address(),
            b in address(),
            fa in prop::sample::select(vec!["weight", "surveyScore", "value"]),
            fb in prop::sample::select(vec!["weight", "surveyScore", "value"]),
        ) {
            let pa = field_path(Section::Scores, a, fa);
            let pb = field_path(Section::Scores, b, fb);
            prop_assert_eq!(pa == pb, a == b && fa == fb);
            prop_assert_eq!(pa.to_string() == pb.to_string(), pa == pb);
        }
    }
}
