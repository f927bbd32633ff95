//! A live worksheet: document, structure and engine kept together.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{FieldDocument, MemoryDocument, SetOptions};
use crate::engine::{DerivedFields, EngineOptions};
use crate::error::WorksheetError;
use crate::model::{Property, Survey, Template};
use crate::path::{FieldPath, Method, Section, Segment};
use crate::recalc::RecalcReport;
use crate::value::FieldValue;
use crate::worksheet::Worksheet;

/// Snapshot of a worksheet's final value block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalValues {
    pub method: Method,
    /// Field name to value, for every leaf of the block.
    pub values: BTreeMap<String, FieldValue>,
}

impl FinalValues {
    pub fn get(&self, field: &str) -> FieldValue {
        self.values.get(field).cloned().unwrap_or_default()
    }
}

/// A user edit replayed onto a generated worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    pub path: FieldPath,
    pub value: FieldValue,
}

/// Everything needed to rebuild a worksheet: inputs plus the user's edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetInput {
    pub method: Method,
    pub template: Template,
    #[serde(default)]
    pub surveys: Vec<Survey>,
    #[serde(default)]
    pub property: Property,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

pub struct Session {
    doc: MemoryDocument,
    worksheet: Worksheet,
    engine: DerivedFields,
    last_report: RecalcReport,
}

impl Session {
    /// Generate a worksheet into a fresh document and attach its engine.
    pub fn generate(
        method: Method,
        template: Template,
        surveys: Vec<Survey>,
        property: Property,
        options: EngineOptions,
    ) -> Result<Self, WorksheetError> {
        let mut doc = MemoryDocument::new();
        let worksheet = Worksheet::generate(method, template, surveys, property, options, &mut doc)?;
        let mut engine = DerivedFields::new(worksheet.rules(), worksheet.context(), options);
        let last_report = engine.attach(&mut doc);
        let session = Self {
            doc,
            worksheet,
            engine,
            last_report,
        };
        session.warn_on_shape_mismatch();
        Ok(session)
    }

    /// Generate the worksheet described by `input` and replay its edits in order.
    pub fn from_input(input: WorksheetInput, options: EngineOptions) -> Result<Self, WorksheetError> {
        let mut session = Self::generate(input.method, input.template, input.surveys, input.property, options)?;
        for edit in input.edits {
            session.edit(&edit.path, edit.value);
        }
        Ok(session)
    }

    pub fn document(&self) -> &MemoryDocument {
        &self.doc
    }

    pub fn worksheet(&self) -> &Worksheet {
        &self.worksheet
    }

    pub fn engine(&self) -> &DerivedFields {
        &self.engine
    }

    /// Report of the most recent engine cycle.
    pub fn last_report(&self) -> &RecalcReport {
        &self.last_report
    }

    pub fn value(&self, path: &FieldPath) -> FieldValue {
        self.doc.get(path)
    }

    /// Write `value` as a user edit (dirty and touched) and let the engine
    /// catch up. Returns the cycle report if one ran.
    pub fn edit(&mut self, path: &FieldPath, value: FieldValue) -> Option<RecalcReport> {
        self.doc.set(path, value, SetOptions::user());
        self.sync()
    }

    /// Empty the field, handing auto-defaulted fields back to their rule.
    pub fn clear(&mut self, path: &FieldPath) -> Option<RecalcReport> {
        self.edit(path, FieldValue::Empty)
    }

    /// Run the engine if anything it watches changed.
    pub fn sync(&mut self) -> Option<RecalcReport> {
        let report = self.engine.sync(&mut self.doc)?;
        self.last_report = report.clone();
        Some(report)
    }

    pub fn add_row(&mut self, factor_code: &str) -> usize {
        let index = self.worksheet.add_row(&mut self.doc, factor_code);
        self.rebuild();
        index
    }

    pub fn remove_row(&mut self, index: usize) -> Result<(), WorksheetError> {
        self.worksheet.remove_row(&mut self.doc, index)?;
        self.rebuild();
        Ok(())
    }

    pub fn add_survey(&mut self, survey: Survey) -> Result<usize, WorksheetError> {
        let index = self.worksheet.add_survey(&mut self.doc, survey)?;
        self.rebuild();
        Ok(index)
    }

    pub fn remove_survey(&mut self, index: usize) -> Result<Survey, WorksheetError> {
        let removed = self.worksheet.remove_survey(&mut self.doc, index)?;
        self.rebuild();
        Ok(removed)
    }

    /// Snapshot of the final value block.
    pub fn final_values(&self) -> FinalValues {
        let method = self.worksheet.method();
        let block = Section::FinalValue(method).path();
        let values = self
            .doc
            .paths_under(&block)
            .into_iter()
            .filter_map(|path| match path.segments() {
                [_, Segment::Key(field)] => Some((field.clone(), self.doc.get(&path))),
                _ => None,
            })
            .collect();
        FinalValues { method, values }
    }

    /// Replace the engine after the worksheet's shape changed.
    fn rebuild(&mut self) {
        self.engine.detach(&mut self.doc);
        self.engine = DerivedFields::new(self.worksheet.rules(), self.worksheet.context(), self.worksheet.options());
        self.last_report = self.engine.attach(&mut self.doc);
        self.warn_on_shape_mismatch();
    }

    fn warn_on_shape_mismatch(&self) {
        if let Err(err) = self.worksheet.check_shape(&self.doc) {
            log::warn!("worksheet shape mismatch: {}", err);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("layout", &self.worksheet.layout())
            .field("fields", &self.doc.len())
            .field("engine", &self.engine)
            .finish()
    }
}
