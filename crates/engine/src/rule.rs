//! Derived rules: a target path kept equal to a function of other paths.
//!
//! A rule declares its dependencies explicitly. The engine re-evaluates a
//! rule set whenever one of those paths changes; the rule's `compute` reads
//! whatever it needs from the document and the shared [`RuleContext`].

use std::fmt;

use rustc_hash::FxHashSet;

use crate::document::{FieldDocument, SetOptions};
use crate::error::{ComputeError, RuleSetError};
use crate::model::{Property, Survey};
use crate::path::FieldPath;
use crate::value::FieldValue;

/// External inputs shared by every rule of a worksheet.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub property: Property,
    pub surveys: Vec<Survey>,
}

pub type ComputeFn = Box<dyn Fn(&dyn FieldDocument, &RuleContext) -> Result<FieldValue, ComputeError>>;
pub type PredicateFn = Box<dyn Fn(&dyn FieldDocument) -> bool>;
pub type NormalizeFn = Box<dyn Fn(&FieldValue) -> FieldValue>;
pub type EqualsFn = Box<dyn Fn(&FieldValue, &FieldValue) -> bool>;

/// Recompute an auto-defaulted field only while it is empty or not user-edited.
pub fn should_auto_default(current: &FieldValue, is_dirty: bool) -> bool {
    current.is_empty() || !is_dirty
}

/// When a rule is allowed to run.
pub enum Guard {
    Always,
    /// Run while the target is empty or not dirty. Once the user types a
    /// value the rule stops, until the user clears it again.
    AutoDefault,
    Custom(PredicateFn),
}

impl Guard {
    pub fn allows(&self, doc: &dyn FieldDocument, target: &FieldPath) -> bool {
        match self {
            Guard::Always => true,
            Guard::AutoDefault => {
                let state = doc.field(target);
                let value = state.map(|s| s.value.clone()).unwrap_or_default();
                should_auto_default(&value, state.is_some_and(|s| s.dirty))
            }
            Guard::Custom(when) => when(doc),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => write!(f, "Always"),
            Guard::AutoDefault => write!(f, "AutoDefault"),
            Guard::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// A single derived field.
pub struct DerivedRule {
    pub target: FieldPath,
    pub deps: Vec<FieldPath>,
    pub guard: Guard,
    /// Must return `Err` rather than panic on bad input.
    pub compute: ComputeFn,
    pub normalize: Option<NormalizeFn>,
    pub equals: Option<EqualsFn>,
    /// Written when `compute` fails or yields nothing usable.
    pub default_value: FieldValue,
    pub write_options: SetOptions,
}

impl DerivedRule {
    pub fn new<F>(target: FieldPath, deps: Vec<FieldPath>, compute: F) -> Self
    where
        F: Fn(&dyn FieldDocument, &RuleContext) -> Result<FieldValue, ComputeError> + 'static,
    {
        Self {
            target,
            deps,
            guard: Guard::Always,
            compute: Box::new(compute),
            normalize: None,
            equals: None,
            default_value: FieldValue::Number(0.0),
            write_options: SetOptions::computed(),
        }
    }

    /// Rule whose value is a plain number computed from the document.
    pub fn numeric<F>(target: FieldPath, deps: Vec<FieldPath>, compute: F) -> Self
    where
        F: Fn(&dyn FieldDocument, &RuleContext) -> f64 + 'static,
    {
        Self::new(target, deps, move |doc, ctx| Ok(FieldValue::number(compute(doc, ctx))))
    }

    pub fn auto_default(mut self) -> Self {
        self.guard = Guard::AutoDefault;
        self
    }

    pub fn when<F>(mut self, when: F) -> Self
    where
        F: Fn(&dyn FieldDocument) -> bool + 'static,
    {
        self.guard = Guard::Custom(Box::new(when));
        self
    }

    pub fn normalize_with<F>(mut self, normalize: F) -> Self
    where
        F: Fn(&FieldValue) -> FieldValue + 'static,
    {
        self.normalize = Some(Box::new(normalize));
        self
    }

    pub fn equals_with<F>(mut self, equals: F) -> Self
    where
        F: Fn(&FieldValue, &FieldValue) -> bool + 'static,
    {
        self.equals = Some(Box::new(equals));
        self
    }

    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default_value = value;
        self
    }

    pub fn write_options(mut self, options: SetOptions) -> Self {
        self.write_options = options;
        self
    }

    pub(crate) fn normalized(&self, value: FieldValue) -> FieldValue {
        match &self.normalize {
            Some(normalize) => normalize(&value),
            None => value,
        }
    }

    pub(crate) fn same(&self, a: &FieldValue, b: &FieldValue) -> bool {
        match &self.equals {
            Some(equals) => equals(a, b),
            None => a == b,
        }
    }
}

impl fmt::Debug for DerivedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedRule")
            .field("target", &self.target.to_string())
            .field("deps", &self.deps.iter().map(|d| d.to_string()).collect::<Vec<_>>())
            .field("guard", &self.guard)
            .finish()
    }
}

/// Ordered list of rules. Declaration order is evaluation order.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<DerivedRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: DerivedRule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
    }

    pub fn rules(&self) -> &[DerivedRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of every rule's dependencies.
    pub fn watched_paths(&self) -> FxHashSet<FieldPath> {
        self.rules.iter().flat_map(|r| r.deps.iter().cloned()).collect()
    }

    /// Every target must be written by exactly one rule.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        let mut seen = FxHashSet::default();
        for rule in &self.rules {
            if !seen.insert(&rule.target) {
                return Err(RuleSetError::DuplicateTarget(rule.target.clone()));
            }
        }
        Ok(())
    }
}

/// Rule sets evaluated by separate engines over one document must not share
/// any target.
pub fn check_disjoint(sets: &[&RuleSet]) -> Result<(), RuleSetError> {
    let mut seen = FxHashSet::default();
    for set in sets {
        set.validate()?;
        for rule in set.rules() {
            if !seen.insert(&rule.target) {
                return Err(RuleSetError::DuplicateTarget(rule.target.clone()));
            }
        }
    }
    Ok(())
}
