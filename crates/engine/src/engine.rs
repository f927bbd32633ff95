//! Reactive evaluation of a rule set over a field document.
//!
//! The engine subscribes to the union of its rules' dependencies. Any change
//! to one of those paths marks it pending; the next [`DerivedFields::sync`]
//! runs a cycle of bounded passes over the rules in declaration order,
//! stopping at the first pass that writes nothing.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use crate::calc::WeightScale;
use crate::document::FieldDocument;
use crate::events::{DocumentEvent, SubscriptionId};
use crate::path::FieldPath;
use crate::recalc::{RecalcFallback, RecalcReport};
use crate::rule::{RuleContext, RuleSet};
use crate::value::FieldValue;

/// Default limit on passes per cycle.
pub const MAX_PASSES: usize = 3;

/// Tuning knobs for an engine and the rule sets it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_passes: usize,
    /// How sale-grid column weights are entered.
    pub weight_scale: WeightScale,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_passes: MAX_PASSES,
            weight_scale: WeightScale::default(),
        }
    }
}

/// A rule set bound to one document.
pub struct DerivedFields {
    rules: RuleSet,
    ctx: RuleContext,
    options: EngineOptions,
    /// Set by the subscription callback, cleared by a converged cycle.
    pending: Rc<Cell<bool>>,
    subscription: Option<SubscriptionId>,
}

impl DerivedFields {
    pub fn new(rules: RuleSet, ctx: RuleContext, options: EngineOptions) -> Self {
        Self {
            rules,
            ctx,
            options,
            pending: Rc::new(Cell::new(true)),
            subscription: None,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn context(&self) -> &RuleContext {
        &self.ctx
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// True if a watched path changed (or the last cycle did not settle)
    /// since the last cycle.
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to every dependency path and run the construction cycle.
    pub fn attach(&mut self, doc: &mut dyn FieldDocument) -> RecalcReport {
        self.detach(doc);
        let pending = Rc::clone(&self.pending);
        let id = doc.subscribe(
            self.rules.watched_paths(),
            Box::new(move |event: &DocumentEvent| match event {
                DocumentEvent::FieldChanged(_) | DocumentEvent::FieldRemoved(_) | DocumentEvent::Reset => {
                    pending.set(true)
                }
            }),
        );
        self.subscription = Some(id);
        self.evaluate(doc)
    }

    /// Drop the subscription. Values already written stay in the document.
    pub fn detach(&mut self, doc: &mut dyn FieldDocument) -> bool {
        match self.subscription.take() {
            Some(id) => doc.unsubscribe(id),
            None => false,
        }
    }

    /// Run a cycle if a watched path changed since the last one.
    pub fn sync(&mut self, doc: &mut dyn FieldDocument) -> Option<RecalcReport> {
        if !self.pending.get() {
            return None;
        }
        Some(self.evaluate(doc))
    }

    /// Run a cycle unconditionally.
    pub fn evaluate(&mut self, doc: &mut dyn FieldDocument) -> RecalcReport {
        let start = Instant::now();
        let mut report = RecalcReport::new();
        self.pending.set(false);

        for _ in 0..self.options.max_passes.max(1) {
            let writes = self.run_pass(doc, &mut report);
            report.passes += 1;
            if writes == 0 {
                report.converged = true;
                break;
            }
        }

        // Our own writes to watched paths re-mark the engine; a settled
        // cycle has already accounted for them.
        self.pending.set(!report.converged);
        report.duration_us = start.elapsed().as_micros() as u64;

        if report.converged {
            log::debug!("{}", report.log_line());
        } else {
            log::warn!(
                "derived fields did not settle within {} passes ({} writes); continuing on next change",
                report.passes,
                report.writes
            );
        }
        report
    }

    /// One pass over the rules in declaration order. Returns the number of
    /// writes made.
    ///
    /// Compute closures must report failure through `Err`, never by
    /// panicking. An `Err` (or a missing value) writes the rule's default and
    /// the pass moves on to the next rule; a panic unwinds out of the cycle
    /// and leaves the document half-updated.
    fn run_pass(&self, doc: &mut dyn FieldDocument, report: &mut RecalcReport) -> usize {
        let mut writes = 0;
        for rule in self.rules.rules() {
            if !rule.guard.allows(doc, &rule.target) {
                report.rules_skipped += 1;
                continue;
            }
            report.rules_evaluated += 1;

            let candidate = match (rule.compute)(doc, &self.ctx) {
                Ok(value) if !value.is_missing() => value,
                Ok(_) => {
                    self.fall_back(report, rule.target.clone(), "no value");
                    rule.default_value.clone()
                }
                Err(err) => {
                    self.fall_back(report, rule.target.clone(), err.to_string());
                    rule.default_value.clone()
                }
            };

            let candidate = rule.normalized(candidate);
            let current: FieldValue = rule.normalized(doc.get(&rule.target));
            if doc.field(&rule.target).is_some() && rule.same(&current, &candidate) {
                continue;
            }
            doc.set(&rule.target, candidate, rule.write_options);
            report.record_write(&rule.target);
            writes += 1;
        }
        writes
    }

    fn fall_back(&self, report: &mut RecalcReport, target: FieldPath, reason: impl Into<String>) {
        if report.fallbacks.iter().any(|f| f.target == target) {
            return;
        }
        let reason = reason.into();
        log::debug!("{}: falling back to default ({})", target, reason);
        report.fallbacks.push(RecalcFallback::new(target, reason));
    }
}

impl std::fmt::Debug for DerivedFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedFields")
            .field("rules", &self.rules.len())
            .field("options", &self.options)
            .field("pending", &self.pending.get())
            .field("attached", &self.is_attached())
            .finish()
    }
}
