//! Recalculation reporting.
//!
//! This module defines what one evaluation cycle of the engine reports back,
//! and the cycle diagnostics produced by the rule-set lint.

use crate::path::FieldPath;

/// Report from one evaluation cycle (up to `max_passes` passes).
///
/// This is the backbone for debug logging and the CLI's `--report` output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcReport {
    /// Time taken for the cycle in microseconds.
    pub duration_us: u64,

    /// Number of passes run. A settled cycle always ends with a pass that
    /// wrote nothing.
    pub passes: usize,

    /// Number of document writes performed.
    pub writes: usize,

    /// Targets written during the cycle, in first-write order, deduplicated.
    pub changed: Vec<FieldPath>,

    /// Rules whose guard allowed them to run, summed over passes.
    pub rules_evaluated: usize,

    /// Rules skipped by their guard, summed over passes.
    pub rules_skipped: usize,

    /// Computations that failed or produced nothing usable.
    pub fallbacks: Vec<RecalcFallback>,

    /// True if the last pass wrote nothing.
    pub converged: bool,
}

impl RecalcReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&mut self, target: &FieldPath) {
        self.writes += 1;
        if !self.changed.contains(target) {
            self.changed.push(target.clone());
        }
    }

    /// Format as a concise one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{} writes in {} passes, {}us, evaluated={}, skipped={}, fallbacks={}, converged={}",
            self.writes,
            self.passes,
            self.duration_us,
            self.rules_evaluated,
            self.rules_skipped,
            self.fallbacks.len(),
            self.converged,
        )
    }

    /// Format as a one-line log entry.
    ///
    /// Format: `[recalc] 120us  2 passes  14 writes  fallbacks=0  converged=true`
    pub fn log_line(&self) -> String {
        format!(
            "[recalc] {:>4}us  {} passes  {} writes  fallbacks={}  converged={}",
            self.duration_us,
            self.passes,
            self.writes,
            self.fallbacks.len(),
            self.converged,
        )
    }

    /// True if the cycle wrote `path`.
    pub fn touched(&self, path: &FieldPath) -> bool {
        self.changed.contains(path)
    }
}

/// A rule whose computation was replaced by its default value.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalcFallback {
    /// Target the default was written to.
    pub target: FieldPath,

    /// Description of the failure.
    pub reason: String,
}

impl RecalcFallback {
    pub fn new(target: FieldPath, reason: impl Into<String>) -> Self {
        Self {
            target,
            reason: reason.into(),
        }
    }
}

/// Report when the lint finds rules reading each other's targets in a loop.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Targets of the rules on the cycle, in declaration order.
    pub targets: Vec<FieldPath>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    /// Create a cycle report for a rule reading its own target.
    pub fn self_reference(target: FieldPath) -> Self {
        let message = format!("Rule for {} reads its own target", target);
        Self {
            targets: vec![target],
            message,
        }
    }

    /// Create a cycle report for a multi-rule cycle.
    pub fn cycle(targets: Vec<FieldPath>) -> Self {
        let names: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        let message = match (names.first(), names.last()) {
            (Some(first), Some(last)) if names.len() > 5 => format!(
                "Circular dependency involving {} rules: {} → ... → {}",
                names.len(),
                first,
                last
            ),
            _ => format!("Circular dependency: {}", names.join(" → ")),
        };
        Self { targets, message }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleReport {}
