//! Dependency graph over a rule set.
//!
//! Rules are nodes. Edge direction:
//!
//! ```text
//! A → B  means  "B reads A's target"  (A is a precedent of B)
//! ```
//!
//! The engine itself does not need the graph to evaluate (it runs bounded
//! passes in declaration order), but the graph answers "which rules does
//! this path feed?" and backs the static checks: cycles, reads of targets
//! declared later, and chains deeper than the pass limit.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::path::FieldPath;
use crate::rule::RuleSet;

/// Index of a rule in its rule set.
pub type RuleId = usize;

/// Precedent/dependent adjacency between rules of one rule set.
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ preds[B] then B ∈ succs[A].
/// 2. **No dangling entries:** Empty sets are not stored.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// Rule writing each target path.
    producers: FxHashMap<FieldPath, RuleId>,
    /// Rules reading each dependency path.
    readers: FxHashMap<FieldPath, FxHashSet<RuleId>>,
    /// For each rule B, the rules A whose targets it reads.
    preds: FxHashMap<RuleId, FxHashSet<RuleId>>,
    /// For each rule A, the rules B reading its target.
    succs: FxHashMap<RuleId, FxHashSet<RuleId>>,
    rule_count: usize,
}

/// Rule `reader` depends on a target written by a rule declared after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardRead {
    pub reader: RuleId,
    pub producer: RuleId,
}

impl DepGraph {
    /// Build the graph for `rules`. The first rule wins if targets repeat;
    /// `RuleSet::validate` reports that case separately.
    pub fn build(rules: &RuleSet) -> Self {
        let mut graph = DepGraph {
            rule_count: rules.len(),
            ..Default::default()
        };
        for (id, rule) in rules.rules().iter().enumerate() {
            graph.producers.entry(rule.target.clone()).or_insert(id);
        }
        for (id, rule) in rules.rules().iter().enumerate() {
            for dep in &rule.deps {
                graph.readers.entry(dep.clone()).or_default().insert(id);
                if let Some(&producer) = graph.producers.get(dep) {
                    graph.preds.entry(id).or_default().insert(producer);
                    graph.succs.entry(producer).or_default().insert(id);
                }
            }
        }
        graph
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Rule writing `path`, if any.
    pub fn producer(&self, path: &FieldPath) -> Option<RuleId> {
        self.producers.get(path).copied()
    }

    /// Rules that list `path` as a dependency.
    pub fn readers(&self, path: &FieldPath) -> impl Iterator<Item = RuleId> + '_ {
        self.readers.get(path).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Rules whose targets `rule` reads.
    pub fn precedents(&self, rule: RuleId) -> impl Iterator<Item = RuleId> + '_ {
        self.preds.get(&rule).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Rules reading `rule`'s target.
    pub fn dependents(&self, rule: RuleId) -> impl Iterator<Item = RuleId> + '_ {
        self.succs.get(&rule).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Every rule affected by a change to `path`, directly or transitively.
    /// Sorted by declaration order.
    pub fn affected_by(&self, path: &FieldPath) -> Vec<RuleId> {
        let mut seen: FxHashSet<RuleId> = FxHashSet::default();
        let mut queue: Vec<RuleId> = self.readers(path).collect();
        while let Some(rule) = queue.pop() {
            if seen.insert(rule) {
                queue.extend(self.dependents(rule));
            }
        }
        let mut out: Vec<RuleId> = seen.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Reads of targets declared later in the rule set. Each one costs an
    /// extra pass before the set settles.
    pub fn forward_reads(&self) -> Vec<ForwardRead> {
        let mut out: Vec<ForwardRead> = self
            .preds
            .iter()
            .flat_map(|(&reader, producers)| {
                producers
                    .iter()
                    .filter(move |&&producer| producer > reader)
                    .map(move |&producer| ForwardRead { reader, producer })
            })
            .collect();
        out.sort_by_key(|f| (f.reader, f.producer));
        out
    }

    /// Number of passes a single change needs to settle, assuming the worst
    /// case: one extra pass for every forward read along a chain, plus the
    /// confirming pass. Rules on cycles are ignored.
    pub fn passes_to_settle(&self) -> usize {
        let cyclic = self.find_cycle_members();
        // Rules in declaration order: a rule's cost only depends on earlier
        // producers (same pass) and later producers (next pass).
        let mut cost: Vec<usize> = vec![1; self.rule_count];
        // Iterate to a fixed point; the graph minus cycles is a DAG so this
        // terminates after at most rule_count rounds.
        for _ in 0..self.rule_count.max(1) {
            let mut changed = false;
            for rule in 0..self.rule_count {
                if cyclic.contains(&rule) {
                    continue;
                }
                let mut best = 1;
                for producer in self.precedents(rule) {
                    if cyclic.contains(&producer) {
                        continue;
                    }
                    let extra = usize::from(producer > rule);
                    best = best.max(cost[producer] + extra);
                }
                if best != cost[rule] {
                    cost[rule] = best;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        cost.into_iter().max().map_or(1, |deepest| deepest + 1)
    }

    // =========================================================================
    // Cycle Membership (Tarjan's SCC)
    // =========================================================================

    /// Find all rules that are members of true cycles (SCC size > 1 or self-loop).
    ///
    /// Iterative Tarjan over `preds`, visiting rules in declaration order so
    /// the output is deterministic.
    pub fn find_cycle_members(&self) -> FxHashSet<RuleId> {
        let mut result: FxHashSet<RuleId> = FxHashSet::default();
        for scc in self.find_cycle_sccs() {
            result.extend(scc);
        }
        result
    }

    /// Find all non-trivial SCCs (cycle groups), each sorted by rule id.
    pub fn find_cycle_sccs(&self) -> Vec<Vec<RuleId>> {
        let mut index_counter: u32 = 0;
        let mut stack: Vec<RuleId> = Vec::new();
        let mut on_stack: FxHashSet<RuleId> = FxHashSet::default();
        let mut indices: FxHashMap<RuleId, u32> = FxHashMap::default();
        let mut lowlinks: FxHashMap<RuleId, u32> = FxHashMap::default();
        let mut sccs: Vec<Vec<RuleId>> = Vec::new();

        let sorted_neighbours = |rule: RuleId| -> Vec<RuleId> {
            let mut neighbours: Vec<RuleId> = self.precedents(rule).collect();
            neighbours.sort_unstable();
            neighbours
        };

        // Iterative to avoid stack overflow on long chains.
        struct DfsFrame {
            rule: RuleId,
            neighbours: Vec<RuleId>,
            next_idx: usize,
        }

        for root in 0..self.rule_count {
            if indices.contains_key(&root) {
                continue;
            }

            let mut dfs_stack: Vec<DfsFrame> = Vec::new();

            indices.insert(root, index_counter);
            lowlinks.insert(root, index_counter);
            index_counter += 1;
            stack.push(root);
            on_stack.insert(root);
            dfs_stack.push(DfsFrame {
                rule: root,
                neighbours: sorted_neighbours(root),
                next_idx: 0,
            });

            while let Some(frame) = dfs_stack.last_mut() {
                if frame.next_idx < frame.neighbours.len() {
                    let w = frame.neighbours[frame.next_idx];
                    frame.next_idx += 1;

                    if !indices.contains_key(&w) {
                        indices.insert(w, index_counter);
                        lowlinks.insert(w, index_counter);
                        index_counter += 1;
                        stack.push(w);
                        on_stack.insert(w);
                        dfs_stack.push(DfsFrame {
                            rule: w,
                            neighbours: sorted_neighbours(w),
                            next_idx: 0,
                        });
                    } else if on_stack.contains(&w) {
                        let w_idx = indices[&w];
                        if let Some(v_low) = lowlinks.get_mut(&frame.rule) {
                            if w_idx < *v_low {
                                *v_low = w_idx;
                            }
                        }
                    }
                } else {
                    // All neighbours explored: pop and propagate lowlink
                    let Some(finished) = dfs_stack.pop() else {
                        break;
                    };
                    let v = finished.rule;
                    let v_low = lowlinks[&v];
                    let v_idx = indices[&v];

                    if let Some(parent) = dfs_stack.last() {
                        if let Some(parent_low) = lowlinks.get_mut(&parent.rule) {
                            if v_low < *parent_low {
                                *parent_low = v_low;
                            }
                        }
                    }

                    if v_low == v_idx {
                        let mut scc = Vec::new();
                        while let Some(w) = stack.pop() {
                            on_stack.remove(&w);
                            scc.push(w);
                            if w == v {
                                break;
                            }
                        }

                        let self_loop = scc.len() == 1
                            && self.preds.get(&scc[0]).is_some_and(|p| p.contains(&scc[0]));
                        if scc.len() > 1 || self_loop {
                            scc.sort_unstable();
                            sccs.push(scc);
                        }
                    }
                }
            }
        }

        sccs.sort();
        sccs
    }

    /// Debug check for the bidirectional invariant.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (b, preds) in &self.preds {
            assert!(!preds.is_empty(), "empty preds stored for {b}");
            for a in preds {
                assert!(
                    self.succs.get(a).is_some_and(|s| s.contains(b)),
                    "{a} in preds[{b}] but {b} not in succs[{a}]"
                );
            }
        }
        for (a, succs) in &self.succs {
            assert!(!succs.is_empty(), "empty succs stored for {a}");
            for b in succs {
                assert!(
                    self.preds.get(b).is_some_and(|p| p.contains(a)),
                    "{b} in succs[{a}] but {a} not in preds[{b}]"
                );
            }
        }
    }
}
