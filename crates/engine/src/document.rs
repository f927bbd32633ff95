//! The field document: a path-addressed store of values plus per-field
//! dirty/touched status.
//!
//! The engine never owns the document. It reads and writes through the
//! [`FieldDocument`] trait, and learns about changes through `subscribe`.
//! [`MemoryDocument`] is the in-process implementation used by the session
//! and by tests.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde_json::{Map, Value as JsonValue};

use crate::events::{DocumentEvent, EventCallback, FieldChangedEvent, SubscriptionId};
use crate::path::{FieldPath, Segment};
use crate::value::FieldValue;

/// Value plus status of a single document leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldState {
    pub value: FieldValue,
    /// The user edited the field.
    pub dirty: bool,
    /// The user interacted with the field.
    pub touched: bool,
}

/// Flags applied by `set`.
///
/// `dirty` replaces the field's dirty flag; `touched` is sticky once set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub dirty: bool,
    pub touched: bool,
    pub validate: bool,
}

impl SetOptions {
    /// Options for a computed write: nothing marked.
    pub const fn computed() -> Self {
        Self {
            dirty: false,
            touched: false,
            validate: false,
        }
    }

    /// Options for a user edit.
    pub const fn user() -> Self {
        Self {
            dirty: true,
            touched: true,
            validate: true,
        }
    }
}

/// Path-addressed document consumed by the engine.
pub trait FieldDocument {
    /// State of the leaf at `path`, if present.
    fn field(&self, path: &FieldPath) -> Option<&FieldState>;

    /// Write `value` at `path`. Returns true if the value or status changed.
    fn set(&mut self, path: &FieldPath, value: FieldValue, options: SetOptions) -> bool;

    /// Delete every leaf at or below `prefix`. Returns the number removed.
    fn remove_subtree(&mut self, prefix: &FieldPath) -> usize;

    /// Move every leaf at or below `from` so it lives below `to` instead.
    /// Existing leaves under `to` are replaced. Status flags travel along.
    fn move_subtree(&mut self, from: &FieldPath, to: &FieldPath) -> usize;

    /// Paths of all leaves at or below `prefix`, in canonical order.
    fn paths_under(&self, prefix: &FieldPath) -> Vec<FieldPath>;

    /// Register `callback` for changes to any of `paths`.
    fn subscribe(&mut self, paths: FxHashSet<FieldPath>, callback: EventCallback) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;

    /// Remove every leaf. Subscriptions survive and receive `Reset`.
    fn reset(&mut self);

    /// Value at `path`; missing paths read as `Empty`.
    fn get(&self, path: &FieldPath) -> FieldValue {
        self.field(path).map(|f| f.value.clone()).unwrap_or_default()
    }

    /// Numeric value at `path`; missing or non-numeric reads as 0.
    fn number(&self, path: &FieldPath) -> f64 {
        self.field(path).map_or(0.0, |f| f.value.as_number())
    }

    fn is_dirty(&self, path: &FieldPath) -> bool {
        self.field(path).is_some_and(|f| f.dirty)
    }

    fn is_touched(&self, path: &FieldPath) -> bool {
        self.field(path).is_some_and(|f| f.touched)
    }

    /// Number of array entries directly below `list` (highest index + 1).
    fn index_count(&self, list: &FieldPath) -> usize {
        self.paths_under(list)
            .iter()
            .filter_map(|p| match p.segments().get(list.len()) {
                Some(Segment::Index(i)) => Some(i + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

struct Subscriber {
    id: SubscriptionId,
    paths: FxHashSet<FieldPath>,
    callback: EventCallback,
}

/// In-memory field document.
#[derive(Default)]
pub struct MemoryDocument {
    fields: BTreeMap<FieldPath, FieldState>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    /// Paths written with `validate = true` since the last drain.
    validation_requests: Vec<FieldPath>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drain the paths that requested validation.
    pub fn take_validation_requests(&mut self) -> Vec<FieldPath> {
        std::mem::take(&mut self.validation_requests)
    }

    /// Iterate all leaves in canonical path order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &FieldState)> {
        self.fields.iter()
    }

    /// Nested JSON view of the document values (objects for keys, arrays for
    /// indices; gaps in arrays become `null`).
    pub fn to_json(&self) -> JsonValue {
        let mut root = JsonValue::Object(Map::new());
        for (path, state) in &self.fields {
            let leaf = serde_json::to_value(&state.value).unwrap_or(JsonValue::Null);
            insert_json(&mut root, path.segments(), leaf);
        }
        root
    }

    fn subtree_keys(&self, prefix: &FieldPath) -> Vec<FieldPath> {
        // Descendants of a prefix are contiguous in lexicographic segment order.
        self.fields
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(prefix))
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn notify(&mut self, path: &FieldPath, event: &DocumentEvent) {
        for sub in self.subscribers.iter_mut() {
            if sub.paths.contains(path) {
                (sub.callback)(event);
            }
        }
    }

    fn notify_all(&mut self, event: &DocumentEvent) {
        for sub in self.subscribers.iter_mut() {
            (sub.callback)(event);
        }
    }

    fn insert_state(&mut self, path: FieldPath, state: FieldState) {
        let changed = self.fields.get(&path) != Some(&state);
        let dirty = state.dirty;
        self.fields.insert(path.clone(), state);
        if changed {
            let event = DocumentEvent::FieldChanged(FieldChangedEvent {
                path: path.clone(),
                dirty,
            });
            self.notify(&path, &event);
        }
    }
}

impl FieldDocument for MemoryDocument {
    fn field(&self, path: &FieldPath) -> Option<&FieldState> {
        self.fields.get(path)
    }

    fn set(&mut self, path: &FieldPath, value: FieldValue, options: SetOptions) -> bool {
        let previous = self.fields.get(path);
        let state = FieldState {
            value,
            dirty: options.dirty,
            touched: options.touched || previous.is_some_and(|p| p.touched),
        };
        let changed = previous != Some(&state);
        if options.validate {
            self.validation_requests.push(path.clone());
        }
        if changed {
            self.insert_state(path.clone(), state);
        }
        changed
    }

    fn remove_subtree(&mut self, prefix: &FieldPath) -> usize {
        let keys = self.subtree_keys(prefix);
        for key in &keys {
            self.fields.remove(key);
            self.notify(key, &DocumentEvent::FieldRemoved(key.clone()));
        }
        keys.len()
    }

    fn move_subtree(&mut self, from: &FieldPath, to: &FieldPath) -> usize {
        if from == to {
            return 0;
        }
        let moved: Vec<(FieldPath, FieldState)> = self
            .subtree_keys(from)
            .into_iter()
            .filter_map(|k| self.fields.remove(&k).map(|state| (k, state)))
            .collect();

        let mut targets = FxHashSet::default();
        let mut rebased = Vec::with_capacity(moved.len());
        for (old, state) in moved {
            if let Some(new) = old.rebase(from, to) {
                targets.insert(new.clone());
                rebased.push((old, new, state));
            }
        }

        // Leaves under `to` that nothing moves onto are dropped.
        for stale in self.subtree_keys(to) {
            if !targets.contains(&stale) {
                self.fields.remove(&stale);
                self.notify(&stale, &DocumentEvent::FieldRemoved(stale.clone()));
            }
        }

        let count = rebased.len();
        let mut vacated = Vec::new();
        for (old, new, state) in rebased {
            if !old.starts_with(to) {
                vacated.push(old);
            }
            self.insert_state(new, state);
        }
        for old in vacated {
            if !self.fields.contains_key(&old) {
                self.notify(&old, &DocumentEvent::FieldRemoved(old.clone()));
            }
        }
        count
    }

    fn paths_under(&self, prefix: &FieldPath) -> Vec<FieldPath> {
        self.subtree_keys(prefix)
    }

    fn subscribe(&mut self, paths: FxHashSet<FieldPath>, callback: EventCallback) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push(Subscriber { id, paths, callback });
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    fn reset(&mut self) {
        self.fields.clear();
        self.validation_requests.clear();
        self.notify_all(&DocumentEvent::Reset);
    }
}

fn insert_json(node: &mut JsonValue, segments: &[Segment], leaf: JsonValue) {
    let Some((head, rest)) = segments.split_first() else {
        *node = leaf;
        return;
    };
    let child = match head {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = JsonValue::Object(Map::new());
            }
            match node {
                JsonValue::Object(map) => map.entry(key.clone()).or_insert(JsonValue::Null),
                _ => return,
            }
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = JsonValue::Array(Vec::new());
            }
            match node {
                JsonValue::Array(items) => {
                    if items.len() <= *index {
                        items.resize(index + 1, JsonValue::Null);
                    }
                    &mut items[*index]
                }
                _ => return,
            }
        }
    };
    insert_json(child, rest, leaf);
}
