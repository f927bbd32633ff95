//! Change notifications emitted by the field document.
//!
//! Subscribers register a set of watched paths and receive an event whenever
//! one of those fields changes value or status. The reactive engine uses this
//! to know when a re-evaluation is due without polling.

use crate::path::FieldPath;

/// Events emitted by a field document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// A watched field was written and its value or status changed.
    FieldChanged(FieldChangedEvent),

    /// A watched field was deleted (row/column removal).
    FieldRemoved(FieldPath),

    /// The whole document was cleared. Delivered to every subscriber.
    Reset,
}

/// Emitted when a field's value or dirty/touched status changes.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChangedEvent {
    pub path: FieldPath,
    /// True when the write marked the field dirty (a user edit).
    pub dirty: bool,
}

/// Callback type for receiving document events.
pub type EventCallback = Box<dyn FnMut(&DocumentEvent)>;

/// Opaque handle returned by `subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<DocumentEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: DocumentEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[DocumentEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Paths of all FieldChanged events, in delivery order.
    pub fn changed_paths(&self) -> Vec<&FieldPath> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DocumentEvent::FieldChanged(c) => Some(&c.path),
                _ => None,
            })
            .collect()
    }

    /// Paths of all FieldRemoved events.
    pub fn removed_paths(&self) -> Vec<&FieldPath> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DocumentEvent::FieldRemoved(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}
