//! Observer hooks for attach and DDL events.
//!
//! Observers are registered on a [`super::MetaData`] either registry-wide or
//! scoped to one table or sequence. Registration is additive: every matching
//! observer sees every event, in registration order.

use super::item::{SchemaItemRef, TableKey};
use crate::config::CheckFirst;
use crate::ddl::DdlIntent;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Which DDL step an event brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlEventKind {
    /// A whole create run.
    CreateRun,
    /// A whole drop run.
    DropRun,
    /// CREATE of one item.
    Create,
    /// DROP of one item.
    Drop,
    /// ALTER TABLE ADD CONSTRAINT.
    AddConstraint,
    /// ALTER TABLE DROP CONSTRAINT.
    DropConstraint,
    /// COMMENT ON.
    Comment,
}

impl DdlEventKind {
    /// Check if this brackets a whole run.
    pub fn is_run(&self) -> bool {
        matches!(self, DdlEventKind::CreateRun | DdlEventKind::DropRun)
    }
}

/// A DDL notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DdlEvent {
    /// Event kind.
    pub kind: DdlEventKind,
    /// Item the event is about. `Registry` for runs over the whole registry.
    pub target: SchemaItemRef,
    /// The intent being executed, for per-item events.
    pub intent: Option<DdlIntent>,
    /// Backend name.
    pub backend: String,
    /// Existence-check policy of the run.
    pub checkfirst: CheckFirst,
}

/// An attach notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachEvent {
    /// Item being attached.
    pub child: SchemaItemRef,
    /// Item it attaches to.
    pub parent: SchemaItemRef,
}

/// Receiver of schema events. All methods default to no-ops.
pub trait SchemaObserver: Send + Sync {
    /// Called before a DDL step runs.
    fn before_ddl(&self, _event: &DdlEvent) {}

    /// Called after a DDL step ran.
    fn after_ddl(&self, _event: &DdlEvent) {}

    /// Called before an item attaches.
    fn before_attach(&self, _event: &AttachEvent) {}

    /// Called after an item attached.
    fn after_attach(&self, _event: &AttachEvent) {}
}

/// Where an observer listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObserverScope {
    /// Every event in the registry.
    Registry,
    /// Events about one table and its columns, constraints and indexes.
    Table(TableKey),
    /// Events about one sequence, by registry key.
    Sequence(String),
}

impl ObserverScope {
    fn matches(&self, table: Option<&TableKey>, sequence: Option<&str>) -> bool {
        match self {
            ObserverScope::Registry => true,
            ObserverScope::Table(key) => table == Some(key),
            ObserverScope::Sequence(key) => sequence == Some(key.as_str()),
        }
    }
}

/// Registered observers of one registry.
#[derive(Clone, Default)]
pub struct Observers {
    entries: Vec<(ObserverScope, Arc<dyn SchemaObserver>)>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(scope, _)| scope))
            .finish()
    }
}

impl Observers {
    pub(crate) fn add(&mut self, scope: ObserverScope, observer: Arc<dyn SchemaObserver>) {
        self.entries.push((scope, observer));
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if none are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matching<'a>(
        &'a self,
        table: Option<&'a TableKey>,
        sequence: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Arc<dyn SchemaObserver>> + 'a {
        self.entries
            .iter()
            .filter(move |(scope, _)| scope.matches(table, sequence))
            .map(|(_, observer)| observer)
    }

    pub(crate) fn before_ddl(&self, event: &DdlEvent, table: Option<&TableKey>, sequence: Option<&str>) {
        for observer in self.matching(table, sequence) {
            observer.before_ddl(event);
        }
    }

    pub(crate) fn after_ddl(&self, event: &DdlEvent, table: Option<&TableKey>, sequence: Option<&str>) {
        for observer in self.matching(table, sequence) {
            observer.after_ddl(event);
        }
    }

    pub(crate) fn before_attach(
        &self,
        event: &AttachEvent,
        table: Option<&TableKey>,
        sequence: Option<&str>,
    ) {
        for observer in self.matching(table, sequence) {
            observer.before_attach(event);
        }
    }

    pub(crate) fn after_attach(
        &self,
        event: &AttachEvent,
        table: Option<&TableKey>,
        sequence: Option<&str>,
    ) {
        for observer in self.matching(table, sequence) {
            observer.after_attach(event);
        }
    }
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    /// `before_ddl`.
    BeforeDdl(DdlEvent),
    /// `after_ddl`.
    AfterDdl(DdlEvent),
    /// `before_attach`.
    BeforeAttach(AttachEvent),
    /// `after_attach`.
    AfterAttach(AttachEvent),
}

/// Observer that records every notification in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryObserver {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl MemoryObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Only the DDL events, as `(is_before, event)`.
    pub fn ddl_events(&self) -> Vec<(bool, DdlEvent)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::BeforeDdl(ev) => Some((true, ev.clone())),
                RecordedEvent::AfterDdl(ev) => Some((false, ev.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SchemaObserver for MemoryObserver {
    fn before_ddl(&self, event: &DdlEvent) {
        self.events.lock().push(RecordedEvent::BeforeDdl(event.clone()));
    }

    fn after_ddl(&self, event: &DdlEvent) {
        self.events.lock().push(RecordedEvent::AfterDdl(event.clone()));
    }

    fn before_attach(&self, event: &AttachEvent) {
        self.events.lock().push(RecordedEvent::BeforeAttach(event.clone()));
    }

    fn after_attach(&self, event: &AttachEvent) {
        self.events.lock().push(RecordedEvent::AfterAttach(event.clone()));
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SchemaObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach_event() -> AttachEvent {
        AttachEvent {
            child: SchemaItemRef::Sequence("seq".into()),
            parent: SchemaItemRef::Registry,
        }
    }

    #[test]
    fn test_scoped_dispatch() {
        let registry = MemoryObserver::new();
        let users = MemoryObserver::new();
        let seq = MemoryObserver::new();

        let mut observers = Observers::default();
        observers.add(ObserverScope::Registry, Arc::new(registry.clone()));
        observers.add(
            ObserverScope::Table(TableKey::new(None, "users")),
            Arc::new(users.clone()),
        );
        observers.add(ObserverScope::Sequence("seq".into()), Arc::new(seq.clone()));
        observers.add(ObserverScope::Registry, Arc::new(NullObserver));
        assert_eq!(observers.len(), 4);

        observers.before_attach(&attach_event(), None, Some("seq"));
        observers.after_attach(&attach_event(), None, Some("seq"));

        assert_eq!(registry.len(), 2);
        assert_eq!(seq.len(), 2);
        assert!(users.is_empty());

        let users_key = TableKey::new(None, "users");
        observers.before_attach(&attach_event(), Some(&users_key), None);
        assert_eq!(users.len(), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_memory_observer_clear() {
        let observer = MemoryObserver::new();
        observer.before_attach(&attach_event());
        assert!(matches!(observer.events()[0], RecordedEvent::BeforeAttach(_)));
        assert!(observer.ddl_events().is_empty());
        observer.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_run_kinds() {
        assert!(DdlEventKind::CreateRun.is_run());
        assert!(!DdlEventKind::AddConstraint.is_run());
    }
}
