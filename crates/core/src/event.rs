use std::{cell::RefCell, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Created,
    Changed,
    Obsolete,
    Repaired,
    Error,
    Deleted,
    Info,
}

impl Severity {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Changed => "changed",
            Self::Obsolete => "obsolete",
            Self::Repaired => "repaired",
            Self::Error => "error",
            Self::Deleted => "deleted",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEvent {
    pub severity: Severity,
    pub message: String,
}

impl SchemaEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

pub trait EventSink {
    fn emit(&self, event: &SchemaEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &SchemaEvent) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &SchemaEvent) {
        match event.severity {
            Severity::Error => {
                tracing::error!(severity = %event.severity, "{}", event.message);
            }
            Severity::Obsolete | Severity::Deleted => {
                tracing::warn!(severity = %event.severity, "{}", event.message);
            }
            Severity::Created | Severity::Changed | Severity::Repaired | Severity::Info => {
                tracing::info!(severity = %event.severity, "{}", event.message);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RefCell<Vec<SchemaEvent>>,
}

impl CollectingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SchemaEvent> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn messages_with(&self, severity: Severity) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.severity == severity)
            .map(|event| event.message.clone())
            .collect()
    }

    pub fn take(&self) -> Vec<SchemaEvent> {
        self.events.take()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &SchemaEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Routes engine events to the injected sink unless muted.
pub(crate) struct EventEmitter<'a> {
    sink: &'a dyn EventSink,
    muted: bool,
}

impl<'a> EventEmitter<'a> {
    pub(crate) const fn new(sink: &'a dyn EventSink, muted: bool) -> Self {
        Self { sink, muted }
    }

    pub(crate) fn emit(&self, severity: Severity, message: impl Into<String>) {
        if self.muted {
            return;
        }
        self.sink.emit(&SchemaEvent::new(severity, message));
    }
}
