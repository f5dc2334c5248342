//! Span model.

use super::Attributes;

/// Kind of span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    /// Not specified.
    #[default]
    Unspecified,
    /// Internal operation.
    Internal,
    /// Server-side handling of a remote request.
    Server,
    /// Client-side remote request.
    Client,
    /// Producer of an asynchronous message.
    Producer,
    /// Consumer of an asynchronous message.
    Consumer,
}

impl SpanKind {
    /// Maps the OTLP enum value.
    #[must_use]
    pub fn from_otlp(value: i32) -> Self {
        match value {
            1 => Self::Internal,
            2 => Self::Server,
            3 => Self::Client,
            4 => Self::Producer,
            5 => Self::Consumer,
            _ => Self::Unspecified,
        }
    }

    /// Returns the OTLP enum value.
    #[must_use]
    pub fn as_otlp(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Internal => 1,
            Self::Server => 2,
            Self::Client => 3,
            Self::Producer => 4,
            Self::Consumer => 5,
        }
    }
}

/// Span status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusCode {
    /// Status not set.
    #[default]
    Unset,
    /// Operation completed successfully.
    Ok,
    /// Operation failed.
    Error,
}

impl StatusCode {
    /// Maps the OTLP enum value.
    #[must_use]
    pub fn from_otlp(value: i32) -> Self {
        match value {
            1 => Self::Ok,
            2 => Self::Error,
            _ => Self::Unset,
        }
    }

    /// Returns the OTLP enum value.
    #[must_use]
    pub fn as_otlp(self) -> i32 {
        match self {
            Self::Unset => 0,
            Self::Ok => 1,
            Self::Error => 2,
        }
    }
}

/// Span status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpanStatus {
    /// Status code.
    pub code: StatusCode,
    /// Developer-facing message.
    pub message: String,
}

/// A timestamped event within a span.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpanEvent {
    /// Event time.
    pub time_unix_nano: u64,
    /// Event name.
    pub name: String,
    /// Event attributes.
    pub attributes: Attributes,
}

/// A link to another span.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpanLink {
    /// Linked trace id.
    pub trace_id: Vec<u8>,
    /// Linked span id.
    pub span_id: Vec<u8>,
    /// W3C trace state of the linked span.
    pub trace_state: String,
    /// Link attributes.
    pub attributes: Attributes,
    /// Trace flags.
    pub flags: u32,
}

/// A finished span. The record timestamp is the span start time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    /// 16-byte trace id.
    pub trace_id: [u8; 16],
    /// 8-byte span id.
    pub span_id: [u8; 8],
    /// Parent span id for child spans.
    pub parent_span_id: Option<[u8; 8]>,
    /// W3C trace state.
    pub trace_state: String,
    /// Operation name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// End time.
    pub end_time_unix_nano: u64,
    /// Status.
    pub status: SpanStatus,
    /// Events.
    pub events: Vec<SpanEvent>,
    /// Links.
    pub links: Vec<SpanLink>,
    /// Trace flags.
    pub flags: u32,
}

impl SpanRecord {
    /// Creates a span with the given ids and name.
    #[must_use]
    pub fn new(trace_id: [u8; 16], span_id: [u8; 8], name: impl Into<String>) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            trace_state: String::new(),
            name: name.into(),
            kind: SpanKind::Internal,
            end_time_unix_nano: 0,
            status: SpanStatus::default(),
            events: Vec::new(),
            links: Vec::new(),
            flags: 0,
        }
    }

    /// Sets the parent span id.
    #[must_use]
    pub fn with_parent(mut self, parent_span_id: [u8; 8]) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    /// Sets the span kind.
    #[must_use]
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time_unix_nano: u64) -> Self {
        self.end_time_unix_nano = end_time_unix_nano;
        self
    }

    /// Hex-encoded trace id.
    #[must_use]
    pub fn trace_id_hex(&self) -> String {
        hex::encode(self.trace_id)
    }

    /// Hex-encoded span id.
    #[must_use]
    pub fn span_id_hex(&self) -> String {
        hex::encode(self.span_id)
    }
}
