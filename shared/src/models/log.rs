//! Log record model.

use super::AttributeValue;

/// A single log record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogRecord {
    /// Time the record was observed by the pipeline or an agent (0 if unset).
    pub observed_time_unix_nano: u64,
    /// OTLP severity number (0 if unset).
    pub severity_number: i32,
    /// Severity text as sent by the producer.
    pub severity_text: String,
    /// Log body.
    pub body: Option<AttributeValue>,
    /// Trace id of the active span, empty if none.
    pub trace_id: Vec<u8>,
    /// Span id of the active span, empty if none.
    pub span_id: Vec<u8>,
    /// OTLP trace flags.
    pub flags: u32,
}

impl LogRecord {
    /// Creates a log record with a string body.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(AttributeValue::String(body.into())),
            ..Self::default()
        }
    }

    /// Sets the severity number and text.
    #[must_use]
    pub fn with_severity(mut self, number: i32, text: impl Into<String>) -> Self {
        self.severity_number = number;
        self.severity_text = text.into();
        self
    }

    /// Returns the severity text, falling back to a label derived from the number.
    #[must_use]
    pub fn severity_label(&self) -> &str {
        if !self.severity_text.is_empty() {
            return &self.severity_text;
        }
        // https://opentelemetry.io/docs/specs/otel/logs/data-model/#field-severitynumber
        match self.severity_number {
            1..=4 => "TRACE",
            5..=8 => "DEBUG",
            9..=12 => "INFO",
            13..=16 => "WARN",
            17..=20 => "ERROR",
            21..=24 => "FATAL",
            _ => "UNSPECIFIED",
        }
    }
}
