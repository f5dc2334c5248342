//! Resource and instrumentation scope models.

use super::{AttributeValue, Attributes};

/// Attribute key carrying the logical service name.
pub const SERVICE_NAME: &str = "service.name";

/// The entity (host, service, process) that produced telemetry.
///
/// A `Resource` is immutable once built. Records hold it behind an `Arc`
/// so every record of one origin shares a single allocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    attributes: Attributes,
    schema_url: String,
}

impl Resource {
    /// Creates a resource from a set of attributes.
    #[must_use]
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            schema_url: String::new(),
        }
    }

    /// Sets the schema URL.
    #[must_use]
    pub fn with_schema_url(mut self, schema_url: impl Into<String>) -> Self {
        self.schema_url = schema_url.into();
        self
    }

    /// Returns the resource attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the schema URL (empty if unset).
    #[must_use]
    pub fn schema_url(&self) -> &str {
        &self.schema_url
    }

    /// Returns the `service.name` attribute if it is a string.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.attributes.get(SERVICE_NAME).and_then(AttributeValue::as_str)
    }

    /// Builds a new resource from this one, filling in keys it lacks from `local`.
    ///
    /// Attributes already present here are kept as-is.
    #[must_use]
    pub fn merged_with(&self, local: &Resource) -> Resource {
        let mut attributes = self.attributes.clone();
        attributes.merge_missing(&local.attributes);
        let schema_url = if self.schema_url.is_empty() {
            local.schema_url.clone()
        } else {
            self.schema_url.clone()
        };
        Resource {
            attributes,
            schema_url,
        }
    }
}

/// The instrumentation scope (library) that emitted a group of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    /// Scope name, e.g. the instrumenting library.
    pub name: String,
    /// Scope version.
    pub version: String,
    /// Scope attributes.
    pub attributes: Attributes,
    /// Schema URL of the scope block.
    pub schema_url: String,
}

impl Scope {
    /// Creates a named scope.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the scope version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
