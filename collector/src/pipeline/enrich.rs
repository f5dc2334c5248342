//! Resource enrichment stage.

use shared::models::{Resource, TelemetryRecord};
use std::sync::Arc;

/// Copies process resource attributes onto each record's own attributes.
///
/// Keys already present on a record are never overwritten, so applying the
/// stage twice leaves records unchanged.
#[derive(Debug, Clone)]
pub struct Enricher {
    resource: Arc<Resource>,
    enabled: bool,
}

impl Enricher {
    /// Creates the stage for the process resource.
    #[must_use]
    pub fn new(resource: Arc<Resource>, enabled: bool) -> Self {
        Self { resource, enabled }
    }

    /// Returns true if the stage modifies records.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enriches a unit of records in place.
    pub fn apply(&self, records: &mut [TelemetryRecord]) {
        if !self.enabled {
            return;
        }
        for record in records {
            enrich(record, &self.resource);
        }
    }
}

/// Merges `resource` attributes into `record`, returning how many keys were
/// added.
pub fn enrich(record: &mut TelemetryRecord, resource: &Resource) -> usize {
    record.merge_attributes(resource.attributes())
}
