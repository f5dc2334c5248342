//! The processing pipeline.
//!
//! Receivers and the host metrics sampler push record units into the
//! [`Ingress`] queue. The batcher task enriches each unit, accumulates
//! batches per destination set, and hands finished batches to the export
//! workers, which run them through the [`Router`].

pub mod batch;
pub mod enrich;
pub mod ingress;
pub mod router;

pub use batch::{spawn_batcher, BatchAccumulator, BatcherHandle, Pushed};
pub use enrich::{enrich, Enricher};
pub use ingress::{Ingress, IngressError, IngressReceiver};
pub use router::{spawn_export_workers, ExportWorkers, Router};
