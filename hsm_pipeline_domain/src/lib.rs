//! # HSM Pipeline Domain
//!
//! Domain layer of the HSM policy engine's entry-processing pipeline. It
//! holds the data model the pipeline flows through, the attribute-mask
//! machinery the stages communicate with, and the ports (async traits) the
//! pipeline consumes: the catalog, the filesystem probes, the alert emitter
//! and the policy matcher. It is independent of any runtime, database or
//! filesystem implementation.
//!
//! ## Module Structure
//!
//! - [`entities`]: the operation that flows through the pipeline, the
//!   attribute record and its mask, the stage table.
//! - [`services`]: the external-interface ports and the policy types that
//!   parameterize stage behavior.
//! - [`error`]: the domain error enum and the probe failure taxonomy.
//!
//! ## Core Concepts
//!
//! ### Attribute masks
//! Every [`entities::EntryAttributes`] record carries an
//! [`entities::AttrMask`] naming which fields are meaningful. A field is
//! read only if its bit is set; writing a field sets its bit. The mask is
//! how stages tell each other "what is known" versus "what must be
//! fetched", and how the catalog computes which columns a read or write
//! touches.
//!
//! ### Operations
//! One [`entities::Operation`] exists per file event. It is created by a
//! producer (scanner or journal reader), owned by exactly one stage handler
//! at a time, and destroyed on terminal acknowledgement.

pub mod entities;
pub mod error;
pub mod services;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use entities::{
    AttrMask, DbExists, DbOp, EntryAttributes, EntryId, EventSource, FetchPlan, FileKind,
    FileStat, HsmStatus, JournalRecord, Operation, RecordType, StageDescriptor, StageFlags,
    StageId, StripeInfo, StripeItem,
};
pub use error::{PipelineError, ProbeError};
pub use services::{
    AlertEmitter, AlertRule, Catalog, CatalogFilter, EntryAlert, FsProbe, HsmProbeResult,
    PolicyMatcher, RefreshPolicy, UnlinkPolicy, LAST_SCAN_VAR,
};
