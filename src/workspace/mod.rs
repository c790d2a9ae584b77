//! Working project directory management.
//!
//! This module owns everything that touches the project on disk:
//! - path normalization and root containment
//! - the file-section micro-format and its materializer
//! - Update Plan parsing and application
//! - textual snapshots used as prompt context
//! - ZIP packaging and the base64 payload format

pub mod apply;
pub mod archive;
pub mod paths;
pub mod plan;
pub mod sections;
pub mod snapshot;

// Re-exports
pub use apply::{apply, apply_json, ActionError, ActionResult, ApplySummary};
pub use archive::{
    copy_tree, list_entries, pack_dir, pack_tree, reset_dir, unpack_zip, Payload,
    DEFAULT_PAYLOAD_FILENAME,
};
pub use paths::{normalize_rel_path, resolve_within};
pub use plan::{Action, Encoding, IfExists, UpdatePlan};
pub use sections::{
    materialize, parse_sections, render_sections, render_tree, write_sections, FileSection,
};
pub use snapshot::{snapshot, ProjectSnapshot, PER_DOC_LIMIT};
