//! Standalone pattern-application tool.
//!
//! Takes an existing generated project (payload, zip or directory),
//! decides which patterns each Spring Boot service should carry (README
//! hints or a roles file) and has the model add the corresponding Java
//! files.

pub mod discovery;
pub mod readme;
pub mod roles;
pub mod workflow;

pub use discovery::{find_services, ServiceDir};
pub use roles::RolesConfig;
pub use workflow::{
    apply_patterns, assign_patterns, emit_outputs, prepare_work_dir, work_dir_for, InputSource,
    PatternOptions, ServiceOutcome, DEFAULT_OUTPUT_FILENAME, DEFAULT_README_PATH,
};
