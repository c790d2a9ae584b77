//! Error taxonomy for the generation pipeline.
//!
//! Library modules return `Result<_, PipelineError>`; the command layer
//! wraps these in `anyhow` with additional context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Quoting normalization and JSON recovery were exhausted.
    #[error("Malformed LLM output: {message}")]
    MalformedLlmOutput { message: String, raw: String },

    /// Well-formed JSON that does not match the expected shape.
    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String, raw: String },

    #[error("Unsafe path traversal detected: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File exists: {0}")]
    FileExists(String),

    #[error("Target exists: {0}")]
    TargetExists(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Unsupported op: {0}")]
    UnsupportedOp(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// File-section document is malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid JSON plan: {0}")]
    InvalidPlanJson(String),

    #[error("Plan must be an object with an 'actions' array")]
    PlanStructure,

    /// A model or retriever call exceeded its deadline. Retryable.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM request failed: {message}")]
    Llm { message: String, retryable: bool },

    #[error("Retriever request failed: {0}")]
    Retrieval(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short machine-readable label, recorded next to per-action errors.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedLlmOutput { .. } => "malformed_llm_output",
            PipelineError::SchemaValidation { .. } => "schema_validation",
            PipelineError::PathTraversal(_) => "path_traversal",
            PipelineError::InvalidPath(_) => "invalid_path",
            PipelineError::FileExists(_) | PipelineError::TargetExists(_) => "file_exists",
            PipelineError::SourceNotFound(_) => "file_not_found",
            PipelineError::DirectoryNotEmpty(_) | PipelineError::Io(_) => "os_error",
            PipelineError::UnsupportedOp(_) | PipelineError::InvalidAction(_) => "invalid_action",
            PipelineError::Parse(_) => "parse",
            PipelineError::InvalidPlanJson(_) => "invalid_plan_json",
            PipelineError::PlanStructure => "plan_structure",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Llm { .. } => "llm",
            PipelineError::Retrieval(_) => "retrieval",
            PipelineError::Archive(_) => "archive",
            PipelineError::Payload(_) => "payload",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Timeout(_) => true,
            PipelineError::Llm { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Raw model text attached to the error, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            PipelineError::MalformedLlmOutput { raw, .. }
            | PipelineError::SchemaValidation { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
