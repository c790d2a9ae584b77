//! Update Plan types.
//!
//! A plan is a declarative list of filesystem actions produced by a model.
//! Actions are kept as raw JSON until they are applied so that one
//! malformed action is reported on its own instead of rejecting the plan.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineError;

const SUPPORTED_OPS: [&str; 5] = ["mkdir", "write", "append", "move", "delete"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    #[default]
    Overwrite,
    Skip,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Action {
    Mkdir {
        path: String,
    },
    Write {
        path: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        encoding: Encoding,
        #[serde(default)]
        if_exists: IfExists,
    },
    Append {
        path: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        encoding: Encoding,
    },
    Move {
        from: String,
        to: String,
        #[serde(default)]
        if_exists: IfExists,
    },
    Delete {
        path: String,
        #[serde(default)]
        recursive: bool,
    },
}

impl Action {
    /// Interpret one raw plan entry.
    pub fn from_value(value: &Value) -> Result<Self, PipelineError> {
        let op = value.get("op").and_then(Value::as_str).unwrap_or_default();
        if !SUPPORTED_OPS.contains(&op) {
            let shown = value
                .get("op")
                .map(Value::to_string)
                .unwrap_or_else(|| "None".to_string());
            return Err(PipelineError::UnsupportedOp(shown));
        }

        serde_json::from_value(value.clone())
            .map_err(|e| PipelineError::InvalidAction(e.to_string()))
    }

    pub fn op(&self) -> &'static str {
        match self {
            Action::Mkdir { .. } => "mkdir",
            Action::Write { .. } => "write",
            Action::Append { .. } => "append",
            Action::Move { .. } => "move",
            Action::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatePlan {
    pub version: String,
    pub actions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdatePlan {
    /// Parse a plan from strict JSON text.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| PipelineError::InvalidPlanJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Check the top-level shape: an object carrying an `actions` array.
    pub fn from_value(value: Value) -> Result<Self, PipelineError> {
        let Value::Object(mut obj) = value else {
            return Err(PipelineError::PlanStructure);
        };
        let actions = match obj.remove("actions") {
            Some(Value::Array(actions)) => actions,
            _ => return Err(PipelineError::PlanStructure),
        };
        let version = match obj.remove("version") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let notes = match obj.remove("notes") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        Ok(Self {
            version,
            actions,
            notes,
        })
    }

    pub fn from_actions(actions: &[Action]) -> Self {
        Self {
            version: "1".to_string(),
            actions: actions
                .iter()
                .filter_map(|a| serde_json::to_value(a).ok())
                .collect(),
            notes: None,
        }
    }
}
