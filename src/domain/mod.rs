//! Domain types shared across modules.
//!
//! The Architecture Document is the aggregate produced once per run by the
//! assignment stage and read by every later stage. The Project Tree is the
//! loosely-shaped file/folder structure some model responses use; it is not
//! guaranteed well-formed, so every collection tolerates `null`.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::parse::compiled;

fn vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `"a"`, `["a", 1]` or `null` and yields a list of strings.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Item {
        Text(String),
        Number(serde_json::Number),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Item),
        Many(Vec<Item>),
    }

    let items = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    };

    Ok(items
        .into_iter()
        .map(|item| match item {
            Item::Text(s) => s,
            Item::Number(n) => n.to_string(),
        })
        .collect())
}

// ============================================================================
// Architecture Document
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get", alias = "Get")]
    Get,
    #[serde(alias = "post", alias = "Post")]
    Post,
    #[serde(alias = "put", alias = "Put")]
    Put,
    #[serde(alias = "delete", alias = "Delete")]
    Delete,
    #[serde(alias = "patch", alias = "Patch")]
    Patch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Endpoint {
    /// Path of the endpoint, e.g. `/login`.
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default, deserialize_with = "string_list")]
    pub inputs: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub outputs: Vec<String>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Microservice {
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    #[serde(default, deserialize_with = "vec_or_null")]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, deserialize_with = "string_list")]
    pub parameters: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub user_stories: Vec<String>,
}

/// Closed vocabulary of implementation patterns.
///
/// Values outside the vocabulary are kept as `Other` so that a single odd
/// entry does not reject the whole document; [`ArchitectureDocument::validate`]
/// reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImplementationPattern {
    DatabasePerService,
    SharedDatabase,
    ApiComposition,
    Cqrs,
    Saga,
    Aggregate,
    EventSourcing,
    DomainEvent,
    Other(String),
}

impl ImplementationPattern {
    pub const VOCABULARY: [&'static str; 8] = [
        "database-per-service",
        "shared-database",
        "api-composition",
        "cqrs",
        "saga",
        "aggregate",
        "event-sourcing",
        "domain-event",
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ImplementationPattern::DatabasePerService => "database-per-service",
            ImplementationPattern::SharedDatabase => "shared-database",
            ImplementationPattern::ApiComposition => "api-composition",
            ImplementationPattern::Cqrs => "cqrs",
            ImplementationPattern::Saga => "saga",
            ImplementationPattern::Aggregate => "aggregate",
            ImplementationPattern::EventSourcing => "event-sourcing",
            ImplementationPattern::DomainEvent => "domain-event",
            ImplementationPattern::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ImplementationPattern::Other(_))
    }
}

impl From<String> for ImplementationPattern {
    fn from(raw: String) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '_' { '-' } else { c })
            .collect();
        let key = key.trim_end_matches("-pattern");

        match key {
            "database-per-service" | "db-per-service" => ImplementationPattern::DatabasePerService,
            "shared-database" | "shared-db" => ImplementationPattern::SharedDatabase,
            "api-composition" | "api-composer" => ImplementationPattern::ApiComposition,
            "cqrs" => ImplementationPattern::Cqrs,
            "saga" => ImplementationPattern::Saga,
            "aggregate" => ImplementationPattern::Aggregate,
            "event-sourcing" => ImplementationPattern::EventSourcing,
            "domain-event" | "domain-events" => ImplementationPattern::DomainEvent,
            _ => ImplementationPattern::Other(raw),
        }
    }
}

impl From<ImplementationPattern> for String {
    fn from(pattern: ImplementationPattern) -> Self {
        pattern.as_str().to_string()
    }
}

impl fmt::Display for ImplementationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JsonSchema for ImplementationPattern {
    fn schema_name() -> Cow<'static, str> {
        "ImplementationPattern".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "enum": ImplementationPattern::VOCABULARY,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Pattern {
    #[serde(default, deserialize_with = "string_or_null")]
    pub group_name: String,
    pub implementation_pattern: ImplementationPattern,
    #[serde(default, deserialize_with = "string_list")]
    pub involved_microservices: Vec<String>,
    #[serde(default, alias = "explaination", deserialize_with = "string_or_null")]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Datastore {
    #[serde(default, alias = "dataset_name", deserialize_with = "string_or_null")]
    pub datastore_name: String,
    #[serde(
        default,
        alias = "associated_microservice",
        alias = "associtated_microservice",
        deserialize_with = "string_list"
    )]
    pub associated_microservices: Vec<String>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
}

/// Aggregate root: microservices, patterns and datastores for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArchitectureDocument {
    #[serde(default, deserialize_with = "vec_or_null")]
    pub microservices: Vec<Microservice>,
    #[serde(default, deserialize_with = "vec_or_null")]
    pub patterns: Vec<Pattern>,
    #[serde(default, alias = "datasets", deserialize_with = "vec_or_null")]
    pub datastore: Vec<Datastore>,
}

/// A data-quality finding produced by the validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    EmptyName { entity: String, index: usize },
    DuplicateMicroservice { name: String },
    UnknownPattern { group: String, value: String },
    UnknownMicroservice { referenced_by: String, name: String },
    MissingDatastore { microservice: String },
    UncoveredUserStory { id: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::EmptyName { entity, index } => {
                write!(f, "{} #{} has an empty name", entity, index)
            }
            Violation::DuplicateMicroservice { name } => {
                write!(f, "microservice '{}' is declared more than once", name)
            }
            Violation::UnknownPattern { group, value } => write!(
                f,
                "pattern group '{}' uses '{}', which is outside the allowed vocabulary",
                group, value
            ),
            Violation::UnknownMicroservice {
                referenced_by,
                name,
            } => write!(
                f,
                "'{}' references unknown microservice '{}'",
                referenced_by, name
            ),
            Violation::MissingDatastore { microservice } => {
                write!(f, "microservice '{}' has no associated datastore", microservice)
            }
            Violation::UncoveredUserStory { id } => {
                write!(f, "user story {} is not implemented by any microservice", id)
            }
        }
    }
}

fn canonical(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ArchitectureDocument {
    pub fn microservice_names(&self) -> Vec<&str> {
        self.microservices.iter().map(|m| m.name.as_str()).collect()
    }

    /// Check the document against the domain invariants.
    ///
    /// Returns every violation found instead of stopping at the first one,
    /// so callers can decide whether mostly-valid output is usable.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut known = HashSet::new();

        for (index, ms) in self.microservices.iter().enumerate() {
            if ms.name.trim().is_empty() {
                violations.push(Violation::EmptyName {
                    entity: "microservice".to_string(),
                    index,
                });
                continue;
            }
            if !known.insert(canonical(&ms.name)) {
                violations.push(Violation::DuplicateMicroservice {
                    name: ms.name.clone(),
                });
            }
        }

        let check_ref = |owner: &str, name: &str, violations: &mut Vec<Violation>| {
            if !known.contains(&canonical(name)) {
                violations.push(Violation::UnknownMicroservice {
                    referenced_by: owner.to_string(),
                    name: name.to_string(),
                });
            }
        };

        for (index, pattern) in self.patterns.iter().enumerate() {
            if pattern.group_name.trim().is_empty() {
                violations.push(Violation::EmptyName {
                    entity: "pattern".to_string(),
                    index,
                });
            }
            if !pattern.implementation_pattern.is_known() {
                violations.push(Violation::UnknownPattern {
                    group: pattern.group_name.clone(),
                    value: pattern.implementation_pattern.to_string(),
                });
            }
            for name in &pattern.involved_microservices {
                check_ref(&pattern.group_name, name, &mut violations);
            }
        }

        let mut with_datastore = HashSet::new();
        for (index, store) in self.datastore.iter().enumerate() {
            if store.datastore_name.trim().is_empty() {
                violations.push(Violation::EmptyName {
                    entity: "datastore".to_string(),
                    index,
                });
            }
            for name in &store.associated_microservices {
                check_ref(&store.datastore_name, name, &mut violations);
                with_datastore.insert(canonical(name));
            }
        }

        for ms in &self.microservices {
            if !ms.name.trim().is_empty() && !with_datastore.contains(&canonical(&ms.name)) {
                violations.push(Violation::MissingDatastore {
                    microservice: ms.name.clone(),
                });
            }
        }

        violations
    }

    /// Input user-story ids that no microservice claims.
    pub fn uncovered_user_stories(&self, story_ids: &[String]) -> Vec<String> {
        let number = story_number();
        let claimed: HashSet<String> = self
            .microservices
            .iter()
            .flat_map(|ms| ms.user_stories.iter())
            .filter_map(|entry| number?.find(entry).map(|m| m.as_str().to_string()))
            .collect();

        story_ids
            .iter()
            .filter(|id| !claimed.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

fn story_number() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"\d+")
}

fn story_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"^\s*(?:US\s*)?(\d+)\s*[).:\-]")
}

/// Ids of numbered user stories (`12) As a ...`, `3. As a ...`), in order.
pub fn user_story_ids(user_stories: &str) -> Vec<String> {
    let Some(line) = story_line() else {
        return Vec::new();
    };
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for text in user_stories.lines() {
        if let Some(caps) = line.captures(text) {
            let id = caps[1].to_string();
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
    }
    ids
}

// ============================================================================
// Project Tree
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// File name; may itself encode a nested relative path.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "vec_or_null")]
    pub folders: Vec<Option<Folder>>,
    #[serde(default, deserialize_with = "vec_or_null")]
    pub files: Vec<Option<File>>,
}

/// In-memory file system as emitted by a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTree {
    #[serde(default, deserialize_with = "vec_or_null")]
    pub folders: Vec<Option<Folder>>,
    #[serde(default, deserialize_with = "vec_or_null")]
    pub files: Vec<Option<File>>,
}

fn named(name: &Option<String>) -> Option<&str> {
    name.as_deref().map(str::trim).filter(|n| !n.is_empty())
}

impl File {
    pub fn name(&self) -> Option<&str> {
        named(&self.name)
    }
}

impl Folder {
    pub fn name(&self) -> Option<&str> {
        named(&self.name)
    }
}
