//! Pattern hints parsed from a project README.
//!
//! Two bullet styles are recognised:
//!
//! ```text
//! - **Authentication Service**: Handles logins. Implements the Aggregate pattern.
//! - Booking Service (Saga, Aggregate, Domain Event)
//! ```

use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::parse::compiled;

macro_rules! literal_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static Regex> {
            static RE: OnceLock<Option<Regex>> = OnceLock::new();
            compiled(&RE, $pattern)
        }
    };
}

literal_regex!(markup, r"[*_`]+");
literal_regex!(service_word_ci, r"(?i)\bservice\b");
literal_regex!(spaces, r"\s+");
literal_regex!(aggregate_word, r"\baggregate\b");
literal_regex!(domain_event_word, r"\bdomain\s*event\b");
literal_regex!(saga_word, r"\bsaga\b");
literal_regex!(api_composition_word, r"\bapi\s*composition\b");
literal_regex!(database_per_service_word, r"\bdatabase-?per-?service\b");
literal_regex!(
    prose_bullet,
    r"^\s*[-*•]\s*(?:\*\*|__)?\s*([A-Za-z0-9 &/_-]+?\s+Service)\s*(?:\*\*|__)?\s*:\s*(.+)$"
);
literal_regex!(classic_bullet, r"^\s*[-*•]\s*(.+?)\s*\(([^)]+)\)\s*$");
literal_regex!(lower_word, r"[a-z]+");
literal_regex!(service_suffix, r"(?i)-service$");
literal_regex!(service_word, r"\bservice\b");

fn strip_all<'a>(re: Option<&Regex>, s: &'a str, with: &str) -> Cow<'a, str> {
    match re {
        Some(re) => re.replace_all(s, with),
        None => Cow::Borrowed(s),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaFlag {
    pub name: String,
}

/// Patterns a README asks for on one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternFlags {
    pub aggregate: bool,
    pub events: bool,
    pub cqrs: bool,
    pub saga: Option<SagaFlag>,
    pub api_composition: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub database_per_service: bool,
}

/// README label → flags, in order of first appearance.
pub type ReadmePatterns = Vec<(String, PatternFlags)>;

pub fn canonical_name(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// `**Authentication Service**` → `authentication`.
pub fn simplify_service_label(s: &str) -> String {
    let s = strip_all(markup(), s.trim(), "");
    let s = strip_all(service_word_ci(), &s, "");
    let s = strip_all(spaces(), &s, " ");
    s.trim().to_lowercase()
}

/// Title-cased first word of a service label, used as the saga name.
fn saga_name(label: &str) -> String {
    let first = label.split_whitespace().next().unwrap_or_default();
    let mut chars = first.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn has(text: &str, re: Option<&Regex>) -> bool {
    re.map_or(false, |re| re.is_match(text))
}

/// Flags mentioned in a prose description.
pub fn extract_patterns_freeform(text: &str) -> PatternFlags {
    let t = text
        .to_lowercase()
        .replace("domain events", "domain event")
        .replace("events", "event")
        .replace("database per service", "database-per-service");

    PatternFlags {
        aggregate: has(&t, aggregate_word()),
        events: has(&t, domain_event_word()),
        cqrs: false,
        saga: has(&t, saga_word()).then(|| SagaFlag {
            name: String::new(),
        }),
        api_composition: has(&t, api_composition_word()),
        database_per_service: has(&t, database_per_service_word()),
    }
}

fn upsert(map: &mut ReadmePatterns, key: String, flags: PatternFlags) {
    match map.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = flags,
        None => map.push((key, flags)),
    }
}

pub fn parse_patterns_from_readme(readme: &str) -> ReadmePatterns {
    let mut map = ReadmePatterns::new();

    let (Some(prose), Some(classic)) = (prose_bullet(), classic_bullet()) else {
        return map;
    };
    for line in readme.lines() {
        let Some(caps) = prose.captures(line) else {
            continue;
        };
        let label = caps[1].trim();
        let mut flags = extract_patterns_freeform(caps[2].trim());
        if let Some(saga) = flags.saga.as_mut() {
            saga.name = saga_name(label);
        }
        upsert(&mut map, simplify_service_label(label), flags);
    }

    for line in readme.lines() {
        let Some(caps) = classic.captures(line) else {
            continue;
        };
        let label = caps[1].trim();
        let key = simplify_service_label(label);
        let mut flags = map
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, f)| f.clone())
            .unwrap_or_default();

        for token in caps[2].split(|c: char| c == ',' || c == '\u{FF0C}') {
            match token.trim().to_lowercase().as_str() {
                "aggregate" => flags.aggregate = true,
                "domain event" | "event" => flags.events = true,
                "cqrs" => flags.cqrs = true,
                "api composition" => flags.api_composition = true,
                "saga" if flags.saga.is_none() => {
                    flags.saga = Some(SagaFlag {
                        name: saga_name(label),
                    })
                }
                _ => {}
            }
        }
        upsert(&mut map, key, flags);
    }

    map
}

fn words(s: &str) -> HashSet<String> {
    let Some(word) = lower_word() else {
        return HashSet::new();
    };
    word.find_iter(&s.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Best-effort alignment of README labels with service folder names.
///
/// Each label goes to the folder with the highest score: 5 when one
/// canonical name contains the other, plus one per shared word. Ties keep
/// the earlier folder; a later label for the same folder replaces the
/// earlier one.
pub fn match_readme_to_folders(
    readme: &ReadmePatterns,
    folders: &[String],
) -> BTreeMap<String, PatternFlags> {
    let folder_keys: Vec<(&String, String)> = folders
        .iter()
        .map(|f| (f, canonical_name(&strip_all(service_suffix(), f, ""))))
        .collect();

    let mut assigned = BTreeMap::new();
    for (label, flags) in readme {
        let key = canonical_name(&strip_all(service_word(), label, ""));
        let label_words = words(label);

        let mut best: Option<&String> = None;
        let mut best_score = -1i64;
        for (folder, folder_key) in &folder_keys {
            let mut score = 0i64;
            if folder_key.contains(key.as_str()) || key.contains(folder_key.as_str()) {
                score += 5;
            }
            let folder_words = words(&folder.replace('-', " "));
            score += label_words.intersection(&folder_words).count() as i64;
            if score > best_score {
                best = Some(folder);
                best_score = score;
            }
        }

        if let Some(folder) = best {
            assigned.insert(folder.clone(), flags.clone());
        }
    }
    assigned
}
