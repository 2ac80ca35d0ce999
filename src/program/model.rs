//! Version language model
//!
//! The intents, entities, and project-wide prompts of one published version.
//! Supplied read-only by the program provider; the classification cascade
//! and slot-filler consume it heavily.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the classifier needs to know about a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionModel {
    pub intents: Vec<IntentModel>,
    pub entities: Vec<EntityModel>,
    pub locale: String,
    pub platform: Platform,
    #[serde(default)]
    pub global_prompts: GlobalPrompts,
}

impl VersionModel {
    /// Look up an intent by normalized name
    pub fn intent(&self, name: &str) -> Option<&IntentModel> {
        let wanted = crate::request::normalize_name(name);
        self.intents
            .iter()
            .find(|i| crate::request::normalize_name(&i.name) == wanted)
    }

    /// Look up an entity by name
    pub fn entity(&self, name: &str) -> Option<&EntityModel> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// All intent names, for open-scope classification
    pub fn intent_names(&self) -> Vec<String> {
        self.intents.iter().map(|i| i.name.clone()).collect()
    }
}

/// One authored intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentModel {
    pub name: String,
    /// Example utterances; `{entity}` placeholders mark slots
    #[serde(default)]
    pub utterances: Vec<String>,
    /// Entities that must be filled before the intent can resolve
    #[serde(default)]
    pub required_entities: Vec<String>,
    /// Author-supplied elicitation prompts, keyed by entity name
    #[serde(default)]
    pub entity_prompts: HashMap<String, Vec<String>>,
}

impl IntentModel {
    /// Required entities not present in `captured`
    pub fn missing_entities<'a>(&'a self, captured: &[crate::request::EntityValue]) -> Vec<&'a str> {
        self.required_entities
            .iter()
            .filter(|required| !captured.iter().any(|e| &e.name == *required))
            .map(String::as_str)
            .collect()
    }
}

/// One authored entity (slot) type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityModel {
    pub name: String,
    pub kind: EntityKind,
}

/// How an entity's values are recognized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    /// Closed enumeration; each value may carry synonyms
    Custom { values: Vec<EntityVariant> },
    /// Free type (names, numbers, arbitrary text); matched permissively
    Freeform,
}

/// One canonical value of a custom entity plus its synonyms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVariant {
    pub value: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Target surface of the version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Chat,
    Voice,
}

/// Project-wide fallback prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GlobalPrompts {
    /// Author-customized global no-match prompt; `None` means the author
    /// never touched it and the built-in default applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_match: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_reply: Option<String>,
}

/// Built-in prompt used only when the author never customized the global one
pub const DEFAULT_NO_MATCH_PROMPT: &str = "Sorry, I didn't get that.";
pub const DEFAULT_NO_REPLY_PROMPT: &str = "Are you still there?";

impl GlobalPrompts {
    /// Global no-match prompt: the customized one if the author set it,
    /// otherwise the built-in default
    pub fn no_match_prompt(&self) -> &str {
        self.no_match.as_deref().unwrap_or(DEFAULT_NO_MATCH_PROMPT)
    }

    pub fn no_reply_prompt(&self) -> &str {
        self.no_reply.as_deref().unwrap_or(DEFAULT_NO_REPLY_PROMPT)
    }
}
