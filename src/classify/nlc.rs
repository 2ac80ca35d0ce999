//! Deterministic pattern matching (NLC tier)
//!
//! Authored example utterances compile to anchored regexes; `{entity}`
//! placeholders become per-entity-type matchers. Custom enumerations match
//! strictly against their value/synonym lists, free types permissively. In
//! open-slot mode the custom enumerations loosen to permissive matching
//! too, which is the cascade's last resort before giving up.

use super::{PredictScope, PredictionResult, PredictionSource};
use crate::program::{EntityKind, VersionModel};
use crate::request::{normalize_name, EntityValue};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

const CLOSED_CONFIDENCE: f64 = 1.0;
const OPEN_CONFIDENCE: f64 = 0.9;

/// Compiled pattern matcher for one version model
pub struct NlcMatcher {
    utterances: Vec<CompiledUtterance>,
    entities: HashMap<String, CompiledEntity>,
    open_slot: bool,
}

struct CompiledUtterance {
    intent: String,
    regex: Regex,
    /// Capture group `i + 1` holds the value of `slots[i]`
    slots: Vec<String>,
}

enum CompiledEntity {
    /// lowercase synonym -> canonical value
    Custom(HashMap<String, String>),
    Freeform,
}

impl NlcMatcher {
    pub fn compile(model: &VersionModel, open_slot: bool) -> Self {
        let mut entities = HashMap::new();
        for entity in &model.entities {
            let compiled = match &entity.kind {
                EntityKind::Custom { values } => {
                    let mut lookup = HashMap::new();
                    for variant in values {
                        lookup.insert(variant.value.to_lowercase(), variant.value.clone());
                        for synonym in &variant.synonyms {
                            lookup.insert(synonym.to_lowercase(), variant.value.clone());
                        }
                    }
                    CompiledEntity::Custom(lookup)
                }
                EntityKind::Freeform => CompiledEntity::Freeform,
            };
            entities.insert(entity.name.clone(), compiled);
        }

        let mut utterances = Vec::new();
        for intent in &model.intents {
            for template in &intent.utterances {
                if let Some(compiled) = compile_template(template, &entities, open_slot) {
                    utterances.push(CompiledUtterance {
                        intent: intent.name.clone(),
                        regex: compiled.0,
                        slots: compiled.1,
                    });
                }
            }
        }

        Self {
            utterances,
            entities,
            open_slot,
        }
    }

    /// Match an utterance against the compiled templates. First authored
    /// template that matches wins.
    pub fn matches(&self, utterance: &str, scope: &PredictScope) -> Option<PredictionResult> {
        let confidence = if self.open_slot {
            OPEN_CONFIDENCE
        } else {
            CLOSED_CONFIDENCE
        };

        for compiled in self.scoped_utterances(scope) {
            let Some(captures) = compiled.regex.captures(utterance.trim()) else {
                continue;
            };

            let mut captured = Vec::new();
            for (index, slot) in compiled.slots.iter().enumerate() {
                let Some(group) = captures.get(index + 1) else {
                    continue;
                };
                let raw = group.as_str().trim();
                let value = self.canonicalize(slot, raw);
                captured.push(EntityValue::new(slot.clone(), value));
            }

            return Some(PredictionResult {
                intent_name: compiled.intent.clone(),
                confidence,
                entities: captured,
                source: PredictionSource::Nlc,
            });
        }

        // Slot-filling turns often carry a bare entity value ("paris")
        // rather than a full utterance; match those directly.
        if let PredictScope::Intent { name, entities } = scope {
            if let Some(entity) = self.match_bare_value(utterance, entities) {
                return Some(PredictionResult {
                    intent_name: name.clone(),
                    confidence,
                    entities: vec![entity],
                    source: PredictionSource::Nlc,
                });
            }
        }

        None
    }

    fn scoped_utterances<'a>(
        &'a self,
        scope: &'a PredictScope,
    ) -> impl Iterator<Item = &'a CompiledUtterance> {
        self.utterances.iter().filter(move |u| match scope {
            PredictScope::Open => true,
            PredictScope::Intent { name, .. } => {
                normalize_name(&u.intent) == normalize_name(name)
            }
        })
    }

    fn canonicalize(&self, entity_name: &str, raw: &str) -> String {
        match self.entities.get(entity_name) {
            Some(CompiledEntity::Custom(lookup)) => lookup
                .get(&raw.to_lowercase())
                .cloned()
                .unwrap_or_else(|| raw.to_string()),
            _ => raw.to_string(),
        }
    }

    fn match_bare_value(&self, utterance: &str, wanted: &[String]) -> Option<EntityValue> {
        let trimmed = utterance.trim();
        for name in wanted {
            match self.entities.get(name) {
                Some(CompiledEntity::Custom(lookup)) => {
                    if let Some(canonical) = lookup.get(&trimmed.to_lowercase()) {
                        return Some(EntityValue::new(name.clone(), canonical.clone()));
                    }
                }
                // A free type swallows any utterance, which is only safe as
                // the open-slot last resort.
                Some(CompiledEntity::Freeform) if self.open_slot && !trimmed.is_empty() => {
                    return Some(EntityValue::new(name.clone(), trimmed));
                }
                _ => {}
            }
        }
        None
    }
}

/// Compile one `fly to {city}` template into an anchored regex plus the
/// slot names its capture groups bind.
fn compile_template(
    template: &str,
    entities: &HashMap<String, CompiledEntity>,
    open_slot: bool,
) -> Option<(Regex, Vec<String>)> {
    let mut pattern = String::from(r"^\s*");
    let mut slots = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let (literal, tail) = rest.split_at(open);
        push_literal(&mut pattern, literal);

        let close = tail.find('}')?;
        let slot_name = tail.get(1..close)?.trim().to_string();
        if slot_name.is_empty() {
            return None;
        }
        rest = tail.get(close + 1..)?;

        match entities.get(&slot_name) {
            Some(CompiledEntity::Custom(lookup)) if !open_slot && !lookup.is_empty() => {
                let mut alternatives: Vec<&String> = lookup.keys().collect();
                // Longest first so "new york city" beats "new york"
                alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
                let joined = alternatives
                    .iter()
                    .map(|alt| regex::escape(alt))
                    .collect::<Vec<_>>()
                    .join("|");
                pattern.push('(');
                pattern.push_str(&joined);
                pattern.push(')');
            }
            _ => pattern.push_str("(.+?)"),
        }
        slots.push(slot_name);
    }
    push_literal(&mut pattern, rest);
    pattern.push_str(r"\s*$");

    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()?;
    Some((regex, slots))
}

/// Escape a literal template segment, tolerating flexible whitespace
fn push_literal(pattern: &mut String, literal: &str) {
    let mut first = true;
    for word in literal.split_whitespace() {
        if !first || literal.starts_with(char::is_whitespace) {
            pattern.push_str(r"\s+");
        }
        pattern.push_str(&regex::escape(word));
        first = false;
    }
    if !literal.is_empty() && literal.ends_with(char::is_whitespace) {
        pattern.push_str(r"\s+");
    }
}
