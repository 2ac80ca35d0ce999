//! Session storage
//!
//! Namespaced ephemeral key/value bag with two scopes: turn-scoped entries
//! are cleared at the start of every turn, interaction-scoped entries
//! persist until an interaction resolves. Well-known keys are declared as
//! typed constants so each key has exactly one value shape; raw string
//! access is deliberately not exposed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Lifetime of a storage entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// Cleared at turn start (stop flags, one-shot markers)
    Turn,
    /// Cleared when an interaction resolves (counters, pending requests)
    Interaction,
}

/// A storage key statically bound to one value type
pub struct TypedKey<T> {
    pub name: &'static str,
    pub scope: StorageScope,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    pub const fn new(name: &'static str, scope: StorageScope) -> Self {
        Self {
            name,
            scope,
            _marker: PhantomData,
        }
    }
}

// Manual impls: derive would bound T unnecessarily.
impl<T> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for TypedKey<T> {}

/// Two-scope ephemeral storage bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionStorage {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    turn: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    interaction: HashMap<String, Value>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn bag(&self, scope: StorageScope) -> &HashMap<String, Value> {
        match scope {
            StorageScope::Turn => &self.turn,
            StorageScope::Interaction => &self.interaction,
        }
    }

    fn bag_mut(&mut self, scope: StorageScope) -> &mut HashMap<String, Value> {
        match scope {
            StorageScope::Turn => &mut self.turn,
            StorageScope::Interaction => &mut self.interaction,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: TypedKey<T>) -> Option<T> {
        self.bag(key.scope)
            .get(key.name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn put<T: Serialize>(&mut self, key: TypedKey<T>, value: &T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.bag_mut(key.scope).insert(key.name.to_string(), value);
        }
    }

    pub fn remove<T>(&mut self, key: TypedKey<T>) {
        self.bag_mut(key.scope).remove(key.name);
    }

    pub fn contains<T>(&self, key: TypedKey<T>) -> bool {
        self.bag(key.scope).contains_key(key.name)
    }

    /// Called by the engine at the start of every turn
    pub fn begin_turn(&mut self) {
        self.turn.clear();
    }

    /// Called when an interaction resolves (intent matched, give-up taken)
    pub fn end_interaction(&mut self) {
        self.interaction.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAG: TypedKey<bool> = TypedKey::new("flag", StorageScope::Turn);
    const COUNT: TypedKey<u32> = TypedKey::new("count", StorageScope::Interaction);

    #[test]
    fn test_typed_round_trip() {
        let mut storage = SessionStorage::new();
        storage.put(COUNT, &2);
        assert_eq!(storage.get(COUNT), Some(2));
        storage.remove(COUNT);
        assert_eq!(storage.get(COUNT), None);
    }

    #[test]
    fn test_turn_scope_cleared_per_turn() {
        let mut storage = SessionStorage::new();
        storage.put(FLAG, &true);
        storage.put(COUNT, &1);

        storage.begin_turn();
        assert_eq!(storage.get(FLAG), None);
        assert_eq!(storage.get(COUNT), Some(1));
    }

    #[test]
    fn test_interaction_scope_survives_turns() {
        let mut storage = SessionStorage::new();
        storage.put(COUNT, &3);
        storage.begin_turn();
        storage.begin_turn();
        assert_eq!(storage.get(COUNT), Some(3));

        storage.end_interaction();
        assert_eq!(storage.get(COUNT), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut storage = SessionStorage::new();
        storage.put(COUNT, &7);
        let json = serde_json::to_string(&storage).unwrap();
        let back: SessionStorage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(COUNT), Some(7));
    }
}
