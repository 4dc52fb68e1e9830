//! Class Scoper
//!
//! Derives collision-resistant class names from an author's class name and a
//! per-invocation salt, and records every mapping it hands out.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CssModulesError, Result};

pub const DEFAULT_HASH_LENGTH: usize = 12;
pub const MIN_HASH_LENGTH: usize = 6;
pub const MAX_HASH_LENGTH: usize = 64;

/// Per-invocation salt mixed into every class hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(String);

impl Salt {
    /// Fixed salt, for reproducible output.
    pub fn new(value: impl Into<String>) -> Self {
        Salt(value.into())
    }

    /// Fresh random salt.
    pub fn generate() -> Self {
        Salt(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Salts never appear in logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// Mapping from author class names to scoped class names.
///
/// Inserting a name twice keeps the last scoped name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassNameMap(HashMap<String, String>);

impl ClassNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping, returning the scoped name it replaced.
    pub fn insert(&mut self, original: impl Into<String>, scoped: impl Into<String>) -> Option<String> {
        self.0.insert(original.into(), scoped.into())
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.0.get(original).map(String::as_str)
    }

    pub fn contains(&self, original: &str) -> bool {
        self.0.contains_key(original)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|e| CssModulesError::UnexpectedInternal {
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CssModulesError::invalid_input(format!("invalid class map: {}", e)))
    }
}

impl From<HashMap<String, String>> for ClassNameMap {
    fn from(map: HashMap<String, String>) -> Self {
        ClassNameMap(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ClassNameMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ClassNameMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Hash a class name together with the salt, hex encoded and truncated.
pub fn compute_hash(base: &str, salt: &Salt, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(salt.as_str().as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(length);
    hex
}

/// Build the scoped name `_<base>_<hash>`.
pub fn scoped_name(base: &str, salt: &Salt, length: usize) -> String {
    format!("_{}_{}", base, compute_hash(base, salt, length))
}

/// Hands out scoped names and records them in a [`ClassNameMap`].
pub struct ClassScoper<'a> {
    salt: &'a Salt,
    hash_length: usize,
    classes: ClassNameMap,
}

impl<'a> ClassScoper<'a> {
    pub fn new(salt: &'a Salt, hash_length: usize) -> Self {
        Self {
            salt,
            hash_length,
            classes: ClassNameMap::new(),
        }
    }

    pub fn scope(&mut self, base: &str) -> String {
        let scoped = scoped_name(base, self.salt, self.hash_length);
        self.classes.insert(base, scoped.clone());
        scoped
    }

    pub fn classes(&self) -> &ClassNameMap {
        &self.classes
    }

    pub fn into_classes(self) -> ClassNameMap {
        self.classes
    }
}
