//! Options and per-invocation context for the CSS scoping engine.

use serde::{Deserialize, Serialize};

use crate::error::{CssModulesError, Result};
use crate::scoper::{Salt, DEFAULT_HASH_LENGTH, MAX_HASH_LENGTH, MIN_HASH_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CssModulesOptions {
    /// Fixed salt. A random one is drawn per invocation when absent.
    pub salt: Option<String>,
    /// Number of hex characters of the hash kept in scoped names
    pub hash_length: usize,
}

impl Default for CssModulesOptions {
    fn default() -> Self {
        Self {
            salt: None,
            hash_length: DEFAULT_HASH_LENGTH,
        }
    }
}

impl CssModulesOptions {
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self {
            salt: Some(salt.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(&self.hash_length) {
            return Err(CssModulesError::invalid_input(format!(
                "hash length must be between {} and {}, got {}",
                MIN_HASH_LENGTH, MAX_HASH_LENGTH, self.hash_length
            )));
        }
        Ok(())
    }
}

/// State owned by one scoping invocation.
#[derive(Debug, Clone)]
pub struct ScopingContext {
    pub salt: Salt,
    pub hash_length: usize,
}

impl ScopingContext {
    pub fn new(salt: Salt) -> Self {
        Self {
            salt,
            hash_length: DEFAULT_HASH_LENGTH,
        }
    }

    /// Random salt, default hash length.
    pub fn generate() -> Self {
        Self::new(Salt::generate())
    }

    pub fn from_options(options: &CssModulesOptions) -> Result<Self> {
        options.validate()?;
        let salt = match &options.salt {
            Some(salt) => Salt::new(salt.clone()),
            None => Salt::generate(),
        };
        Ok(Self {
            salt,
            hash_length: options.hash_length,
        })
    }
}
