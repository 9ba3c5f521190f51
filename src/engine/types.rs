// SPDX-License-Identifier: Apache-2.0

//! Shared types for connection configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Field name to value mapping handed to a client session constructor
pub type ConfigMap = HashMap<String, String>;

pub const KEY_USER: &str = "user";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_ACCOUNT: &str = "account";
pub const KEY_DATABASE: &str = "database";
pub const KEY_WAREHOUSE: &str = "warehouse";
pub const KEY_SCHEMA: &str = "schema";

/// Query keys that pass through even in safe mode
pub const RESERVED_KEYS: [&str; 6] = [
    KEY_USER,
    KEY_PASSWORD,
    KEY_ACCOUNT,
    KEY_WAREHOUSE,
    KEY_DATABASE,
    KEY_SCHEMA,
];

/// Safe mode is on unless a caller opts out
pub const DEFAULT_SAFE_MODE: bool = true;

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// One `key=value` pair from the query string, decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub key: String,
    pub value: String,
    /// Text of the pair as it appeared in the parsed URI. Cleared on edit.
    #[serde(skip)]
    pub(crate) raw: Option<String>,
}

impl QueryParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            raw: None,
        }
    }

    pub(crate) fn parsed(key: String, value: String, raw: &str) -> Self {
        Self {
            key,
            value,
            raw: Some(raw.to_string()),
        }
    }
}
