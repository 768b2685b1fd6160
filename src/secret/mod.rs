//! The secret container: a password line plus an optional YAML body.
//!
//! On-the-wire layout (inside one ciphertext, after decryption):
//!
//! ```text
//! <password>\n
//! [---\n
//! <yaml-body>]
//! ```
//!
//! Everything up to the first newline is the password; the remainder is
//! the body.  When the body begins with the `---\n` document marker it is
//! additionally parsed as a YAML mapping so individual values can be read
//! and written by key.  The raw body stays authoritative: a body that
//! fails to parse still round-trips byte-for-byte.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::errors::{Result, StoreError};

/// The YAML document marker that starts a structured body.
const YAML_MARK: &str = "---\n";

/// A single decrypted secret: password plus body.
///
/// `parse` and `bytes` satisfy `parse(s.bytes()) == s` for every
/// well-formed secret.  Key writes switch the container to a "dirty"
/// state in which `bytes` re-emits the body from the parsed view with
/// sorted keys.
#[derive(Debug, Clone, Default)]
pub struct Secret {
    password: String,
    body: String,
    parsed: Option<Mapping>,
    dirty: bool,
}

impl Secret {
    /// Create a secret from a password and a raw body.
    ///
    /// The body is parsed as YAML when it starts with `---\n`; parse
    /// failure is non-fatal and leaves the raw body authoritative.
    pub fn new(password: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let parsed = parse_body(&body);
        Self {
            password: password.into(),
            body,
            parsed,
            dirty: false,
        }
    }

    /// Parse the canonical serialization produced by `bytes`.
    ///
    /// Splits off everything up to (but not including) the first `\n` as
    /// the password; the remainder is the body.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| StoreError::Serialization(format!("secret is not valid UTF-8: {e}")))?;

        let (password, body) = match text.split_once('\n') {
            Some((pw, rest)) => (pw, rest),
            // A bare password with no newline is itself a valid secret.
            None => (text, ""),
        };

        Ok(Self::new(password, body))
    }

    /// The password line.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Replace the password line.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// The raw body, exactly as parsed or last serialized.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Serialize back to the canonical byte form.
    ///
    /// Without key writes the raw body is reproduced byte-for-byte; an
    /// empty body serializes to just the password.  After a key write the
    /// body is re-emitted from the parsed view with keys sorted.
    pub fn bytes(&self) -> Vec<u8> {
        if !self.dirty {
            if self.body.is_empty() {
                return self.password.clone().into_bytes();
            }
            return format!("{}\n{}", self.password, self.body).into_bytes();
        }

        // Dirty: emit password + "---\n" + YAML with sorted keys.
        let mut sorted: BTreeMap<String, &Value> = BTreeMap::new();
        if let Some(m) = &self.parsed {
            for (k, v) in m {
                sorted.insert(stringify(k), v);
            }
        }
        let yaml = serde_yaml::to_string(&sorted).unwrap_or_default();
        format!("{}\n{}{}", self.password, YAML_MARK, yaml).into_bytes()
    }

    /// Look up a body value by key and return it in stringified form.
    ///
    /// Scalars are rendered directly; containers are rendered as YAML.
    /// Fails with `NoYamlMark` when the body carries no YAML document
    /// marker and with `NoKey` when the key is absent from a parsed
    /// mapping.  A body whose marker is present but whose YAML failed to
    /// parse yields an empty string for every key; the raw body remains
    /// authoritative.
    pub fn value(&self, key: &str) -> Result<String> {
        match &self.parsed {
            Some(m) => {
                let k = Value::String(key.to_string());
                match m.get(&k) {
                    Some(v) => Ok(stringify(v)),
                    None => Err(StoreError::NoKey(key.to_string())),
                }
            }
            None if self.body.starts_with(YAML_MARK) => Ok(String::new()),
            None => Err(StoreError::NoYamlMark),
        }
    }

    /// Set a body value, creating the parsed view if the body was empty.
    ///
    /// Refuses to overwrite a non-empty body that has no parsed view, so
    /// unstructured bodies are never silently destroyed.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        if self.parsed.is_none() {
            if !self.body.is_empty() {
                return Err(StoreError::NoYamlMark);
            }
            self.parsed = Some(Mapping::new());
        }
        let m = self.parsed.get_or_insert_with(Mapping::new);
        m.insert(
            Value::String(key.to_string()),
            Value::String(value.to_string()),
        );
        self.dirty = true;
        Ok(())
    }

    /// Remove a key from the parsed view.
    ///
    /// Removing an absent key is a no-op; a body without a parsed view
    /// fails with `NoYamlMark`.
    pub fn delete_key(&mut self, key: &str) -> Result<()> {
        let m = self.parsed.as_mut().ok_or(StoreError::NoYamlMark)?;
        let k = Value::String(key.to_string());
        if m.remove(&k).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    /// All keys of the parsed view, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match &self.parsed {
            Some(m) => m.keys().map(stringify).collect(),
            None => Vec::new(),
        };
        keys.sort();
        keys
    }
}

/// Two secrets are equal when their canonical serializations are equal.
impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

impl Eq for Secret {}

/// Try to parse a body as a YAML mapping.  Only bodies that begin with
/// the document marker are considered; failure is non-fatal.
fn parse_body(body: &str) -> Option<Mapping> {
    if !body.starts_with(YAML_MARK) {
        return None;
    }
    serde_yaml::from_str::<Mapping>(body).ok()
}

/// Render a YAML value as a plain string.
fn stringify(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
