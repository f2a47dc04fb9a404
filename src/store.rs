//! Key/value persistence for settings, counters and analytics
//!
//! The tracker only ever talks to the [`KeyValueStore`] trait. Writes land in
//! memory and become durable on [`KeyValueStore::flush`]; the tracker flushes
//! after every mutation of the counter.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::paths;

/// A stored value. Serialized untagged so the JSON file stays hand-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Set(BTreeSet<String>),
}

impl Value {
    /// Parse a value typed on the command line: booleans, integers, then strings
    pub fn parse_loose(raw: &str) -> Self {
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => raw
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Str(raw.to_string())),
        }
    }
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value);

    fn remove(&mut self, key: &str);

    /// Make pending writes durable
    fn flush(&mut self) -> Result<()>;

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Int(n) => Some(n),
            other => {
                debug!(key = %key, value = ?other, "Stored value is not an integer");
                None
            }
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(b),
            other => {
                debug!(key = %key, value = ?other, "Stored value is not a boolean");
                None
            }
        }
    }

    fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Str(s) => Some(s),
            other => {
                debug!(key = %key, value = ?other, "Stored value is not a string");
                None
            }
        }
    }

    fn get_set(&self, key: &str) -> BTreeSet<String> {
        match self.get(key) {
            Some(Value::Set(set)) => set,
            _ => BTreeSet::new(),
        }
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.set(key, Value::Int(value));
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, Value::Bool(value));
    }

    fn set_str(&mut self, key: &str, value: &str) {
        self.set(key, Value::Str(value.to_string()));
    }

    /// Add one member to a string set, creating the set on first use
    fn insert_into_set(&mut self, key: &str, member: &str) {
        let mut set = self.get_set(key);
        if set.insert(member.to_string()) {
            self.set(key, Value::Set(set));
        }
    }
}

/// Volatile store, used headless and in tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flushes so far
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Store backed by one pretty-printed JSON object on disk.
/// Flushes write a sibling temp file and rename it over the original.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
    dirty: bool,
}

impl JsonFileStore {
    /// Default location under the user's config directory
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::STORE_FILENAME);
        path
    }

    /// Open the store, starting empty when the file does not exist yet.
    /// A corrupt file is preserved and replaced by an empty store in memory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    let backup = path.with_extension("json.corrupt");
                    warn!(path = %path.display(), error = %e, backup = %backup.display(), "Store file is corrupt, starting empty");
                    fs::rename(&path, &backup).context(format!(
                        "Failed to move corrupt store aside to {}",
                        backup.display()
                    ))?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).context(format!("Failed to read store file {}", path.display()));
            }
        };

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create store directory: {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(&self.values).context("Failed to serialize store to JSON")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .context(format!("Failed to write store file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .context(format!("Failed to replace store file {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}
