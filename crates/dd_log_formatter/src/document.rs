//! Insertion-ordered JSON object that the formatter enriches before writing it out.

use serde_json::{Map, Value};

use crate::FormatterError;

/// An ordered mapping from string keys to JSON values.
///
/// Keys keep the order in which they were first inserted. Inserting a key that already exists is
/// an error, so no value is ever overwritten by accident.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputDocument {
    entries: Map<String, Value>,
}

impl OutputDocument {
    /// Parses a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::MalformedIntermediate`] if `json` is not valid JSON, and
    /// [`FormatterError::NotAnObject`] if it is valid JSON but not an object.
    pub fn parse(json: &[u8]) -> Result<Self, FormatterError> {
        let value: Value =
            serde_json::from_slice(json).map_err(FormatterError::MalformedIntermediate)?;
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            _ => Err(FormatterError::NotAnObject),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns `true` if the document holds `key`, even if its value is `null`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Appends a new entry at the end of the document.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::DuplicateKey`] if `key` is already present.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<(), FormatterError> {
        if self.entries.contains_key(key) {
            return Err(FormatterError::DuplicateKey(key.to_owned()));
        }
        self.entries.insert(key.to_owned(), value.into());
        Ok(())
    }

    /// Appends a new entry only if `value` is `Some`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::DuplicateKey`] if a value is given and `key` is already present.
    pub fn insert_if_some<V>(&mut self, key: &str, value: Option<V>) -> Result<(), FormatterError>
    where
        V: Into<Value>,
    {
        match value {
            Some(value) => self.insert(key, value),
            None => Ok(()),
        }
    }

    /// Moves the value stored under `old_key` to `new_key`, placing it at the end of the document.
    ///
    /// Does nothing if `old_key` is absent. Renaming a key to itself also moves it to the end.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::DuplicateKey`] if `new_key` is already present; the document is
    /// left untouched in that case.
    pub fn rename(&mut self, old_key: &str, new_key: &str) -> Result<(), FormatterError> {
        if !self.entries.contains_key(old_key) {
            return Ok(());
        }
        if old_key != new_key && self.entries.contains_key(new_key) {
            return Err(FormatterError::DuplicateKey(new_key.to_owned()));
        }
        if let Some(value) = self.entries.shift_remove(old_key) {
            self.entries.insert(new_key.to_owned(), value);
        }
        Ok(())
    }

    /// Iterates over the keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serializes the document into compact, single-line JSON.
    ///
    /// Entries whose value is `null` are left out, at every nesting level of objects. Elements of
    /// arrays are written as-is.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::Serialization`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, FormatterError> {
        let mut entries = self.entries.clone();
        drop_nulls(&mut entries);
        serde_json::to_string(&entries).map_err(FormatterError::Serialization)
    }
}

impl From<Map<String, Value>> for OutputDocument {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

/// Removes `null` entries from `map` and from every object nested inside it.
fn drop_nulls(map: &mut Map<String, Value>) {
    map.retain(|_key, value| !value.is_null());
    for value in map.values_mut() {
        drop_nested_nulls(value);
    }
}

fn drop_nested_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => drop_nulls(map),
        Value::Array(items) => items.iter_mut().for_each(drop_nested_nulls),
        _ => (),
    }
}
