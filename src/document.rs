use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::{Map, Value as JsonValue};

use crate::{
    cast::{parse_timestamp, CastTable},
    descriptor::CollectionDescriptor,
    error::{Result, TombstoneError},
};

/// A record of a collection, kept as an attribute map.
///
/// The document remembers the attributes it was loaded (or last saved) with,
/// so that only changed attributes are written back.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    descriptor: Arc<CollectionDescriptor>,
    attributes: Map<String, JsonValue>,
    original: Map<String, JsonValue>,
    casts: CastTable,
    exists: bool,
}

impl Document {
    pub fn new(descriptor: Arc<CollectionDescriptor>) -> Self {
        let casts = descriptor.casts().clone();
        Self {
            descriptor,
            attributes: Map::new(),
            original: Map::new(),
            casts,
            exists: false,
        }
    }

    /// A blank, not persisted document sharing descriptor and casts with
    /// `self`.
    pub fn new_instance(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            attributes: Map::new(),
            original: Map::new(),
            casts: self.casts.clone(),
            exists: false,
        }
    }

    /// Creates a document for a stored row.
    pub fn new_from_row(&self, row: JsonValue) -> Self {
        let mut document = self.new_instance();
        document.exists = true;
        if let JsonValue::Object(fields) = row {
            document.fill(fields);
        }
        document.sync_original();
        document
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        self.descriptor.as_ref()
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<CollectionDescriptor> {
        self.descriptor.clone()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_timestamp(&self, key: &str) -> Option<NaiveDateTime> {
        self.get_str(key).and_then(parse_timestamp)
    }

    /// Sets an attribute, coerced by the cast table.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        let key = key.into();
        let value = self.casts.cast(&key, value.into());
        self.attributes.insert(key, value);
    }

    pub fn fill(&mut self, attributes: Map<String, JsonValue>) {
        for (key, value) in attributes {
            self.set(key, value);
        }
    }

    pub fn attributes(&self) -> &Map<String, JsonValue> {
        &self.attributes
    }

    pub fn original(&self, key: &str) -> Option<&JsonValue> {
        self.original.get(key)
    }

    pub fn casts(&self) -> &CastTable {
        &self.casts
    }

    pub fn casts_mut(&mut self) -> &mut CastTable {
        &mut self.casts
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .keys()
            .any(|key| self.is_dirty_attribute(key))
    }

    pub fn is_dirty_attribute(&self, key: &str) -> bool {
        self.attributes.get(key) != self.original.get(key)
    }

    /// Attributes changed since the last sync.
    pub fn dirty(&self) -> Map<String, JsonValue> {
        self.attributes
            .iter()
            .filter(|(key, _)| self.is_dirty_attribute(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    pub fn sync_original_attributes<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            match self.attributes.get(key) {
                Some(value) => {
                    self.original.insert(key.to_string(), value.clone());
                }
                None => {
                    self.original.remove(key);
                }
            }
        }
    }

    /// Primary key columns and their values.
    pub fn key_values(&self) -> Result<Vec<(String, JsonValue)>> {
        self.descriptor
            .primary_key()
            .iter()
            .map(|column| match self.attributes.get(column) {
                Some(value) if !value.is_null() => Ok((column.clone(), value.clone())),
                _ => Err(TombstoneError::MissingPrimaryKey(column.clone())),
            })
            .collect()
    }

    pub fn db_value(&self, key: &str) -> sea_query::Value {
        self.casts
            .to_db_value(key, self.attributes.get(key).unwrap_or(&JsonValue::Null))
    }
}
