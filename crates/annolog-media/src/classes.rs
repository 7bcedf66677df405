//! Class tables
//!
//! A [`ClassTable`] binds class ids to display names for one image. Ids
//! compare as strings, but numeric ids serialize back as JSON integers.

use crate::error::MediaError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Class identifier, compared as a string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(String);

impl ClassId {
    /// Create from any displayable id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id from a JSON string or integer
    ///
    /// # Errors
    /// Returns [`MediaError::InvalidArgument`] for any other JSON value
    pub fn from_value(value: &Value) -> Result<Self, MediaError> {
        match value {
            Value::String(s) => Ok(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Self(n.to_string())),
            other => Err(MediaError::InvalidArgument(format!(
                "class id must be an integer or string, got {other}"
            ))),
        }
    }

    fn to_value(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(n) if n.to_string() == self.0 => Value::from(n),
            _ => Value::String(self.0.clone()),
        }
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClassId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

macro_rules! class_id_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for ClassId {
            fn from(id: $t) -> Self {
                Self(id.to_string())
            }
        })*
    };
}

class_id_from_int!(u8, u32, u64, i32, i64);

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClassId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Ordered id → name table
///
/// Construction folds sources left to right with last-write-wins per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassTable {
    classes: IndexMap<ClassId, String>,
}

impl ClassTable {
    /// Create an empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `id`, replacing any previous name
    #[must_use]
    pub fn with_class(mut self, id: impl Into<ClassId>, name: impl Into<String>) -> Self {
        self.insert(id, name);
        self
    }

    /// Bind `name` to `id`, returning the replaced name
    pub fn insert(&mut self, id: impl Into<ClassId>, name: impl Into<String>) -> Option<String> {
        self.classes.insert(id.into(), name.into())
    }

    /// Name bound to `id`
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&str> {
        self.classes.get(&ClassId::new(id)).map(String::as_str)
    }

    /// Check if `id` is bound
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.classes.contains_key(&ClassId::new(id))
    }

    /// Ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &ClassId> {
        self.classes.keys()
    }

    /// `(id, name)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ClassId, &str)> {
        self.classes.iter().map(|(id, name)| (id, name.as_str()))
    }

    /// Number of classes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Fold `other` into a copy of this table; `other` wins on shared ids
    #[must_use]
    pub fn overlay(&self, other: &Self) -> Self {
        let mut classes = self.classes.clone();
        for (id, name) in &other.classes {
            classes.insert(id.clone(), name.clone());
        }
        Self { classes }
    }

    /// Read a user-supplied table
    ///
    /// Accepts either an object `{id: name}` or a list of `{"id", "name"}`
    /// entries.
    ///
    /// # Errors
    /// Returns [`MediaError::InvalidArgument`] for any other shape
    pub fn from_value(value: &Value) -> Result<Self, MediaError> {
        let mut table = Self::new();
        match value {
            Value::Object(map) => {
                for (id, name) in map {
                    table.insert(id.as_str(), name_of(name)?);
                }
            }
            Value::Array(entries) => {
                for entry in entries {
                    let id = entry.get("id").ok_or_else(|| {
                        MediaError::InvalidArgument(format!("class entry without id: {entry}"))
                    })?;
                    let name = entry.get("name").ok_or_else(|| {
                        MediaError::InvalidArgument(format!("class entry without name: {entry}"))
                    })?;
                    table.insert(ClassId::from_value(id)?, name_of(name)?);
                }
            }
            other => {
                return Err(MediaError::InvalidArgument(format!(
                    "classes must be a mapping or a list of {{id, name}}, got {other}"
                )))
            }
        }
        Ok(table)
    }

    /// Label map form `{id: name}` used inside box and mask layers
    #[must_use]
    pub fn to_label_map(&self) -> Value {
        self.classes
            .iter()
            .map(|(id, name)| (id.to_string(), Value::String(name.clone())))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }

    /// Serialized class file: `{"_type": "classes", "class_set": [...]}`
    #[must_use]
    pub fn to_class_file(&self) -> Value {
        let class_set: Vec<Value> = self
            .classes
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect();
        json!({ "_type": "classes", "class_set": class_set })
    }

    /// Read a class file written by [`to_class_file`](Self::to_class_file)
    ///
    /// # Errors
    /// Returns [`MediaError::InvalidArgument`] if the document is malformed
    pub fn from_class_file(value: &Value) -> Result<Self, MediaError> {
        if value.get("_type").and_then(Value::as_str) != Some("classes") {
            return Err(MediaError::InvalidArgument(
                "class file must have _type \"classes\"".to_string(),
            ));
        }
        let class_set = value.get("class_set").ok_or_else(|| {
            MediaError::InvalidArgument("class file without class_set".to_string())
        })?;
        match class_set {
            Value::Array(_) => Self::from_value(class_set),
            _ => Err(MediaError::InvalidArgument(
                "class_set must be a list".to_string(),
            )),
        }
    }
}

fn name_of(value: &Value) -> Result<String, MediaError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(MediaError::InvalidArgument(format!(
            "class name must be a string, got {other}"
        ))),
    }
}

impl<I: Into<ClassId>, S: Into<String>> FromIterator<(I, S)> for ClassTable {
    fn from_iter<T: IntoIterator<Item = (I, S)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (id, name) in iter {
            table.insert(id, name);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_ids_serialize_as_integers() {
        assert_eq!(serde_json::to_value(ClassId::from(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(ClassId::from("car")).unwrap(), json!("car"));
        let back: ClassId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(back.as_str(), "7");
        assert!(serde_json::from_value::<ClassId>(json!(1.5)).is_err());
    }

    #[test]
    fn overlay_is_last_write_wins() {
        let a = ClassTable::new().with_class(1, "cat").with_class(2, "dog");
        let b = ClassTable::new().with_class(2, "wolf");
        let merged = a.overlay(&b);
        assert_eq!(merged.get("1"), Some("cat"));
        assert_eq!(merged.get("2"), Some("wolf"));
        let ids: Vec<_> = merged.ids().map(ClassId::as_str).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn from_value_accepts_map_and_list() {
        let from_map = ClassTable::from_value(&json!({ "1": "cat", "2": "dog" })).unwrap();
        let from_list = ClassTable::from_value(&json!([
            { "id": 1, "name": "cat" },
            { "id": "2", "name": "dog" }
        ]))
        .unwrap();
        assert_eq!(from_map, from_list);
        assert!(matches!(
            ClassTable::from_value(&json!("cat")),
            Err(MediaError::InvalidArgument(_))
        ));
        assert!(ClassTable::from_value(&json!([{ "id": 1 }])).is_err());
    }

    #[test]
    fn class_file_shape() {
        let table = ClassTable::new().with_class(1, "cat").with_class("bg", "background");
        let file = table.to_class_file();
        assert_eq!(
            file,
            json!({
                "_type": "classes",
                "class_set": [
                    { "id": 1, "name": "cat" },
                    { "id": "bg", "name": "background" }
                ]
            })
        );
        assert_eq!(ClassTable::from_class_file(&file).unwrap(), table);
        assert!(ClassTable::from_class_file(&json!({ "class_set": [] })).is_err());
    }
}
