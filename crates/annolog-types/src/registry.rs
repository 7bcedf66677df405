//! Explicit registry of loggable type kinds
//!
//! Kinds are registered once during application start-up by passing a
//! [`TypeEntry`] table. Nothing registers itself implicitly.

use crate::descriptor::{ImageFileType, IMAGE_FILE_KIND};
use crate::logged::{LoggedType, TypeError, INVALID_KIND, UNKNOWN_KIND};
use serde_json::Value;
use std::any::Any;

/// Builds a type from its serialized params
pub type ConstructFn = fn(&Value) -> Result<LoggedType, TypeError>;

/// Describes a runtime value, or returns `None` if it is not of this kind
pub type InferFn = fn(&dyn Any) -> Option<LoggedType>;

/// One registered kind
#[derive(Debug, Clone, Copy)]
pub struct TypeEntry {
    /// Kind name (`wb_type` in serialized form)
    pub name: &'static str,
    /// Older names accepted when reading
    pub legacy_names: &'static [&'static str],
    /// Constructor from params
    pub construct: ConstructFn,
    /// Inference from a runtime value
    pub infer: InferFn,
}

impl TypeEntry {
    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.legacy_names.contains(&name)
    }
}

/// Constructor for [`IMAGE_FILE_KIND`] params
///
/// # Errors
/// Returns [`TypeError::InvalidParams`] if `params` is not a descriptor
pub fn construct_image_file(params: &Value) -> Result<LoggedType, TypeError> {
    if params.is_null() {
        return Ok(LoggedType::ImageFile(ImageFileType::new()));
    }
    serde_json::from_value::<ImageFileType>(params.clone())
        .map(LoggedType::ImageFile)
        .map_err(|e| TypeError::InvalidParams {
            kind: IMAGE_FILE_KIND.to_string(),
            reason: e.to_string(),
        })
}

/// Registry of known kinds, in registration order
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
}

impl TypeRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a table of entries
    ///
    /// # Errors
    /// Returns [`TypeError::DuplicateKind`] if two entries share a name
    pub fn with_entries(entries: impl IntoIterator<Item = TypeEntry>) -> Result<Self, TypeError> {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Register one kind
    ///
    /// # Errors
    /// Returns [`TypeError::DuplicateKind`] if the name (or a legacy name) is taken
    pub fn register(&mut self, entry: TypeEntry) -> Result<(), TypeError> {
        let names = std::iter::once(entry.name).chain(entry.legacy_names.iter().copied());
        for name in names {
            if name == UNKNOWN_KIND || name == INVALID_KIND || self.lookup(name).is_some() {
                return Err(TypeError::DuplicateKind(name.to_string()));
            }
        }
        tracing::debug!("registered type kind {}", entry.name);
        self.entries.push(entry);
        Ok(())
    }

    /// Check if a kind (or legacy name) is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registered kind names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// Number of registered kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.iter().find(|e| e.answers_to(name))
    }

    /// Read a type from `{"wb_type": <name>, "params": {...}}`
    ///
    /// # Errors
    /// Returns error if the kind is unknown or its params are malformed
    pub fn from_json(&self, value: &Value) -> Result<LoggedType, TypeError> {
        let name = value
            .get("wb_type")
            .and_then(Value::as_str)
            .ok_or_else(|| TypeError::InvalidParams {
                kind: "<missing>".to_string(),
                reason: "expected an object with a string \"wb_type\"".to_string(),
            })?;
        match name {
            UNKNOWN_KIND => Ok(LoggedType::Unknown),
            INVALID_KIND => Ok(LoggedType::Invalid),
            _ => {
                let entry = self
                    .lookup(name)
                    .ok_or_else(|| TypeError::UnknownKind(name.to_string()))?;
                (entry.construct)(value.get("params").unwrap_or(&Value::Null))
            }
        }
    }

    /// Describe a runtime value using the first kind that recognizes it
    ///
    /// # Errors
    /// Returns [`TypeError::NotInferable`] if no kind recognizes the value
    pub fn infer<T: Any>(&self, value: &T) -> Result<LoggedType, TypeError> {
        self.infer_dyn(value)
            .ok_or_else(|| TypeError::NotInferable(std::any::type_name::<T>().to_string()))
    }

    /// Type-erased form of [`infer`](Self::infer)
    #[must_use]
    pub fn infer_dyn(&self, value: &dyn Any) -> Option<LoggedType> {
        self.entries.iter().find_map(|e| (e.infer)(value))
    }
}
