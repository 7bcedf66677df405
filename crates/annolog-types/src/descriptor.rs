//! Type descriptor for image columns
//!
//! [`ImageFileType`] summarizes the annotation shape of one or more images:
//! which box and mask layers exist, which class ids each layer uses, which
//! score keys boxes carry, and the id → name map seen so far.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// Kind name of the image descriptor
pub const IMAGE_FILE_KIND: &str = "image-file";

/// Structural summary of an image column's annotations
///
/// A monoid under [`merge`](Self::merge) with [`Default`] as identity.
/// Set- and map-valued fields union; `class_map` keeps the first non-null
/// name per id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageFileType {
    /// Box layer name → class ids used under that name
    #[serde(default)]
    pub box_layers: BTreeMap<String, BTreeSet<String>>,

    /// Score key names seen on any box
    #[serde(default)]
    pub box_score_keys: BTreeSet<String>,

    /// Mask layer name → class ids used under that name
    #[serde(default)]
    pub mask_layers: BTreeMap<String, BTreeSet<String>>,

    /// Class id → display name (null when only the id is known)
    #[serde(default)]
    pub class_map: BTreeMap<String, Option<String>>,
}

/// Disagreement between two non-null names for one class id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassConflict {
    /// Class id
    pub id: String,
    /// Name kept (left operand)
    pub kept: String,
    /// Name discarded (right operand)
    pub dropped: String,
}

impl std::fmt::Display for ClassConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "class {} named {:?} and {:?}; keeping {:?}",
            self.id, self.kept, self.dropped, self.kept
        )
    }
}

impl ImageFileType {
    /// Identity descriptor (no layers, keys or classes)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a box layer with the given class ids
    #[must_use]
    pub fn with_box_layer<I, S>(mut self, name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.box_layers
            .entry(name.into())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Add a mask layer with the given class ids
    #[must_use]
    pub fn with_mask_layer<I, S>(mut self, name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_layers
            .entry(name.into())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Add box score keys
    #[must_use]
    pub fn with_score_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.box_score_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Bind a class name to an id (keeps an existing non-null name)
    #[must_use]
    pub fn with_class(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        let slot = self.class_map.entry(id.into()).or_insert(None);
        if slot.is_none() {
            *slot = name;
        }
        self
    }

    /// Check if this is the identity descriptor
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.box_layers.is_empty()
            && self.box_score_keys.is_empty()
            && self.mask_layers.is_empty()
            && self.class_map.is_empty()
    }

    /// Join two descriptors, logging each class-name conflict as a warning
    ///
    /// When both sides name the same id differently the left (accumulator)
    /// name is kept, so this one case is order-sensitive.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let (merged, conflicts) = self.merge_reporting(other);
        for conflict in &conflicts {
            tracing::warn!("class name conflict while merging image types: {}", conflict);
        }
        merged
    }

    /// Join two descriptors, returning the class-name conflicts encountered
    #[must_use]
    pub fn merge_reporting(&self, other: &Self) -> (Self, Vec<ClassConflict>) {
        let mut conflicts = Vec::new();
        let mut class_map = self.class_map.clone();

        for (id, theirs) in &other.class_map {
            match class_map.entry(id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(theirs.clone());
                }
                Entry::Occupied(mut slot) => {
                    let ours = slot.get_mut();
                    if ours.is_none() {
                        *ours = theirs.clone();
                    } else if let (Some(kept), Some(dropped)) = (ours.as_ref(), theirs) {
                        if kept != dropped {
                            conflicts.push(ClassConflict {
                                id: id.clone(),
                                kept: kept.clone(),
                                dropped: dropped.clone(),
                            });
                        }
                    }
                }
            }
        }

        let merged = Self {
            box_layers: union_layers(&self.box_layers, &other.box_layers),
            box_score_keys: self
                .box_score_keys
                .union(&other.box_score_keys)
                .cloned()
                .collect(),
            mask_layers: union_layers(&self.mask_layers, &other.mask_layers),
            class_map,
        };
        (merged, conflicts)
    }
}

fn union_layers(
    left: &BTreeMap<String, BTreeSet<String>>,
    right: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut out = left.clone();
    for (name, ids) in right {
        out.entry(name.clone()).or_default().extend(ids.iter().cloned());
    }
    out
}
