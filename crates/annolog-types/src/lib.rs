//! Annolog Types
//!
//! Structural type descriptors for logged columns and the rules for joining
//! them as a column evolves.
//!
//! # Core Concepts
//!
//! - [`ImageFileType`]: Annotation shape of image records; a monoid under merge
//! - [`LoggedType`]: Closed set of column types with `Unknown` as identity
//! - [`TypeRegistry`]: Explicit table of kinds for (de)serialization and inference
//! - [`ColumnSchema`]: Append-only per-step log with a memoized running join
//!
//! # Example
//!
//! ```rust,ignore
//! use annolog_types::{ColumnSchema, ImageFileType};
//!
//! let mut column = ColumnSchema::new("predictions");
//! column.observe(0, ImageFileType::new().with_box_layer("det", ["1"]).into())?;
//! column.observe(1, ImageFileType::new().with_box_layer("det", ["2"]).into())?;
//! println!("{}", column.current().to_json());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod column;
mod descriptor;
mod logged;
mod registry;

pub use column::{fold, ColumnSchema, StepType};
pub use descriptor::{ClassConflict, ImageFileType, IMAGE_FILE_KIND};
pub use logged::{LoggedType, TypeError, INVALID_KIND, UNKNOWN_KIND};
pub use registry::{construct_image_file, ConstructFn, InferFn, TypeEntry, TypeRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
