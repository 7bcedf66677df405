//! Annolog Artifact Storage
//!
//! Content-addressed media storage and serialization destinations.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte Blake3 digest identifying stored media
//! - [`MediaPath`]: Forward-slash relative path inside a run or artifact
//! - [`MediaStore`]: Durable storage backend ([`MemoryStore`], [`DirStore`])
//! - [`ScratchDir`]: One-shot persistence for derived pixels
//! - [`Destination`]: Where a record serializes to ([`RunStep`] or [`Artifact`])
//!
//! # Example
//!
//! ```rust,ignore
//! use annolog_artifact::{Artifact, Destination, MemoryStore};
//! use std::sync::Arc;
//!
//! let artifact = Artifact::new("dataset", Arc::new(MemoryStore::new()));
//! let entry = artifact.add_media(&["images"], &png_bytes, "png")?;
//! println!("stored {} ({})", entry.path, entry.digest.short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod destination;
mod hash;
mod path;
mod scratch;
mod store;

pub use artifact::Artifact;
pub use destination::{
    Destination, DestinationError, DestinationKind, Run, RunStep, DEFAULT_MEDIA_DIR,
};
pub use hash::{ContentHash, HashError};
pub use path::{MediaPath, PathError};
pub use scratch::{MediaFile, ScratchDir};
pub use store::{DirStore, MediaStore, MemoryStore, StoreError, StoredEntry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
