//! Evolving schema of a logged column
//!
//! A column keeps an append-only log of the type observed at each step and a
//! memoized running join, so the aggregate is always available without
//! replaying raw annotation data.

use crate::descriptor::ClassConflict;
use crate::logged::{LoggedType, TypeError};

/// Type observed at one logged step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepType {
    /// Logged step
    pub step: u64,
    /// Type of the value logged at that step
    pub ty: LoggedType,
}

/// Schema of one column across the life of a run
///
/// # Invariants
/// - `current()` equals the left fold of `assign` over `history()`
/// - Rejected observations are never appended
///
/// Not internally synchronized: callers sharing one schema across logging
/// calls must serialize access.
#[derive(Debug, Clone, Default)]
pub struct ColumnSchema {
    key: String,
    history: Vec<StepType>,
    current: LoggedType,
    conflicts: Vec<(u64, ClassConflict)>,
}

impl ColumnSchema {
    /// Create a schema with nothing observed
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Column key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record the type logged at `step` and return the updated aggregate
    ///
    /// # Errors
    /// Returns [`TypeError::IncompatibleType`] if `ty` cannot join the
    /// current aggregate; the schema is left unchanged
    pub fn observe(&mut self, step: u64, ty: LoggedType) -> Result<&LoggedType, TypeError> {
        let (joined, conflicts) = self.current.assign_reporting(&ty);
        if joined.is_invalid() {
            return Err(TypeError::IncompatibleType {
                expected: self.current.name().to_string(),
                actual: ty.name().to_string(),
            });
        }
        for conflict in conflicts {
            tracing::warn!(
                "column {} step {}: class name conflict: {}",
                self.key,
                step,
                conflict
            );
            self.conflicts.push((step, conflict));
        }
        self.history.push(StepType { step, ty });
        self.current = joined;
        Ok(&self.current)
    }

    /// Memoized aggregate type
    #[inline]
    #[must_use]
    pub fn current(&self) -> &LoggedType {
        &self.current
    }

    /// Per-step log, in observation order
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[StepType] {
        &self.history
    }

    /// Class-name conflicts resolved so far, with the step that raised them
    #[inline]
    #[must_use]
    pub fn conflicts(&self) -> &[(u64, ClassConflict)] {
        &self.conflicts
    }

    /// Number of observations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Check if nothing was observed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Recompute the aggregate from the log
    #[must_use]
    pub fn refold(&self) -> LoggedType {
        fold(self.history.iter().map(|s| &s.ty))
    }
}

/// Join a sequence of types, left to right
#[must_use]
pub fn fold<'a>(types: impl IntoIterator<Item = &'a LoggedType>) -> LoggedType {
    types
        .into_iter()
        .fold(LoggedType::Unknown, |acc, ty| acc.assign_reporting(ty).0)
}
