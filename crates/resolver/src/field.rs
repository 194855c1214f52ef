use std::collections::BTreeMap;
use std::error::Error as _;

use crate::error::{ResolveError, TaskError};

/// Identifies the record field a task writes. Static so assemblers can
/// declare their keys as constants next to the record they populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl AsRef<str> for FieldKey {
    fn as_ref(&self) -> &str {
        self.0
    }
}

/// Per-field errors reported by a collect-all run.
///
/// Keys are exactly the fields whose task failed. Those fields were left at
/// whatever value the record held before the run.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: BTreeMap<FieldKey, TaskError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: FieldKey, error: TaskError) {
        self.errors.insert(key, error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, key: FieldKey) -> Option<&TaskError> {
        self.errors.get(&key)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.errors.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.errors.keys().copied()
    }

    /// Treat any reported field error as fatal for the whole record.
    ///
    /// # Errors
    /// Returns `ResolveError::Partial` carrying the map when it is non-empty.
    pub fn into_result(self) -> Result<(), ResolveError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::Partial(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} field(s) failed", self.errors.len())?;
        for (key, error) in &self.errors {
            write!(f, "; {key}: {error}")?;
            let mut source = error.source();
            while let Some(cause) = source {
                write!(f, ": {cause}")?;
                source = cause.source();
            }
        }
        Ok(())
    }
}
