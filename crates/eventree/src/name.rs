use crate::error::EmitterError;
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::Arc;

/// Name of the root emitter. `""` resolves to the same node.
pub const ROOT_NAME: &str = "root";

pub(crate) const SEPARATOR: char = '.';

/// A validated, non-empty event name.
///
/// Cloning is cheap; the text is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventName(Arc<str>);

impl EventName {
    /// Validates `name`.
    ///
    /// # Errors
    /// Returns [`EmitterError::EmptyName`] for `""`.
    pub fn new(name: impl AsRef<str>) -> Result<Self, EmitterError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(EmitterError::EmptyName { context: None });
        }
        Ok(Self(Arc::from(name)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for EventName {
    type Error = EmitterError;

    fn try_from(value: &str) -> Result<Self, EmitterError> {
        Self::new(value)
    }
}

impl TryFrom<String> for EventName {
    type Error = EmitterError;

    fn try_from(value: String) -> Result<Self, EmitterError> {
        Self::new(value)
    }
}

impl AsRef<str> for EventName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, dot-separated emitter name.
///
/// `""` and [`ROOT_NAME`] both normalise to the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmitterName(Arc<str>);

impl EmitterName {
    /// Validates and normalises `name`.
    ///
    /// # Errors
    /// Returns [`EmitterError::MalformedName`] when any dot-separated segment is empty.
    pub fn new(name: impl AsRef<str>) -> Result<Self, EmitterError> {
        let name = name.as_ref();
        if name.is_empty() || name == ROOT_NAME {
            return Ok(Self::root());
        }
        if name.split(SEPARATOR).any(str::is_empty) {
            return Err(EmitterError::MalformedName {
                name: Cow::Owned(name.to_owned()),
                context: None,
            });
        }
        Ok(Self(Arc::from(name)))
    }

    #[must_use]
    pub fn root() -> Self {
        Self(Arc::from(ROOT_NAME))
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        &*self.0 == ROOT_NAME
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dotted prefixes from the most to the least specific, excluding the name itself.
    ///
    /// `"a.b.c"` yields `"a.b"`, then `"a"`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        let name: &str = &self.0;
        std::iter::successors(name.rfind(SEPARATOR), move |&end| name[..end].rfind(SEPARATOR))
            .map(move |end| &name[..end])
    }

    /// Whether `self` is `other` or lies beneath it in the dotted hierarchy.
    #[must_use]
    pub fn is_within(&self, other: &str) -> bool {
        self.0
            .strip_prefix(other)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(SEPARATOR))
    }
}

impl AsRef<str> for EmitterName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EmitterName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmitterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
