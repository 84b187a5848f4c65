//! Bus object paths.
//!
//! Valid object paths:
//! - Must begin with `/`
//! - Must not end with `/`, unless the path is the root path `/`
//! - Must not contain empty elements (`//`)
//! - Elements consist only of ASCII letters, digits, and `_`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// A validated bus object path such as `/org/openbmc/records/events/3`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Parse and validate an object path.
    pub fn new(path: impl Into<String>) -> TypeResult<Self> {
        let path = path.into();
        validate_object_path(&path)?;
        Ok(Self(path))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append one element to this path.
    ///
    /// ```
    /// use evlog_types::ObjectPath;
    ///
    /// let root = ObjectPath::new("/org/openbmc/records/events").unwrap();
    /// assert_eq!(root.child(7).unwrap().as_str(), "/org/openbmc/records/events/7");
    /// ```
    pub fn child(&self, element: impl fmt::Display) -> TypeResult<Self> {
        let joined = if self.0 == "/" {
            format!("/{element}")
        } else {
            format!("{}/{element}", self.0)
        };
        Self::new(joined)
    }

    /// The path one level up, or `None` for the root path.
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// The last element of the path, or `None` for the root path.
    pub fn last_element(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Returns `true` if `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ObjectPath) -> bool {
        if self == ancestor {
            return false;
        }
        if ancestor.0 == "/" {
            return true;
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate an object path, returning `Ok(())` if valid.
pub fn validate_object_path(path: &str) -> TypeResult<()> {
    let invalid = |reason: &str| TypeError::InvalidObjectPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must begin with '/'"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(invalid("must not end with '/'"));
    }
    for element in path[1..].split('/') {
        if element.is_empty() {
            return Err(invalid("elements must not be empty"));
        }
        if let Some(ch) = element
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(invalid(&format!("forbidden character {ch:?}")));
        }
    }
    Ok(())
}
