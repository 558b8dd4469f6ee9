// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Name Value Object
//!
//! A stack name is used verbatim as a directory name under the stacks root,
//! as the terraform workspace name, and as the resource prefix of every
//! object in the rendered template. The invariants keep all three uses safe:
//! two distinct names always map to two distinct directories.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stack name validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StackNameError {
    #[error("Stack name is empty")]
    Empty,

    #[error("Stack name exceeds maximum length of 90 characters: {0}")]
    TooLong(usize),

    #[error("Invalid character in stack name: {0:?}")]
    InvalidCharacter(char),

    #[error("Stack name cannot start with a hyphen: {0}")]
    LeadingHyphen(String),
}

/// Validated stack identity
///
/// # Invariants
/// - Non-empty, at most 90 characters
/// - ASCII alphanumerics, `-` and `_` only (no path separators or dots)
/// - Does not start with `-` (would be parsed as a terraform flag)
///
/// # Examples
///
/// ```rust
/// use cim_infrastructure_terraform::domain::StackName;
///
/// let name = StackName::new("sandbox-42").unwrap();
/// assert_eq!(name.resource_key("eth0"), "sandbox-42-eth0");
///
/// assert!(StackName::new("../etc").is_err());
/// assert!(StackName::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StackName(String);

impl StackName {
    /// Maximum length, bounded by terraform workspace and cloud resource names
    pub const MAX_LENGTH: usize = 90;

    /// Create a new stack name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, StackNameError> {
        let name = name.into();

        if name.is_empty() {
            return Err(StackNameError::Empty);
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(StackNameError::TooLong(name.len()));
        }

        if let Some(ch) = name
            .chars()
            .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '-' && *ch != '_')
        {
            return Err(StackNameError::InvalidCharacter(ch));
        }

        if name.starts_with('-') {
            return Err(StackNameError::LeadingHyphen(name));
        }

        Ok(Self(name))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Composite resource address `{stack_name}-{logical_name}`
    pub fn resource_key(&self, logical_name: &str) -> String {
        format!("{}-{}", self.0, logical_name)
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StackName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StackName {
    type Error = StackNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StackName {
    type Error = StackNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StackName> for String {
    fn from(value: StackName) -> Self {
        value.0
    }
}
