//! Correlation keys.
//!
//! # Responsibilities
//! - Identify a registered listener by owner id (sink or source id)
//! - Optionally refine the owner id, e.g. by HTTP status code
//!
//! # Design Decisions
//! - Keys are immutable values; equality and hashing are structural
//! - Owner ids are matched as exact strings

use std::fmt;

/// Address of a registered response listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    owner_id: String,
    refinement: Option<String>,
}

impl CorrelationKey {
    /// Key matching any response for `owner_id`.
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            refinement: None,
        }
    }

    /// Key matching only responses carrying `refinement`.
    pub fn refined(owner_id: impl Into<String>, refinement: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            refinement: Some(refinement.into()),
        }
    }

    /// Key for an owner id and an optional refinement.
    pub fn with_refinement(owner_id: impl Into<String>, refinement: Option<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            refinement,
        }
    }

    /// Key refined by an HTTP status code.
    pub fn for_status(owner_id: impl Into<String>, status: u16) -> Self {
        Self::refined(owner_id, status.to_string())
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn refinement(&self) -> Option<&str> {
        self.refinement.as_deref()
    }

    pub fn is_refined(&self) -> bool {
        self.refinement.is_some()
    }

    /// The same key with the refinement removed.
    pub fn unrefined(&self) -> Self {
        Self::new(self.owner_id.clone())
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.refinement {
            Some(refinement) => write!(f, "{}[{}]", self.owner_id, refinement),
            None => write!(f, "{}", self.owner_id),
        }
    }
}
