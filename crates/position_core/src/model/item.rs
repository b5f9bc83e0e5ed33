//! Tracked item model.
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - `name` is unique per store; uniqueness is enforced by repositories.

use crate::model::coords::{validate_name, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a tracked item.
pub type ItemId = Uuid;

/// Something whose location is tracked (a person, a car, a parcel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Creates a new item with a generated id and the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates an item with caller-provided identity.
    ///
    /// Used by import/sync paths where identity already exists externally.
    pub fn with_id(
        id: ItemId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let item = Self {
            id,
            name: name.into(),
            created_at,
        };
        item.validate()?;
        Ok(item)
    }

    /// Validates identity and name before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId);
        }
        validate_name(&self.name)
    }
}
