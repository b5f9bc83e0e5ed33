//! Position model and timeline ordering.
//!
//! # Responsibility
//! - Define the immutable location record attached to an item.
//! - Own the ordering rule shared by every backend.
//!
//! # Invariants
//! - Positions are never mutated after creation; amendment is delete + create.
//! - Timeline order is `recorded_at DESC, created_at DESC`.

use crate::model::coords::{coords_equal, validate_coordinates, ValidationError};
use crate::model::item::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Stable identifier of a position record.
pub type PositionId = Uuid;

/// One timestamped location observation for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub item_id: ItemId,
    pub latitude: f64,
    pub longitude: f64,
    /// Free-form place name, e.g. "home".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// When the observation was made. Caller-supplied.
    pub recorded_at: DateTime<Utc>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Position {
    /// Creates a position observed now.
    pub fn new(item_id: ItemId, latitude: f64, longitude: f64, label: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            item_id,
            latitude,
            longitude,
            label,
            recorded_at: now,
            created_at: now,
        }
    }

    /// Creates a position observed at `recorded_at` (backfill, imports).
    pub fn with_recorded_at(
        item_id: ItemId,
        latitude: f64,
        longitude: f64,
        label: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            latitude,
            longitude,
            label,
            recorded_at,
            created_at: Utc::now(),
        }
    }

    /// Validates identity and coordinates before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() || self.item_id.is_nil() {
            return Err(ValidationError::NilId);
        }
        validate_coordinates(self.latitude, self.longitude)
    }

    /// Returns whether `other` is at the same location under the dedup rule.
    pub fn same_location(&self, other: &Position) -> bool {
        coords_equal(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Orders positions newest first.
pub fn timeline_order(a: &Position, b: &Position) -> Ordering {
    b.recorded_at
        .cmp(&a.recorded_at)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Sorts positions into timeline order in place.
pub fn sort_timeline(positions: &mut [Position]) {
    positions.sort_by(timeline_order);
}
