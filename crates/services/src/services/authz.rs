//! Who may drive a running timer.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Stable staff identifier (not a display name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    /// Returns `None` for a blank identifier.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Staff,
    Operator,
}

/// A staff member issuing a timer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub staff_id: StaffId,
    pub role: StaffRole,
}

impl Actor {
    pub fn staff(staff_id: StaffId) -> Self {
        Self {
            staff_id,
            role: StaffRole::Staff,
        }
    }

    pub fn operator(staff_id: StaffId) -> Self {
        Self {
            staff_id,
            role: StaffRole::Operator,
        }
    }

    /// Operators may always control a session. Everyone else only a session
    /// they hold, or one that nobody holds.
    pub fn may_control(&self, holder: Option<&str>) -> bool {
        match (self.role, holder) {
            (StaffRole::Operator, _) => true,
            (StaffRole::Staff, None) => true,
            (StaffRole::Staff, Some(holder)) => holder == self.staff_id.as_str(),
        }
    }
}

/// Maps staff ids to roles.
#[derive(Debug, Clone, Default)]
pub struct StaffRoster {
    operators: HashSet<StaffId>,
}

impl StaffRoster {
    pub fn new(operators: impl IntoIterator<Item = StaffId>) -> Self {
        Self {
            operators: operators.into_iter().collect(),
        }
    }

    pub fn actor(&self, staff_id: StaffId) -> Actor {
        if self.operators.contains(&staff_id) {
            Actor::operator(staff_id)
        } else {
            Actor::staff(staff_id)
        }
    }
}
