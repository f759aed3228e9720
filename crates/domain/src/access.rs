//! Caller identity and the staff role table.

use std::collections::HashSet;

use common::UserId;
use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new<I, R>(user_id: UserId, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            user_id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// An actor with no roles.
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            roles: Vec::new(),
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_id)
    }
}

/// Read-only table of role names that carry staff privilege.
///
/// Role names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    staff_roles: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, R>(staff_roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        Self {
            staff_roles: staff_roles
                .into_iter()
                .map(|role| role.as_ref().trim().to_uppercase())
                .filter(|role| !role.is_empty())
                .collect(),
        }
    }

    /// Returns true if any of the actor's roles is a staff role.
    pub fn is_staff(&self, actor: &Actor) -> bool {
        actor
            .roles
            .iter()
            .any(|role| self.staff_roles.contains(&role.trim().to_uppercase()))
    }

    /// Owner or staff.
    pub fn may_manage(&self, actor: &Actor, owner: UserId) -> bool {
        actor.user_id == owner || self.is_staff(actor)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(["ADMIN", "EMPLOYEE"])
    }
}
