// Actor - request-scoped identity handed to services by the auth middleware

use serde::{Deserialize, Serialize};

/// Role of the requesting identity, consumed by the privacy decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anonymous,
    Member,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<i64>,
    pub role: Role,
}

impl Actor {
    pub fn anonymous() -> Self {
        Actor { id: None, role: Role::Anonymous }
    }

    pub fn member(user_id: i64) -> Self {
        Actor { id: Some(user_id), role: Role::Member }
    }

    pub fn admin(user_id: i64) -> Self {
        Actor { id: Some(user_id), role: Role::Admin }
    }

    /// Build an actor from the flags an auth provider hands out.
    pub fn from_claims(user_id: i64, is_staff: bool) -> Self {
        if is_staff {
            Actor::admin(user_id)
        } else {
            Actor::member(user_id)
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.role != Role::Anonymous && self.id.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Admin && self.id.is_some()
    }

    /// True when the actor is authenticated and `author_id` is its own id.
    pub fn is_author_of(&self, author_id: i64) -> bool {
        self.is_authenticated() && self.id == Some(author_id)
    }
}

impl Default for Actor {
    fn default() -> Self {
        Actor::anonymous()
    }
}
