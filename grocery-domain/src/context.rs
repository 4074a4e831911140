//! Session Context for List Operations
//!
//! Provides explicit context for every reservation operation:
//! - list_id: the "current list" the caller is looking at
//! - role: whether the caller may manage the product catalogue
//!
//! The context is always passed in by the caller and never read from
//! process-wide state.

use serde::{Deserialize, Serialize};

use crate::value_objects::ListId;

/// Role of the caller, supplied by whatever authenticates the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular list owner
    #[default]
    Client,
    /// May create products
    Admin,
}

/// Request-scoped context for reservation operations.
///
/// # Examples
///
/// ```
/// # use grocery_domain::{ListId, Session};
/// let session = Session::client(ListId(1));
/// assert!(!session.is_admin());
/// assert!(Session::admin(ListId(1)).is_admin());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    /// The list all list-scoped operations apply to.
    pub list_id: ListId,
    /// Role of the caller.
    pub role: Role,
}

impl Session {
    /// Create a session with explicit values.
    pub fn new(list_id: ListId, role: Role) -> Self {
        Self { list_id, role }
    }

    /// Session of a regular client.
    pub fn client(list_id: ListId) -> Self {
        Self::new(list_id, Role::Client)
    }

    /// Session of an administrator.
    pub fn admin(list_id: ListId) -> Self {
        Self::new(list_id, Role::Admin)
    }

    /// Build from the boolean admin flag supplied by the client layer.
    pub fn from_flag(list_id: ListId, is_admin: bool) -> Self {
        let role = if is_admin { Role::Admin } else { Role::Client };
        Self::new(list_id, role)
    }

    /// Check if the caller may manage the catalogue.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Same caller, different list.
    pub fn on_list(self, list_id: ListId) -> Self {
        Self { list_id, ..self }
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.role {
            Role::Admin => write!(f, "list={}/admin", self.list_id),
            Role::Client => write!(f, "list={}/client", self.list_id),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_session() {
        let session = Session::client(ListId(3));

        assert_eq!(session.list_id, ListId(3));
        assert_eq!(session.role, Role::Client);
        assert!(!session.is_admin());
    }

    #[test]
    fn test_from_flag() {
        assert!(Session::from_flag(ListId(1), true).is_admin());
        assert!(!Session::from_flag(ListId(1), false).is_admin());
    }

    #[test]
    fn test_on_list_keeps_role() {
        let session = Session::admin(ListId(1)).on_list(ListId(2));

        assert_eq!(session.list_id, ListId(2));
        assert!(session.is_admin());
    }

    #[test]
    fn test_display() {
        assert_eq!(Session::admin(ListId(1)).to_string(), "list=1/admin");
        assert_eq!(Session::client(ListId(2)).to_string(), "list=2/client");
    }

    #[test]
    fn test_default_role_is_client() {
        assert_eq!(Role::default(), Role::Client);
    }
}
