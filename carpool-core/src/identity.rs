use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "ADMIN";
pub const USER_ROLE: &str = "USER";

/// Who is making a call. Passed explicitly to every service operation.
pub trait IdentityContext: Send + Sync {
    /// `None` for unauthenticated callers
    fn current_user_id(&self) -> Option<Uuid>;

    fn has_role(&self, name: &str) -> bool;

    fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

/// Identity resolved by the presentation layer for one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    user_id: Option<Uuid>,
    roles: BTreeSet<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            roles: BTreeSet::from([USER_ROLE.to_string()]),
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::user(user_id).with_role(ADMIN_ROLE)
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }
}

impl IdentityContext for Caller {
    fn current_user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    fn has_role(&self, name: &str) -> bool {
        self.roles.contains(name)
    }
}

/// A registered user as the user directory exposes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub roles: BTreeSet<String>,
    pub enabled: bool,
    pub approved: bool,
}

impl UserProfile {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            display_name: display_name.into(),
            roles: BTreeSet::from([USER_ROLE.to_string()]),
            enabled: true,
            approved: true,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE)
    }

    /// Approved and enabled accounts are the only ones shown as contacts.
    pub fn is_active_member(&self) -> bool {
        self.enabled && self.approved
    }

    pub fn caller(&self) -> Caller {
        Caller {
            user_id: Some(self.id),
            roles: self.roles.clone(),
        }
    }
}
