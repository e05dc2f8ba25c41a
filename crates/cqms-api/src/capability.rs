use std::fmt;

use cqms_types::models::{Role, User};

use crate::error::{ApiError, ApiResult};

/// Everything a role may or may not do. All Client/Support branching goes
/// through [`allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// See queries owned by other users.
    ViewAll,
    /// Open the add form and submit new queries.
    CreateQuery,
    /// Select a query and submit the detail form.
    EditQuery,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ViewAll => "view other users' queries",
            Self::CreateQuery => "create queries",
            Self::EditQuery => "edit queries",
        })
    }
}

pub fn allows(role: Role, capability: Capability) -> bool {
    match (role, capability) {
        (Role::Client, Capability::CreateQuery) => true,
        (Role::Support, Capability::ViewAll | Capability::EditQuery) => true,
        _ => false,
    }
}

pub fn require(role: Role, capability: Capability) -> ApiResult<()> {
    if allows(role, capability) {
        Ok(())
    } else {
        Err(ApiError::Forbidden { role, capability })
    }
}

/// Owner filter for listings: `None` when the user may see every query.
pub fn visible_owner(user: &User) -> Option<i64> {
    if allows(user.role, Capability::ViewAll) {
        None
    } else {
        Some(user.id)
    }
}

pub fn can_view(user: &User, owner_user_id: i64) -> bool {
    visible_owner(user).is_none_or(|owner| owner == owner_user_id)
}
