use std::fmt;

use crate::errors::{CoreError, CoreResult};

/// Team membership role. `Owner` implies every `Admin` permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn parse(value: &str) -> CoreResult<Self> {
        match value.to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(CoreError::field(
                "role",
                format!("\"{}\" is not a valid choice.", value),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Role::Owner)
    }

    /// Admins and owners may manage members, invitations and settings.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown stored values are treated as plain members.
pub fn stored_role(value: &str) -> Role {
    Role::parse(value).unwrap_or(Role::Member)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!(Role::parse("Owner").unwrap(), Role::Owner);
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert!(Role::parse("superuser").is_err());
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Owner.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Member.is_admin());
        assert!(!Role::Admin.is_owner());
        assert_eq!(stored_role("legacy"), Role::Member);
    }
}
