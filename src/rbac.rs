//! Role-based authorization
//!
//! A role hierarchy maps every *required* role to the set of *held* roles
//! that satisfy it. The table is validated when it is built: each entry must
//! contain its own role, and `ADMIN` must satisfy every entry.

use crate::config::RoleConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Platform roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Moderator,
    Instructor,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moderator => "MODERATOR",
            Role::Instructor => "INSTRUCTOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Parse a role name, ignoring ASCII case
    pub fn try_parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Some(Role::User),
            "MODERATOR" => Some(Role::Moderator),
            "INSTRUCTOR" => Some(Role::Instructor),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn all() -> &'static [Role] {
        &[Role::User, Role::Moderator, Role::Instructor, Role::Admin]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Required role → roles that satisfy it
#[derive(Debug, Clone)]
pub struct RoleHierarchy {
    table: HashMap<Role, HashSet<Role>>,
}

impl RoleHierarchy {
    /// Build from an explicit table, enforcing reflexivity and admin supremacy
    pub fn new(table: HashMap<Role, HashSet<Role>>) -> Result<Self, ConfigError> {
        for required in Role::all() {
            let Some(satisfying) = table.get(required) else {
                return Err(ConfigError::RoleHierarchy(format!(
                    "no entry for required role {}",
                    required
                )));
            };
            if !satisfying.contains(required) {
                return Err(ConfigError::RoleHierarchy(format!(
                    "{} does not satisfy itself",
                    required
                )));
            }
            if !satisfying.contains(&Role::Admin) {
                return Err(ConfigError::RoleHierarchy(format!(
                    "ADMIN does not satisfy {}",
                    required
                )));
            }
        }

        Ok(Self { table })
    }

    /// Build from the string-keyed configuration table
    pub fn from_config(config: &RoleConfig) -> Result<Self, ConfigError> {
        let mut table = HashMap::new();

        for (required, holders) in &config.hierarchy {
            let required = Role::try_parse(required).ok_or_else(|| {
                ConfigError::RoleHierarchy(format!("unknown role '{}'", required))
            })?;

            let mut satisfying = HashSet::with_capacity(holders.len());
            for holder in holders {
                let role = Role::try_parse(holder).ok_or_else(|| {
                    ConfigError::RoleHierarchy(format!(
                        "unknown role '{}' in entry for {}",
                        holder, required
                    ))
                })?;
                satisfying.insert(role);
            }

            table.insert(required, satisfying);
        }

        Self::new(table)
    }

    /// Does `held` satisfy `required`? An absent role never does.
    pub fn authorize(&self, held: Option<Role>, required: Role) -> bool {
        let Some(held) = held else {
            return false;
        };

        self.table
            .get(&required)
            .is_some_and(|satisfying| satisfying.contains(&held))
    }

    /// Roles that satisfy `required`
    pub fn satisfying(&self, required: Role) -> impl Iterator<Item = Role> + '_ {
        self.table.get(&required).into_iter().flatten().copied()
    }
}

impl Default for RoleHierarchy {
    /// admin ⊇ moderator ⊇ user and admin ⊇ instructor ⊇ user
    fn default() -> Self {
        let table = HashMap::from([
            (
                Role::User,
                HashSet::from([Role::User, Role::Moderator, Role::Instructor, Role::Admin]),
            ),
            (Role::Moderator, HashSet::from([Role::Moderator, Role::Admin])),
            (
                Role::Instructor,
                HashSet::from([Role::Instructor, Role::Admin]),
            ),
            (Role::Admin, HashSet::from([Role::Admin])),
        ]);

        Self { table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in Role::all() {
            assert_eq!(Role::try_parse(role.as_str()), Some(*role));
        }
        assert_eq!(Role::try_parse("admin"), Some(Role::Admin));
        assert_eq!(Role::try_parse("root"), None);
    }

    #[test]
    fn test_default_hierarchy_is_valid() {
        let default = RoleHierarchy::default();
        assert!(RoleHierarchy::new(default.table.clone()).is_ok());
    }

    #[test]
    fn test_absent_role_never_authorized() {
        let hierarchy = RoleHierarchy::default();
        for required in Role::all() {
            assert!(!hierarchy.authorize(None, *required));
        }
    }

    #[test]
    fn test_non_reflexive_table_rejected() {
        let mut table = RoleHierarchy::default().table;
        table.insert(Role::Moderator, HashSet::from([Role::Admin]));

        let err = RoleHierarchy::new(table).unwrap_err();
        assert!(err.to_string().contains("MODERATOR does not satisfy itself"));
    }

    #[test]
    fn test_table_without_admin_rejected() {
        let mut table = RoleHierarchy::default().table;
        table.insert(Role::Instructor, HashSet::from([Role::Instructor]));

        assert!(matches!(
            RoleHierarchy::new(table),
            Err(ConfigError::RoleHierarchy(_))
        ));
    }

    #[test]
    fn test_from_config_unknown_role() {
        let mut config = RoleConfig::default();
        config
            .hierarchy
            .insert("GUEST".to_string(), vec!["ADMIN".to_string()]);

        assert!(RoleHierarchy::from_config(&config).is_err());
    }
}
