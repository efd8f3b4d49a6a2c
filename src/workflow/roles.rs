use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest level a role can carry.
pub const MAX_LEVEL: u8 = 10;

/// Lowest level that counts as the approval tier. Everything below is the author tier.
pub const APPROVAL_TIER_MIN_LEVEL: u8 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown role: '{0}'")]
pub struct UnknownRole(pub String);

/// Every role a user can hold. Declaration order follows the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Contributor,
    Writer,
    Author,
    SeniorWriter,
    Moderator,
    Editor,
    SeniorEditor,
    Publisher,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Contributor,
        Role::Writer,
        Role::Author,
        Role::SeniorWriter,
        Role::Moderator,
        Role::Editor,
        Role::SeniorEditor,
        Role::Publisher,
        Role::Admin,
        Role::SuperAdmin,
    ];

    pub const fn level(self) -> u8 {
        match self {
            Role::Contributor => 1,
            Role::Writer => 2,
            Role::Author => 3,
            Role::SeniorWriter => 4,
            Role::Moderator => 5,
            Role::Editor => 6,
            Role::SeniorEditor => 7,
            Role::Publisher => 8,
            Role::Admin => 9,
            Role::SuperAdmin => MAX_LEVEL,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Contributor => "contributor",
            Role::Writer => "writer",
            Role::Author => "author",
            Role::SeniorWriter => "senior_writer",
            Role::Moderator => "moderator",
            Role::Editor => "editor",
            Role::SeniorEditor => "senior_editor",
            Role::Publisher => "publisher",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub const fn is_author_tier(self) -> bool {
        self.level() < APPROVAL_TIER_MIN_LEVEL
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts any casing and either `-` or `_` as the word separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// The set of roles held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from raw role names as they arrive from storage or a session.
    /// Names that don't match a known role are dropped and logged.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            match name.as_ref().parse::<Role>() {
                Ok(role) => {
                    set.insert(role);
                }
                Err(e) => log::warn!("Ignoring role while building role set: {}", e),
            }
        }
        RoleSet(set)
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|r| r.as_str().to_string()).collect()
    }

    /// Maximum level across the held roles, 0 when none are held.
    pub fn level(&self) -> u8 {
        self.iter().map(Role::level).max().unwrap_or(0)
    }

    pub fn is_super_admin(&self) -> bool {
        self.contains(Role::SuperAdmin)
    }

    /// True when the set is non-empty and every role is in the author tier.
    pub fn is_author_tier_only(&self) -> bool {
        !self.is_empty() && self.iter().all(Role::is_author_tier)
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}
