/// User roles and the role hierarchy
///
/// ADMIN ⊇ MANAGER ⊇ USER: a higher role carries every capability of the
/// roles below it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::User => "USER",
        }
    }

    /// Every role whose capabilities this role includes, itself first
    pub fn expand(self) -> &'static [Role] {
        match self {
            Role::Admin => &[Role::Admin, Role::Manager, Role::User],
            Role::Manager => &[Role::Manager, Role::User],
            Role::User => &[Role::User],
        }
    }

    /// True when this role meets a requirement of `required`
    pub fn satisfies(self, required: Role) -> bool {
        self.expand().contains(&required)
    }

    /// True when this role meets any role in an allow-list
    pub fn satisfies_any(self, allowed: &[Role]) -> bool {
        self.expand().iter().any(|role| allowed.contains(role))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "USER" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
