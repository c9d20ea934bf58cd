//! Staff roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role assigned to a staff profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Practitioner,
    Nurse,
    LabTech,
    Pharmacist,
    FrontDesk,
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Practitioner,
        Role::Nurse,
        Role::LabTech,
        Role::Pharmacist,
        Role::FrontDesk,
        Role::Admin,
    ];

    /// Stable code used in configuration files and audit records
    pub fn code(&self) -> &'static str {
        match self {
            Role::Practitioner => "PRACTITIONER",
            Role::Nurse => "NURSE",
            Role::LabTech => "LAB_TECH",
            Role::Pharmacist => "PHARMACIST",
            Role::FrontDesk => "FRONT_DESK",
            Role::Admin => "ADMIN",
        }
    }

    /// Human-readable label for dashboards and profile pages
    pub fn label(&self) -> &'static str {
        match self {
            Role::Practitioner => "Practitioner",
            Role::Nurse => "Nurse",
            Role::LabTech => "Laboratory technician",
            Role::Pharmacist => "Pharmacist",
            Role::FrontDesk => "Front desk",
            Role::Admin => "Administrator",
        }
    }

    /// Administrators bypass the permission tables entirely
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown role code
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Role::ALL
            .into_iter()
            .find(|role| role.code() == normalized)
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}
