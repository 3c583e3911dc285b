use std::str::FromStr;

use rollcall_core::AppError;
use serde::{Deserialize, Serialize};

/// School roles. The set is closed; roles are never created at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System administrator.
    Admin,
    /// Principal or head of school.
    HeadOfSchool,
    /// Teaching staff.
    Teacher,
    /// Enrolled student.
    Student,
    /// Billing and finance staff.
    FinanceOfficer,
    /// Parent or guardian.
    Parent,
}

impl Role {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::HeadOfSchool => "head_of_school",
            Self::Teacher => "teacher",
            Self::Student => "student",
            Self::FinanceOfficer => "finance_officer",
            Self::Parent => "parent",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[
            Role::Admin,
            Role::HeadOfSchool,
            Role::Teacher,
            Role::Student,
            Role::FinanceOfficer,
            Role::Parent,
        ];

        ALL
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "head_of_school" => Ok(Self::HeadOfSchool),
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            "finance_officer" => Ok(Self::FinanceOfficer),
            "parent" => Ok(Self::Parent),
            _ => Err(AppError::Validation(format!("unknown role '{value}'"))),
        }
    }
}
