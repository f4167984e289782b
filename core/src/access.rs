//! Role-based gating of service operations.
//!
//! Identity is established outside this crate. Every service call
//! receives an `Actor` and checks it against the permission matrix
//! before doing any work.

use crate::{
    error::{WsmsError, WsmsResult},
    types::UserId,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Reader,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewRecords,
    ManageCustomers,
    RecordReading,
    ManageGroups,
    CorrectReading,
    ChangeBillStatus,
    ManageTariff,
    ViewReports,
    ViewDashboard,
}

impl Action {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ViewRecords      => "view records",
            Self::ManageCustomers  => "manage customers",
            Self::RecordReading    => "record meter readings",
            Self::ManageGroups     => "manage customer groups",
            Self::CorrectReading   => "edit meter readings",
            Self::ChangeBillStatus => "change bill status",
            Self::ManageTariff     => "change the tariff",
            Self::ViewReports      => "view reports",
            Self::ViewDashboard    => "view the dashboard",
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin  => "Admin",
            Self::Reader => "Reader",
            Self::Viewer => "Viewer",
        }
    }

    pub fn permits(&self, action: Action) -> bool {
        use Action::*;
        match self {
            Role::Admin => true,
            Role::Reader => matches!(
                action,
                ViewRecords | ManageCustomers | RecordReading | ViewDashboard
            ),
            Role::Viewer => matches!(action, ViewRecords | ManageCustomers | RecordReading),
        }
    }
}

impl FromStr for Role {
    type Err = WsmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin"  => Ok(Self::Admin),
            "reader" => Ok(Self::Reader),
            "viewer" => Ok(Self::Viewer),
            other    => Err(WsmsError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role:    Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn authorize(&self, action: Action) -> WsmsResult<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            log::warn!(
                "user={} role={} denied: {}",
                self.user_id, self.role.as_str(), action.describe()
            );
            Err(WsmsError::Forbidden {
                role:   self.role.as_str(),
                action: action.describe(),
            })
        }
    }
}
