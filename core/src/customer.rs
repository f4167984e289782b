//! Customer registry records and input validation.

use crate::{
    error::{WsmsError, WsmsResult},
    types::{CustomerId, GroupId, UserId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub id:          GroupId,
    pub group_code:  String,
    pub group_name:  String,
    pub description: Option<String>,
    pub is_active:   bool,
    pub manager_id:  Option<UserId>,
}

/// The slice of a group shown alongside a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id:         GroupId,
    pub group_code: String,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id:             CustomerId,
    pub customer_code:  String,
    pub account_number: Option<String>,
    pub full_name:      String,
    pub address:        String,
    pub phone:          Option<String>,
    pub meter_number:   String,
    pub group:          Option<GroupSummary>,
    pub created_at:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub group_code:  String,
    pub group_name:  String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manager_id:  Option<UserId>,
}

impl NewGroup {
    pub fn normalized(mut self) -> WsmsResult<Self> {
        self.group_code = required("group_code", &self.group_code)?;
        self.group_name = required("group_name", &self.group_name)?;
        self.description = optional(self.description);
        Ok(self)
    }
}

/// Input for registering a customer.
///
/// `new_group` wins over `group_id` when both are given: the group is
/// created in the same transaction as the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub customer_code:  String,
    #[serde(default)]
    pub account_number: Option<String>,
    pub full_name:      String,
    #[serde(default)]
    pub address:        String,
    #[serde(default)]
    pub phone:          Option<String>,
    pub meter_number:   String,
    #[serde(default)]
    pub group_id:       Option<GroupId>,
    #[serde(default)]
    pub new_group:      Option<NewGroup>,
}

impl NewCustomer {
    pub fn normalized(mut self) -> WsmsResult<Self> {
        self.customer_code = required("customer_code", &self.customer_code)?;
        self.full_name = required("full_name", &self.full_name)?;
        self.meter_number = required("meter_number", &self.meter_number)?;
        self.address = self.address.trim().to_string();
        self.account_number = optional(self.account_number);
        self.phone = optional(self.phone);
        self.new_group = self.new_group.map(NewGroup::normalized).transpose()?;
        Ok(self)
    }
}

fn required(field: &str, value: &str) -> WsmsResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WsmsError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewCustomer {
        NewCustomer {
            customer_code:  " CUST001 ".into(),
            account_number: Some("  ".into()),
            full_name:      "John Doe".into(),
            address:        "123 Main St".into(),
            phone:          None,
            meter_number:   "MTR-001".into(),
            group_id:       None,
            new_group:      None,
        }
    }

    #[test]
    fn trims_and_drops_blank_optionals() {
        let c = sample().normalized().unwrap();
        assert_eq!(c.customer_code, "CUST001");
        assert_eq!(c.account_number, None);
    }

    #[test]
    fn blank_required_field_rejected() {
        let mut c = sample();
        c.meter_number = "   ".into();
        assert!(matches!(c.normalized(), Err(WsmsError::Validation(_))));
    }

    #[test]
    fn inline_group_is_validated_too() {
        let mut c = sample();
        c.new_group = Some(NewGroup {
            group_code:  "".into(),
            group_name:  "Residential".into(),
            description: None,
            manager_id:  None,
        });
        assert!(c.normalized().is_err());
    }
}
