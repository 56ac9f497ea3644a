use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Closed role set supplied by the identity provider. Role is the only
/// authorization axis in this system.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Sales,
    Office,
    Client,
}

impl Role {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Roles with the management overview of attendance and ledgers.
    pub fn is_back_office(self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Office)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lowercase_names() {
        assert_eq!(Role::from_name("admin"), Some(Role::Admin));
        assert_eq!(Role::from_name("client"), Some(Role::Client));
        assert_eq!(Role::from_name("supervisor"), None);
    }

    #[test]
    fn displays_as_lowercase() {
        assert_eq!(Role::Manager.to_string(), "manager");
        assert_eq!(Role::Sales.to_string(), "sales");
    }
}
