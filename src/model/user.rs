use serde::{Deserialize, Serialize};

/// Referenced, not owned: users are managed by the external identity
/// provider, we only read id/name/email/role for relations and search.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: String,
}
