use serde::{Deserialize, Serialize};

/// Claims minted by the external auth provider. We only ever verify;
/// issuance (login/refresh) is not this service's concern.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: String, // lowercase role name
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
