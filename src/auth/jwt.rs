use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode};

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    // Refresh tokens are only good for the external token endpoint.
    if claims.token_type != TokenType::Access {
        return Err("Not an access token".to_string());
    }

    Ok(claims)
}
