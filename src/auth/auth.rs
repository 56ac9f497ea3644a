use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::Claims;
use actix_web::{FromRequest, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// The authenticated principal. Resolved once at the HTTP boundary and
/// threaded explicitly into every core operation; the managers never reach
/// into ambient auth state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => {
                return ready(Err(
                    ApiError::Unauthenticated("Missing token".to_string()).into()
                ));
            }
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ApiError::Internal.into())),
        };

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(d) => d,
            Err(_) => {
                return ready(Err(
                    ApiError::Unauthenticated("Invalid token".to_string()).into()
                ));
            }
        };

        let role = match Role::from_name(&data.claims.role) {
            Some(r) => r,
            None => {
                return ready(Err(
                    ApiError::Unauthenticated("Invalid role".to_string()).into()
                ));
            }
        };

        ready(Ok(AuthUser {
            user_id: data.claims.user_id,
            username: data.claims.sub,
            role,
        }))
    }
}

impl AuthUser {
    /// Declarative per-operation role gate, checked once at the operation
    /// boundary.
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Role '{}' is not permitted to perform this action",
                self.role
            )))
        }
    }

    pub fn require_back_office(&self) -> Result<(), ApiError> {
        self.require(&[Role::Admin, Role::Manager, Role::Office])
    }

    pub fn require_admin_or_manager(&self) -> Result<(), ApiError> {
        self.require(&[Role::Admin, Role::Manager])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> AuthUser {
        AuthUser {
            user_id: 7,
            username: "u".to_string(),
            role,
        }
    }

    #[test]
    fn role_gate_allows_listed_roles_only() {
        assert!(principal(Role::Client).require(&[Role::Client, Role::Sales]).is_ok());
        assert!(principal(Role::Sales).require(&[Role::Client, Role::Sales]).is_ok());
        assert!(principal(Role::Office).require(&[Role::Client, Role::Sales]).is_err());
    }

    #[test]
    fn back_office_gate() {
        assert!(principal(Role::Admin).require_back_office().is_ok());
        assert!(principal(Role::Office).require_back_office().is_ok());
        assert!(principal(Role::Sales).require_back_office().is_err());
        assert!(principal(Role::Client).require_back_office().is_err());
    }
}
