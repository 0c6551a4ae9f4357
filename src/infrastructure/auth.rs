// Auth provider - turns a bearer credential into an Actor
// Token issuance lives outside this crate; only verification happens here

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::infrastructure::actor::Actor;

/// Why a request could not be tied to an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Expired,
    Malformed,
}

impl AuthFailure {
    /// Machine-readable code returned to clients alongside the 401
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::Missing => "not_authenticated",
            AuthFailure::Expired => "token_expired",
            AuthFailure::Malformed => "token_invalid",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::Missing => write!(f, "Authentication credentials were not provided"),
            AuthFailure::Expired => write!(f, "Token has expired"),
            AuthFailure::Malformed => write!(f, "Token is invalid"),
        }
    }
}

/// Claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub is_staff: bool,
    pub exp: usize,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Actor, AuthFailure>;
}

/// HS256 shared-secret verifier
pub struct JwtAuthProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AuthFailure> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                _ => AuthFailure::Malformed,
            })?
            .claims;

        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthFailure::Malformed)?;

        Ok(Actor::from_claims(user_id, claims.is_staff))
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, token: &str) -> Result<Actor, AuthFailure> {
        self.verify(token)
    }
}
