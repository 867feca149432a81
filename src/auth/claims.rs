use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;

/// Which half of the token pair a JWT is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for tokens issued by this service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,

    /// Role at issue time. Authorization re-reads the role from the store.
    pub role: Role,

    pub typ: TokenKind,

    /// Token ID, used for revocation
    pub jti: Uuid,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    pub iss: String,

    pub aud: String,
}
