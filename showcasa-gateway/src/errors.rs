use showcasa_shared::errors::AppError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing userId query parameter")]
    MissingIdentity,

    #[error("invalid userId: {0}")]
    InvalidIdentity(String),

    #[error("missing token query parameter")]
    MissingToken,

    #[error("token rejected: {0}")]
    TokenRejected(AppError),

    #[error("token subject does not match userId")]
    IdentityMismatch,

    #[error("malformed {channel} payload: {reason}")]
    MalformedPayload { channel: String, reason: String },

    #[error("unknown broker channel: {0}")]
    UnknownChannel(String),

    #[error("socket adapter error: {0}")]
    Adapter(String),
}

impl GatewayError {
    /// Short code sent to the client in the `error` event.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::MissingIdentity | GatewayError::InvalidIdentity(_) => "IDENTITY_REQUIRED",
            GatewayError::MissingToken
            | GatewayError::TokenRejected(_)
            | GatewayError::IdentityMismatch => "AUTH_FAILED",
            GatewayError::MalformedPayload { .. } | GatewayError::UnknownChannel(_) => "BAD_PAYLOAD",
            GatewayError::Adapter(_) => "UNAVAILABLE",
        }
    }
}
