//! Error kinds for the session core and the provider seam.
//!
//! ERROR HANDLING
//! ==============
//! `ProviderError` is what an identity-provider capability reports.
//! `AuthError` is what the core reports to its observability sink. Only
//! `SignOutFailure` is ever returned to a consumer; the rest are absorbed
//! into a degraded snapshot, and `ExchangeFailure` reaches the user as a
//! redirect reason.

/// Failure reported by an [`IdentityProvider`](crate::provider::IdentityProvider) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("identity provider unreachable")]
    Unreachable,

    /// The one-time code is unknown, expired, or already consumed.
    #[error("invalid or expired authorization code")]
    InvalidCode,

    /// Unknown email or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid email address")]
    InvalidEmail,

    /// Sign-up for an email that already has an account.
    #[error("email already registered")]
    AlreadyRegistered,

    /// The caller is not allowed to perform the privileged call.
    #[error("permission denied")]
    PermissionDenied,

    /// The provider answered with something that could not be interpreted.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// Errors produced by the session core.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Network or provider unreachable while fetching session state.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The privileged admin predicate returned false or errored.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The one-time code could not be exchanged for a session.
    #[error("code exchange failed: {0}")]
    ExchangeFailure(#[source] ProviderError),

    /// The provider did not acknowledge sign-out within the bound.
    #[error("sign-out failed: {0}")]
    SignOutFailure(String),
}

impl AuthError {
    /// Stable machine-readable code for log fields and redirects.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TransportFailure(_) => "E_TRANSPORT",
            Self::AuthorizationDenied(_) => "E_AUTHORIZATION_DENIED",
            Self::ExchangeFailure(_) => "E_EXCHANGE",
            Self::SignOutFailure(_) => "E_SIGN_OUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AuthError::TransportFailure("x".into()).error_code(), "E_TRANSPORT");
        assert_eq!(AuthError::AuthorizationDenied("x".into()).error_code(), "E_AUTHORIZATION_DENIED");
        assert_eq!(AuthError::ExchangeFailure(ProviderError::InvalidCode).error_code(), "E_EXCHANGE");
        assert_eq!(AuthError::SignOutFailure("x".into()).error_code(), "E_SIGN_OUT");
    }

    #[test]
    fn exchange_failure_message_includes_source() {
        let err = AuthError::ExchangeFailure(ProviderError::InvalidCode);
        assert_eq!(err.to_string(), "code exchange failed: invalid or expired authorization code");
    }
}
