use thiserror::Error;

/// Dispatchers treat `ResponseInvalid` and `SignatureInvalid` from a callback path as "not a
/// match for this provider" and try the next adapter. Messages never contain secrets;
/// `SignatureInvalid` carries no detail at all.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Provider configuration is invalid: {0}")]
    ConfigInvalid(String),
    #[error("Notification signature verification failed")]
    SignatureInvalid,
    #[error("Request to the provider failed: {0}")]
    RequestFailed(String),
    #[error("Provider response is invalid: {0}")]
    ResponseInvalid(String),
    #[error("No adapter is registered for provider type '{0}'")]
    UnsupportedProvider(String),
}
