//! AWS error classification
//!
//! Every SDK error exposes its service error code and message through
//! `ProvideErrorMetadata`; classification matches on those rather than on
//! the Debug representation.

use aws_sdk_guardduty::error::{DisplayErrorContext, ErrorMetadata, ProvideErrorMetadata};
use tfaws_core::provider::ProviderError;

/// Error codes that mean the object does not exist
const NOT_FOUND_CODES: &[&str] = &[
    "AcceleratorNotFoundException",
    "ListenerNotFoundException",
    "EndpointGroupNotFoundException",
    "NotFoundException",
    "ResourceNotFoundException",
];

/// GuardDuty reports missing objects as BadRequestException with one of these messages
const GUARDDUTY_NOT_FOUND_MESSAGES: &[&str] = &[
    "The request is rejected because the input detectorId is not owned by the current account.",
    "The request is rejected since no such resource found.",
];

/// AWS API failure kept as the cause of a `ProviderError`
#[derive(Debug, Clone, thiserror::Error)]
#[error("{display}")]
pub struct AwsApiError {
    meta: ErrorMetadata,
    display: String,
}

impl AwsApiError {
    pub fn from_sdk<E>(err: &E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        let mut meta = ErrorMetadata::builder();
        if let Some(code) = err.code() {
            meta = meta.code(code);
        }
        if let Some(message) = err.message() {
            meta = meta.message(message);
        }
        let display = match (err.code(), err.message()) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.to_string(),
            _ => DisplayErrorContext(err).to_string(),
        };
        Self {
            meta: meta.build(),
            display,
        }
    }
}

impl ProvideErrorMetadata for AwsApiError {
    fn meta(&self) -> &ErrorMetadata {
        &self.meta
    }
}

/// Build a `ProviderError` carrying the SDK error as its cause
pub fn sdk_error<E>(context: impl Into<String>, err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    ProviderError::new(context).with_cause(AwsApiError::from_sdk(&err))
}

/// Error has `code` and, if `message` is not empty, a message containing it
pub fn is_aws_err<E: ProvideErrorMetadata + ?Sized>(err: &E, code: &str, message: &str) -> bool {
    err.code() == Some(code)
        && (message.is_empty() || err.message().is_some_and(|m| m.contains(message)))
}

pub fn is_aws_err_code<E: ProvideErrorMetadata + ?Sized>(err: &E, code: &str) -> bool {
    is_aws_err(err, code, "")
}

/// Object-does-not-exist error, for any of the supported services
pub fn is_not_found<E: ProvideErrorMetadata + ?Sized>(err: &E) -> bool {
    let code_matches = err.code().is_some_and(|c| NOT_FOUND_CODES.contains(&c));
    code_matches || is_guardduty_not_found(err)
}

pub fn is_guardduty_not_found<E: ProvideErrorMetadata + ?Sized>(err: &E) -> bool {
    GUARDDUTY_NOT_FOUND_MESSAGES
        .iter()
        .any(|m| is_aws_err(err, "BadRequestException", m))
}

/// The AWS error behind a `ProviderError`, if any
pub fn api_error(err: &ProviderError) -> Option<&AwsApiError> {
    err.cause.as_deref()?.downcast_ref::<AwsApiError>()
}

/// `ProviderError` caused by a not-found AWS error
pub fn is_not_found_error(err: &ProviderError) -> bool {
    api_error(err).is_some_and(is_not_found)
}

/// `ProviderError` caused by an AWS error with `code` and a message containing `message`
pub fn is_provider_aws_err(err: &ProviderError, code: &str, message: &str) -> bool {
    api_error(err).is_some_and(|e| is_aws_err(e, code, message))
}
