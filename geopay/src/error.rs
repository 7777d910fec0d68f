//! Error types for the provider protocol layer.
//!
//! [`Error`] separates two kinds of failure:
//!
//! - **Transaction failures** (bad signature, missing field, rejected client)
//!   are terminal for the current callback and are answered with the
//!   provider's error body, see [`Error::is_transaction_failure`].
//! - **Deployment defects** (unreadable certificate, bad config file, unknown
//!   provider, unsupported mode) surface to the caller as fatal errors and
//!   are never rendered into provider XML.

use std::net::IpAddr;
use std::path::PathBuf;

/// Fallback message used for error bodies when nothing more specific applies.
pub const DEFAULT_ERROR_MESSAGE: &str = "Unable to accept this payment";

/// Errors produced by the provider protocol layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The amount could not be parsed as a decimal number.
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    /// The callback carries no `signature` query parameter.
    #[error("signature is missing")]
    MissingSignature,

    /// The provider certificate could not be read or is not a usable RSA key.
    #[error("failed to load certificate {path}: {reason}")]
    CertificateLoad {
        /// Configured certificate path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The signature does not verify against the canonical callback URL.
    #[error("signature is invalid")]
    InvalidSignature,

    /// A field required by the active mode is absent or empty.
    #[error("{0} not defined")]
    MissingField(&'static str),

    /// The provider has no template or URL shape for the requested mode.
    #[error("provider {provider} does not support mode {mode:?}")]
    UnsupportedMode {
        /// Provider name.
        provider: &'static str,
        /// Requested mode.
        mode: String,
    },

    /// The configured dotenv file does not exist or is not a regular file.
    #[error("config path {0:?} is not a file")]
    ConfigFileNotFound(PathBuf),

    /// The dotenv file exists but cannot be parsed.
    #[error("invalid config file {path:?}: {reason}")]
    InvalidConfigFile {
        /// Config file path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// No provider is registered under this name.
    #[error("provider {0:?} not found")]
    UnknownProvider(String),

    /// The inbound request URL could not be parsed.
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A provider XML payload is malformed.
    #[error("XML string is invalid: {0}")]
    InvalidXml(String),

    /// The caller is not allowed to reach the callback endpoint.
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Rejections raised by the callback access gates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Basic credentials are absent or wrong.
    #[error("HTTP authorization failed")]
    Unauthorized,

    /// The client address is outside `allowed_ips`.
    #[error("access denied for IP: {0}")]
    IpNotAllowed(IpAddr),
}

impl Error {
    /// Returns `true` when the error is a per-callback failure that must be
    /// answered with a provider error body rather than aborting.
    #[must_use]
    pub const fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::MissingSignature
                | Self::InvalidSignature
                | Self::MissingField(_)
                | Self::InvalidXml(_)
                | Self::Access(_)
        )
    }

    /// Short human-readable message safe to embed in a provider response.
    ///
    /// Never includes signature material, certificate content or parser detail.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MissingSignature => "Signature is missing!",
            Self::InvalidSignature => "Signature is invalid!",
            Self::InvalidAmount(_) => "Invalid amount",
            Self::Access(AccessError::Unauthorized) => "Access denied",
            Self::Access(AccessError::IpNotAllowed(_)) => "Access denied for IP",
            _ => DEFAULT_ERROR_MESSAGE,
        }
    }
}
