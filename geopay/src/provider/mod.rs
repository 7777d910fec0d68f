//! Bank gateway protocols.
//!
//! Each bank is one [`Protocol`] implementation. [`Provider`] is the closed set
//! of supported banks, selected by name at construction and dispatched
//! statically.
//!
//! | Provider   | Modes                 | Payment URL | Custom param prefix |
//! |------------|-----------------------|-------------|---------------------|
//! | [`Bog`]    | `check`, `reg`        | yes         | `o.`                |
//! | [`Cartu`]  | `response`            | yes         | none                |
//! | [`Tbcpay`] | `check`, `reg`        | no          | n/a                 |

mod bog;
mod cartu;
mod tbcpay;

pub use bog::Bog;
pub use cartu::{CONFIRM_REQUEST_PARAM, Cartu, ConfirmRequest};
pub use tbcpay::Tbcpay;

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::params::{PaymentParams, ResponseData};
use crate::xml::XmlResponse;

/// Selects the template and URL shape a provider uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseMode {
    /// Pre-payment availability check.
    Check,
    /// Payment registration notice.
    Reg,
    /// Outbound redirect to the gateway page.
    Redirect,
    /// Server-to-server payment confirmation.
    Response,
}

impl ResponseMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Reg => "reg",
            Self::Redirect => "redirect",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(Self::Check),
            "reg" => Ok(Self::Reg),
            "redirect" => Ok(Self::Redirect),
            "response" => Ok(Self::Response),
            _ => Err(Error::UnsupportedMode {
                provider: "any",
                mode: s.to_owned(),
            }),
        }
    }
}

/// Request and response shaping for one bank gateway.
pub trait Protocol {
    /// Lower-case provider name.
    fn name(&self) -> &'static str;

    /// Mode a fresh [`Payment`](crate::Payment) starts in.
    fn default_mode(&self) -> ResponseMode;

    /// Code used by [`render_error`](Self::render_error) when the caller has
    /// none.
    fn default_error_code(&self) -> u32;

    /// Builds the outbound gateway URL.
    ///
    /// Required parameters come first in a fixed order, followed by `params`
    /// in insertion order. Required parameters missing from `config` are
    /// sent empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMode`] for providers that have no redirect
    /// flow.
    fn payment_url(&self, config: &ProviderConfig, params: &PaymentParams)
    -> Result<String, Error>;

    /// Renders the success body for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] naming the first required field that is
    /// absent or empty, and [`Error::UnsupportedMode`] if the provider has no
    /// template for `mode`.
    fn render_success(
        &self,
        mode: ResponseMode,
        config: &ProviderConfig,
        data: &ResponseData,
    ) -> Result<XmlResponse, Error>;

    /// Renders the error body for `mode`, truncating and escaping `message`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMode`] if the provider has no template for
    /// `mode`.
    fn render_error(&self, mode: ResponseMode, code: u32, message: &str)
    -> Result<XmlResponse, Error>;
}

/// One of the supported bank gateways.
#[derive(Debug, Clone)]
pub enum Provider {
    /// Bank of Georgia card gateway.
    Bog(Bog),
    /// Cartu Bank card gateway.
    Cartu(Cartu),
    /// TBC Pay terminal protocol.
    Tbcpay(Tbcpay),
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $call:expr) => {
        match $self {
            Self::Bog($p) => $call,
            Self::Cartu($p) => $call,
            Self::Tbcpay($p) => $call,
        }
    };
}

impl Provider {
    /// Selects a provider by case-insensitive name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProvider`] for any other name.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bog" => Ok(Self::Bog(Bog)),
            "cartu" => Ok(Self::Cartu(Cartu::default())),
            "tbcpay" => Ok(Self::Tbcpay(Tbcpay)),
            _ => Err(Error::UnknownProvider(name.to_owned())),
        }
    }
}

impl Protocol for Provider {
    fn name(&self) -> &'static str {
        dispatch!(self, p => p.name())
    }

    fn default_mode(&self) -> ResponseMode {
        dispatch!(self, p => p.default_mode())
    }

    fn default_error_code(&self) -> u32 {
        dispatch!(self, p => p.default_error_code())
    }

    fn payment_url(
        &self,
        config: &ProviderConfig,
        params: &PaymentParams,
    ) -> Result<String, Error> {
        dispatch!(self, p => p.payment_url(config, params))
    }

    fn render_success(
        &self,
        mode: ResponseMode,
        config: &ProviderConfig,
        data: &ResponseData,
    ) -> Result<XmlResponse, Error> {
        let response = dispatch!(self, p => p.render_success(mode, config, data))?;
        #[cfg(feature = "telemetry")]
        tracing::debug!(provider = self.name(), %mode, ?data, "Rendered success response");
        Ok(response)
    }

    fn render_error(
        &self,
        mode: ResponseMode,
        code: u32,
        message: &str,
    ) -> Result<XmlResponse, Error> {
        let response = dispatch!(self, p => p.render_error(mode, code, message))?;
        #[cfg(feature = "telemetry")]
        tracing::debug!(provider = self.name(), %mode, code, reason = message, "Rendered error response");
        Ok(response)
    }
}

/// Percent-encodes a query value the way gateways expect: everything but
/// `A-Z a-z 0-9 - _ . ~` is escaped and spaces become `%20`.
pub(crate) fn encode(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Appends `key=value` pairs to a base URL, starting the query on the first.
pub(crate) struct QueryBuilder {
    url: String,
    has_query: bool,
}

impl QueryBuilder {
    pub(crate) fn new(base: &str) -> Self {
        Self {
            url: base.to_owned(),
            has_query: base.contains('?'),
        }
    }

    /// Appends a pair. The key is written as is, the value is encoded.
    pub(crate) fn push(&mut self, key: &str, value: &str) -> &mut Self {
        self.url.push(if self.has_query { '&' } else { '?' });
        self.has_query = true;
        self.url.push_str(key);
        self.url.push('=');
        self.url.push_str(&encode(value));
        self
    }

    pub(crate) fn finish(self) -> String {
        self.url
    }
}

/// Returns the non-empty value of `field`, logging when it is missing.
pub(crate) fn require<'a>(data: &'a ResponseData, field: &'static str) -> Result<&'a str, Error> {
    data.non_empty(field).ok_or_else(|| {
        #[cfg(feature = "telemetry")]
        tracing::debug!(field, ?data, "Required field not defined");
        Error::MissingField(field)
    })
}

pub(crate) fn unsupported(provider: &'static str, mode: ResponseMode) -> Error {
    Error::UnsupportedMode {
        provider,
        mode: mode.to_string(),
    }
}
