//! Cartu Bank card gateway.
//!
//! After the buyer pays on the 3-D Secure proxy page, the gateway calls the
//! shop with a signed URL whose `ConfirmRequest` parameter holds an XML
//! document. The shop answers with a `ConfirmResponse` that either accepts or
//! declines the payment.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::config::{PAYMENT_URL, ProviderConfig};
use crate::error::Error;
use crate::params::{PaymentParams, ResponseData};
use crate::provider::{Protocol, QueryBuilder, ResponseMode, require, unsupported};
use crate::xml::{XmlResponse, clean};

/// Callback parameter carrying the XML confirmation request.
pub const CONFIRM_REQUEST_PARAM: &str = "ConfirmRequest";

const PAYMENT_DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
const TRANSACTION_ID_MAX: usize = 32;
const PAYMENT_ID_MAX: usize = 12;

/// The gateway's payment confirmation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmRequest {
    /// Shop-side transaction id.
    #[serde(default)]
    pub transaction_id: String,
    /// Gateway-side payment id.
    #[serde(default)]
    pub payment_id: String,
    /// Payment time as sent, `dd.mm.YYYY HH:MM:SS`.
    #[serde(default)]
    pub payment_date: String,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: String,
    /// Card brand.
    #[serde(default)]
    pub card_type: String,
    /// Decline reason, if any.
    #[serde(default)]
    pub reason: String,
    /// Gateway status code.
    #[serde(default)]
    pub status: String,
}

impl ConfirmRequest {
    /// Parses a `ConfirmRequest` XML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidXml`] if the document is malformed.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        quick_xml::de::from_str(xml).map_err(|e| {
            #[cfg(feature = "telemetry")]
            tracing::error!(error = %e, "XML parsing error");
            Error::InvalidXml(e.to_string())
        })
    }

    /// Parsed payment time, if present and well-formed.
    #[must_use]
    pub fn payment_date(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.payment_date.trim(), PAYMENT_DATE_FORMAT).ok()
    }
}

/// Cartu Bank protocol.
///
/// Holds the confirmation request of the current callback, if any, so that a
/// decline can echo its ids.
#[derive(Debug, Clone, Default)]
pub struct Cartu {
    confirm_request: Option<ConfirmRequest>,
}

impl Cartu {
    /// Gateway page used when `payment_url` is not configured.
    pub const DEFAULT_PAYMENT_URL: &'static str =
        "https://e-commerce.cartubank.ge/servlet/Process3DSServlet/3dsproxy_init.jsp";
    /// ISO 4217 numeric code for USD.
    pub const DEFAULT_CURRENCY: &'static str = "840";
    /// Default `CountryCode`.
    pub const DEFAULT_COUNTRY: &'static str = "01";

    /// Attaches the confirmation request of the current callback.
    #[must_use]
    pub fn with_confirm_request(mut self, request: ConfirmRequest) -> Self {
        self.confirm_request = Some(request);
        self
    }

    /// Sets the confirmation request of the current callback.
    pub fn set_confirm_request(&mut self, request: ConfirmRequest) {
        self.confirm_request = Some(request);
    }

    /// The confirmation request of the current callback.
    #[must_use]
    pub const fn confirm_request(&self) -> Option<&ConfirmRequest> {
        self.confirm_request.as_ref()
    }

    fn confirm_response(transaction_id: &str, payment_id: &str, status: &str) -> String {
        let transaction_id = clean(transaction_id, Some(TRANSACTION_ID_MAX));
        let payment_id = clean(payment_id, Some(PAYMENT_ID_MAX));
        format!(
            r"<ConfirmResponse>
    <TransactionId>{transaction_id}</TransactionId>
    <PaymentId>{payment_id}</PaymentId>
    <Status>{status}</Status>
</ConfirmResponse>"
        )
    }
}

impl Protocol for Cartu {
    fn name(&self) -> &'static str {
        "cartu"
    }

    fn default_mode(&self) -> ResponseMode {
        ResponseMode::Redirect
    }

    fn default_error_code(&self) -> u32 {
        2
    }

    fn payment_url(
        &self,
        config: &ProviderConfig,
        params: &PaymentParams,
    ) -> Result<String, Error> {
        let mut query = QueryBuilder::new(config.get_or(PAYMENT_URL, Self::DEFAULT_PAYMENT_URL));
        query
            .push("CountryCode", config.get_or("CountryCode", Self::DEFAULT_COUNTRY))
            .push("CurrencyCode", config.get_or("CurrencyCode", Self::DEFAULT_CURRENCY));
        for name in [
            "MerchantName",
            "MerchantURL",
            "MerchantCity",
            "MerchantID",
            "xDDDSProxy.Language",
        ] {
            query.push(name, config.get_or(name, ""));
        }
        for (key, value) in params.iter() {
            query.push(key, value);
        }
        Ok(query.finish())
    }

    fn render_success(
        &self,
        mode: ResponseMode,
        _config: &ProviderConfig,
        data: &ResponseData,
    ) -> Result<XmlResponse, Error> {
        if mode != ResponseMode::Response {
            return Err(unsupported(self.name(), mode));
        }
        let transaction_id = require(data, "TransactionId")?;
        let payment_id = require(data, "PaymentId")?;
        Ok(XmlResponse::new(Self::confirm_response(
            transaction_id,
            payment_id,
            "ACCEPTED",
        )))
    }

    fn render_error(
        &self,
        mode: ResponseMode,
        _code: u32,
        _message: &str,
    ) -> Result<XmlResponse, Error> {
        if mode != ResponseMode::Response {
            return Err(unsupported(self.name(), mode));
        }
        let (transaction_id, payment_id) = self
            .confirm_request
            .as_ref()
            .map_or(("", ""), |r| (r.transaction_id.as_str(), r.payment_id.as_str()));
        Ok(XmlResponse::new(Self::confirm_response(
            transaction_id,
            payment_id,
            "DECLINED",
        )))
    }
}
