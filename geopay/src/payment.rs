//! The per-request payment handle.
//!
//! A [`Payment`] ties one [`Provider`] to its configuration, the active
//! [`ResponseMode`], the custom URL parameters and (on callbacks) the inbound
//! [`CallbackContext`]. Every operation is forwarded to the provider through
//! the [`Protocol`] trait.
//!
//! # Example
//!
//! ```
//! use geopay::{Payment, ProviderConfig};
//!
//! let config = ProviderConfig::from_options([
//!     ("merchant_id", "M1"),
//!     ("page_id", "P1"),
//!     ("back_url_s", "https://ok"),
//!     ("back_url_f", "https://fail"),
//! ]);
//! let mut payment = Payment::new("bog", config)?;
//! payment.add_param("promo", "X");
//!
//! assert!(payment.payment_url()?.ends_with("&o.promo=X"));
//! # Ok::<(), geopay::Error>(())
//! ```

use std::net::{IpAddr, Ipv4Addr};

use crate::access;
use crate::config::{CERT_PATH, CONFIG_PATH, ProviderConfig};
use crate::error::{DEFAULT_ERROR_MESSAGE, Error};
use crate::params::{PaymentParams, ResponseData};
use crate::provider::{CONFIRM_REQUEST_PARAM, ConfirmRequest, Protocol, Provider, ResponseMode};
use crate::request::CallbackContext;
use crate::signature::SignatureVerifier;
use crate::xml::XmlResponse;

/// A `302 Found` answer pointing the buyer at the gateway page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    location: String,
}

impl RedirectResponse {
    /// HTTP status the transport should send.
    pub const STATUS: u16 = 302;

    /// Target URL for the `Location` header.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        Self::STATUS
    }
}

/// One payment flow against one provider.
#[derive(Debug, Clone)]
pub struct Payment {
    provider: Provider,
    mode: ResponseMode,
    config: ProviderConfig,
    params: PaymentParams,
    request: Option<CallbackContext>,
}

impl Payment {
    /// Creates a payment for the provider called `provider`.
    ///
    /// If `config` names a `config_path`, that dotenv file is loaded first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProvider`] for an unknown name, and
    /// [`Error::ConfigFileNotFound`] or [`Error::InvalidConfigFile`] if the
    /// config file cannot be loaded.
    pub fn new(provider: &str, mut config: ProviderConfig) -> Result<Self, Error> {
        let provider = Provider::from_name(provider)?;
        if let Some(path) = config.get(CONFIG_PATH).map(ToOwned::to_owned) {
            config.load_file(path)?;
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(provider = provider.name(), "Payment created");

        Ok(Self {
            mode: provider.default_mode(),
            provider,
            config,
            params: PaymentParams::new(),
            request: None,
        })
    }

    /// Sets the response mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the response mode.
    pub fn set_mode(&mut self, mode: ResponseMode) {
        self.mode = mode;
    }

    /// Attaches the inbound callback.
    ///
    /// In `response` mode a Cartu `ConfirmRequest` parameter, when present, is
    /// parsed here, so the mode has to be set first. The callback is stored
    /// before parsing: on [`Error::InvalidXml`] the handle still holds it and
    /// [`reject`](Self::reject) renders the decline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidXml`] if the `ConfirmRequest` document is
    /// malformed.
    pub fn attach_request(&mut self, request: CallbackContext) -> Result<(), Error> {
        let request = self.request.insert(request);
        if self.mode != ResponseMode::Response {
            return Ok(());
        }
        if let Provider::Cartu(cartu) = &mut self.provider {
            if let Some(xml) = request.param(CONFIRM_REQUEST_PARAM) {
                cartu.set_confirm_request(ConfirmRequest::parse(xml)?);
            }
        }
        Ok(())
    }

    /// Builder form of [`attach_request`](Self::attach_request).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidXml`] if the `ConfirmRequest` document is
    /// malformed. The handle is dropped; use `attach_request` to keep it.
    pub fn with_request(mut self, request: CallbackContext) -> Result<Self, Error> {
        self.attach_request(request)?;
        Ok(self)
    }

    /// Active response mode.
    #[must_use]
    pub const fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// The selected provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The effective configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The attached callback, if any.
    #[must_use]
    pub const fn request(&self) -> Option<&CallbackContext> {
        self.request.as_ref()
    }

    /// Cartu's parsed confirmation request, if the callback carried one.
    #[must_use]
    pub fn confirm_request(&self) -> Option<&ConfirmRequest> {
        match &self.provider {
            Provider::Cartu(cartu) => cartu.confirm_request(),
            _ => None,
        }
    }

    /// Adds a custom URL parameter, replacing an existing value in place.
    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(name, value);
        self
    }

    /// Looks up a custom parameter, then the callback request.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .or_else(|| self.request.as_ref().and_then(|r| r.param(name)))
    }

    /// Sets Bog's `back_url_s`.
    pub fn set_success_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.set("back_url_s", url);
        self
    }

    /// Sets Bog's `back_url_f`.
    pub fn set_fail_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.set("back_url_f", url);
        self
    }

    /// Builds the outbound gateway URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMode`] if the provider has no redirect flow.
    pub fn payment_url(&self) -> Result<String, Error> {
        self.provider.payment_url(&self.config, &self.params)
    }

    /// Builds a redirect to the gateway page.
    ///
    /// # Errors
    ///
    /// See [`payment_url`](Self::payment_url).
    pub fn redirect_response(&self) -> Result<RedirectResponse, Error> {
        Ok(RedirectResponse {
            location: self.payment_url()?,
        })
    }

    /// Verifies the callback signature with the configured `cert_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSignature`] if no callback is attached or it
    /// carries no signature, [`Error::CertificateLoad`] if `cert_path` is
    /// unset or unusable, and [`Error::InvalidSignature`] otherwise.
    pub fn check_signature(&self) -> Result<(), Error> {
        let Some(request) = &self.request else {
            return Err(self.signature_failure(Error::MissingSignature));
        };
        let cert_path = self.config.get_or(CERT_PATH, "");
        SignatureVerifier::new(cert_path)
            .verify(request)
            .map_err(|e| self.signature_failure(e))
    }

    /// Checks the callback client address against `allowed_ips`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Access`] if a list is configured and the client
    /// address is not on it. An unknown client address is checked as
    /// `0.0.0.0`.
    pub fn check_ip_allowed(&self) -> Result<(), Error> {
        let ip = self
            .request
            .as_ref()
            .and_then(CallbackContext::client_ip)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        access::check_ip_allowed(&self.config, ip).map_err(Error::from)
    }

    /// Checks the callback Basic credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Access`] if they are absent or wrong.
    pub fn check_http_auth(&self) -> Result<(), Error> {
        let credentials = self.request.as_ref().and_then(CallbackContext::credentials);
        access::check_http_auth(&self.config, credentials).map_err(Error::from)
    }

    /// Renders the success body for the active mode.
    ///
    /// # Errors
    ///
    /// See [`Protocol::render_success`].
    pub fn success(&self, data: &ResponseData) -> Result<XmlResponse, Error> {
        self.provider.render_success(self.mode, &self.config, data)
    }

    /// Renders the error body for the active mode.
    ///
    /// `None` uses the provider's default code and message.
    ///
    /// # Errors
    ///
    /// See [`Protocol::render_error`].
    pub fn error(&self, code: Option<u32>, message: Option<&str>) -> Result<XmlResponse, Error> {
        self.provider.render_error(
            self.mode,
            code.unwrap_or_else(|| self.provider.default_error_code()),
            message.unwrap_or(DEFAULT_ERROR_MESSAGE),
        )
    }

    /// Turns a failure into the provider's error body.
    ///
    /// Transaction failures are rendered with the provider's default code and
    /// the error's public message.
    ///
    /// # Errors
    ///
    /// Deployment defects are returned unchanged, as is any error raised while
    /// rendering.
    pub fn reject(&self, err: Error) -> Result<XmlResponse, Error> {
        if !err.is_transaction_failure() {
            return Err(err);
        }
        self.error(None, Some(err.public_message()))
    }

    #[cfg_attr(not(feature = "telemetry"), allow(clippy::unused_self))]
    fn signature_failure(&self, err: Error) -> Error {
        #[cfg(feature = "telemetry")]
        tracing::warn!(provider = self.provider.name(), error = %err, "Signature check failed");
        err
    }
}
