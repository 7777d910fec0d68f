//! Inbound callback context.
//!
//! [`CallbackContext`] is the read-only view of one provider callback: the
//! full request URL exactly as received (needed verbatim for signature
//! checks), the decoded query and body parameters, the client address and
//! any Basic credentials. Everything process-wide (server variables, remote
//! address) is passed in explicitly by the HTTP layer.

use std::net::IpAddr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use url::Url;

use crate::error::Error;
use crate::params::ParamMap;

/// Basic credentials presented with a callback.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl BasicCredentials {
    /// Parses an `Authorization` header value of the form `Basic <base64>`.
    ///
    /// Returns `None` for any other scheme or a malformed payload.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        let (scheme, payload) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = b64.decode(payload.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some(Self {
            user: user.to_owned(),
            password: password.to_owned(),
        })
    }
}

/// One inbound provider callback.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    url: String,
    query: ParamMap,
    body: ParamMap,
    client_ip: Option<IpAddr>,
    credentials: Option<BasicCredentials>,
}

impl CallbackContext {
    /// Builds a context from the full request URL (scheme, host, path, query).
    ///
    /// The URL is stored byte-for-byte; query parameters are decoded
    /// separately for lookups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not an absolute URL.
    pub fn from_url(url: impl Into<String>) -> Result<Self, Error> {
        let url = url.into();
        let query = Url::parse(&url)?
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self {
            url,
            query,
            body: ParamMap::new(),
            client_ip: None,
            credentials: None,
        })
    }

    /// Adds decoded body (form) parameters.
    #[must_use]
    pub fn with_body<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.body.extend(params);
        self
    }

    /// Sets the client address as seen by the HTTP layer.
    #[must_use]
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Sets credentials from an `Authorization` header value, if it is valid Basic auth.
    #[must_use]
    pub fn with_basic_auth(mut self, header: &str) -> Self {
        self.credentials = BasicCredentials::from_header(header);
        self
    }

    /// The request URL exactly as received.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The client address, if known.
    #[must_use]
    pub const fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// Basic credentials, if presented.
    #[must_use]
    pub const fn credentials(&self) -> Option<&BasicCredentials> {
        self.credentials.as_ref()
    }

    /// Looks up a request parameter, query first, then body.
    ///
    /// Dots in `name` are matched as underscores, the way form field names
    /// such as `o.order_id` arrive from gateways that rewrite them.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.lookup(name).or_else(|| {
            name.contains('.')
                .then(|| name.replace('.', "_"))
                .and_then(|normalized| self.lookup(&normalized))
        })
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.query.get(name).or_else(|| self.body.get(name))
    }
}
