#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Provider protocol layer for Georgian bank payment gateways.
//!
//! This crate shapes the traffic between a web shop and a bank gateway: it
//! builds the outbound redirect URL, verifies the signature on inbound
//! callbacks and renders the XML acknowledgement each bank expects. It never
//! performs network I/O itself; the HTTP layer sends what this crate produces.
//!
//! # Modules
//!
//! - [`amount`] - Major/minor unit conversion on exact decimals
//! - [`config`] - Provider options layered over an environment snapshot
//! - [`request`] - Inbound callback context
//! - [`signature`] - RSA/SHA-1 callback signature verification
//! - [`xml`] - Escaping, truncation and the XML response type
//! - [`provider`] - Per-bank protocols (Bog, Cartu, TBC Pay)
//! - [`access`] - IP allowlist and Basic auth gates
//! - [`payment`] - The per-request payment handle
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits `tracing` events for rendered bodies, validation and
//!   signature failures

pub mod access;
pub mod amount;
pub mod config;
pub mod error;
pub mod params;
pub mod payment;
pub mod provider;
pub mod request;
pub mod signature;
pub mod xml;

pub use config::ProviderConfig;
pub use error::{AccessError, Error};
pub use params::{ParamMap, PaymentParams, ResponseData};
pub use payment::{Payment, RedirectResponse};
pub use provider::{Protocol, Provider, ResponseMode};
pub use request::CallbackContext;
pub use signature::SignatureVerifier;
pub use xml::XmlResponse;
