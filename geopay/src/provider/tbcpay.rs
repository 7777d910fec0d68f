//! TBC Pay terminal protocol.
//!
//! Payment terminals call the shop to check an account (`check`) and then to
//! register the payment (`reg`). There is no buyer redirect. A success answer
//! may carry named extras shown on the terminal screen.

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::params::{PaymentParams, ResponseData};
use crate::provider::{Protocol, ResponseMode, unsupported};
use crate::xml::{XmlResponse, clean};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const COMMENT_MAX: usize = 125;

/// TBC Pay protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tbcpay;

impl Tbcpay {
    fn ensure_mode(self, mode: ResponseMode) -> Result<(), Error> {
        match mode {
            ResponseMode::Check | ResponseMode::Reg => Ok(()),
            _ => Err(unsupported(self.name(), mode)),
        }
    }
}

impl Protocol for Tbcpay {
    fn name(&self) -> &'static str {
        "tbcpay"
    }

    fn default_mode(&self) -> ResponseMode {
        ResponseMode::Check
    }

    fn default_error_code(&self) -> u32 {
        1
    }

    fn payment_url(
        &self,
        _config: &ProviderConfig,
        _params: &PaymentParams,
    ) -> Result<String, Error> {
        Err(unsupported(self.name(), ResponseMode::Redirect))
    }

    fn render_success(
        &self,
        mode: ResponseMode,
        _config: &ProviderConfig,
        data: &ResponseData,
    ) -> Result<XmlResponse, Error> {
        self.ensure_mode(mode)?;
        if mode == ResponseMode::Check && data.is_empty() {
            #[cfg(feature = "telemetry")]
            tracing::debug!("Extra data not defined");
            return Err(Error::MissingField("data"));
        }

        let info = if data.is_empty() {
            String::new()
        } else {
            let extras: Vec<String> = data
                .iter()
                .map(|(k, v)| format!(r#"<extra name="{}">{}</extra>"#, clean(k, None), clean(v, None)))
                .collect();
            format!("\n    <info>\n        {}\n    </info>", extras.join("\n        "))
        };

        Ok(XmlResponse::new(format!(
            "{XML_DECLARATION}\n<response>\n    <result>0</result>{info}\n    <comment>OK</comment>\n</response>"
        )))
    }

    fn render_error(
        &self,
        mode: ResponseMode,
        code: u32,
        message: &str,
    ) -> Result<XmlResponse, Error> {
        self.ensure_mode(mode)?;
        let comment = clean(message, Some(COMMENT_MAX));
        Ok(XmlResponse::new(format!(
            "{XML_DECLARATION}\n<response>\n    <result>{code}</result>\n    <comment>{comment}</comment>\n</response>"
        )))
    }
}
