//! Bank of Georgia card gateway.
//!
//! The shop redirects the buyer to the gateway page, then answers two
//! server-to-server calls from the gateway: `check` (is the order payable,
//! and for how much) and `reg` (the payment was registered). Custom URL
//! parameters travel as `o.<name>` and come back on both calls.

use crate::amount;
use crate::config::{PAYMENT_URL, ProviderConfig};
use crate::error::Error;
use crate::params::{PaymentParams, ResponseData};
use crate::provider::{Protocol, QueryBuilder, ResponseMode, require, unsupported};
use crate::xml::{XmlResponse, clean};

/// Bank of Georgia protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bog;

impl Bog {
    /// Gateway page used when `payment_url` is not configured.
    pub const DEFAULT_PAYMENT_URL: &'static str = "https://sb3d.georgiancard.ge/payment/start.wsm";
    /// ISO 4217 numeric code for GEL.
    pub const DEFAULT_CURRENCY: &'static str = "981";
    /// Gateway page language.
    pub const DEFAULT_LANG: &'static str = "ka";
    /// Prefix added to custom URL parameters.
    pub const PARAM_PREFIX: &'static str = "o.";

    const DESC_MAX: usize = 125;

    fn check_success(config: &ProviderConfig, data: &ResponseData) -> Result<String, Error> {
        let amount = amount::whole_units(require(data, "amount")?)?;
        if amount == 0 {
            // zero counts as undefined
            #[cfg(feature = "telemetry")]
            tracing::debug!(field = "amount", ?data, "Required field not defined");
            return Err(Error::MissingField("amount"));
        }
        let short_desc = require(data, "short_desc")?;
        let long_desc = require(data, "long_desc")?;

        let trx_id = clean(data.get("trx_id").unwrap_or_default(), Some(50));
        let short_desc = clean(short_desc, Some(30));
        let long_desc = clean(long_desc, Some(Self::DESC_MAX));
        let account_id = clean(config.get_or("account_id", ""), Some(32));
        let currency = clean(config.get_or("currency", Self::DEFAULT_CURRENCY), None);

        Ok(format!(
            r"<payment-avail-response>
    <result>
        <code>1</code>
        <desc>OK</desc>
    </result>
    <merchant-trx>{trx_id}</merchant-trx>
    <purchase>
        <shortDesc>{short_desc}</shortDesc>
        <longDesc>{long_desc}</longDesc>
        <account-amount>
            <id>{account_id}</id>
            <amount>{amount}</amount>
            <currency>{currency}</currency>
            <exponent>2</exponent>
        </account-amount>
    </purchase>
</payment-avail-response>"
        ))
    }

    fn result_body(root: &str, code: u32, desc: &str) -> String {
        format!(
            r"<{root}>
    <result>
        <code>{code}</code>
        <desc>{desc}</desc>
    </result>
</{root}>"
        )
    }
}

impl Protocol for Bog {
    fn name(&self) -> &'static str {
        "bog"
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
            .push("lang", config.get_or("lang", Self::DEFAULT_LANG))
            .push("page_id", config.get_or("page_id", ""))
            .push("merch_id", config.get_or("merchant_id", ""))
            .push("back_url_s", config.get_or("back_url_s", ""))
            .push("back_url_f", config.get_or("back_url_f", ""));
        for (key, value) in params.iter() {
            query.push(&format!("{}{key}", Self::PARAM_PREFIX), value);
        }
        Ok(query.finish())
    }

    fn render_success(
        &self,
        mode: ResponseMode,
        config: &ProviderConfig,
        data: &ResponseData,
    ) -> Result<XmlResponse, Error> {
        let body = match mode {
            ResponseMode::Check => Self::check_success(config, data)?,
            ResponseMode::Reg => Self::result_body("register-payment-response", 1, "OK"),
            _ => return Err(unsupported(self.name(), mode)),
        };
        Ok(XmlResponse::new(body))
    }

    fn render_error(
        &self,
        mode: ResponseMode,
        code: u32,
        message: &str,
    ) -> Result<XmlResponse, Error> {
        let root = match mode {
            ResponseMode::Check => "payment-avail-response",
            ResponseMode::Reg => "register-payment-response",
            _ => return Err(unsupported(self.name(), mode)),
        };
        let desc = clean(message, Some(Self::DESC_MAX));
        Ok(XmlResponse::new(Self::result_body(root, code, &desc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_config() -> ProviderConfig {
        ProviderConfig::from_options([("account_id", "ACC-1")])
    }

    fn check_data() -> ResponseData {
        ResponseData::new()
            .with("trx_id", "TRX1")
            .with("amount", "1050")
            .with("short_desc", "Order 42")
            .with("long_desc", "Two tickets")
    }

    #[test]
    fn test_payment_url() {
        let config = ProviderConfig::from_options([
            ("merchant_id", "M1"),
            ("page_id", "P1"),
            ("back_url_s", "https://ok"),
            ("back_url_f", "https://fail"),
        ]);
        let params = PaymentParams::new().with("promo", "X");
        assert_eq!(
            Bog.payment_url(&config, &params).unwrap(),
            "https://sb3d.georgiancard.ge/payment/start.wsm?lang=ka&page_id=P1&merch_id=M1\
             &back_url_s=https%3A%2F%2Fok&back_url_f=https%3A%2F%2Ffail&o.promo=X"
        );
    }

    #[test]
    fn test_payment_url_keeps_param_order() {
        let config = ProviderConfig::from_options([(PAYMENT_URL, "https://gw.test/start")]);
        let params = PaymentParams::new()
            .with("zeta", "1")
            .with("alpha", "a b")
            .with("mid", "3");
        let url = Bog.payment_url(&config, &params).unwrap();
        assert!(url.starts_with("https://gw.test/start?lang=ka&page_id=&merch_id=&"));
        assert!(url.ends_with("&o.zeta=1&o.alpha=a%20b&o.mid=3"));
    }

    #[test]
    fn test_check_success() {
        let body = Bog
            .render_success(ResponseMode::Check, &check_config(), &check_data())
            .unwrap();
        let body = body.body();
        assert!(body.contains("<code>1</code>"));
        assert!(body.contains("<merchant-trx>TRX1</merchant-trx>"));
        assert!(body.contains("<id>ACC-1</id>"));
        assert!(body.contains("<amount>1050</amount>"));
        assert!(body.contains("<currency>981</currency>"));
        assert!(!body.contains("<!--"));
    }

    #[test]
    fn test_check_success_currency_from_config() {
        let config = check_config().with_env([("currency", "840")]);
        let body = Bog
            .render_success(ResponseMode::Check, &config, &check_data())
            .unwrap();
        assert!(body.body().contains("<currency>840</currency>"));
    }

    #[test]
    fn test_check_success_truncates_fields() {
        let data = check_data()
            .with("short_desc", "x".repeat(40))
            .with("amount", "99.9");
        let body = Bog
            .render_success(ResponseMode::Check, &check_config(), &data)
            .unwrap();
        assert!(body.body().contains(&format!("<shortDesc>{}</shortDesc>", "x".repeat(30))));
        assert!(body.body().contains("<amount>99</amount>"));
    }

    #[test]
    fn test_check_success_missing_fields_in_order() {
        for field in ["amount", "short_desc", "long_desc"] {
            let mut data = check_data();
            data.insert(field, "");
            let err = Bog
                .render_success(ResponseMode::Check, &check_config(), &data)
                .unwrap_err();
            assert!(matches!(err, Error::MissingField(f) if f == field), "{field}");
        }

        let err = Bog
            .render_success(ResponseMode::Check, &check_config(), &ResponseData::new())
            .unwrap_err();
        assert!(matches!(err, Error::MissingField("amount")));
    }

    #[test]
    fn test_check_success_rejects_zero_amount() {
        for zero in ["0", "0.00", "0,5", "-0"] {
            let data = check_data().with("amount", zero);
            let err = Bog
                .render_success(ResponseMode::Check, &check_config(), &data)
                .unwrap_err();
            assert!(matches!(err, Error::MissingField("amount")), "{zero}");
        }

        let data = check_data().with("amount", "0").with("short_desc", "");
        let err = Bog
            .render_success(ResponseMode::Check, &check_config(), &data)
            .unwrap_err();
        assert!(matches!(err, Error::MissingField("amount")));

        let data = check_data().with("amount", "1");
        let body = Bog
            .render_success(ResponseMode::Check, &check_config(), &data)
            .unwrap();
        assert!(body.body().contains("<amount>1</amount>"));
    }

    #[test]
    fn test_reg_success() {
        let body = Bog
            .render_success(ResponseMode::Reg, &ProviderConfig::new(), &ResponseData::new())
            .unwrap();
        assert_eq!(
            body.body(),
            "<register-payment-response>\n    <result>\n        <code>1</code>\n        \
             <desc>OK</desc>\n    </result>\n</register-payment-response>"
        );
    }

    #[test]
    fn test_check_error() {
        let body = Bog
            .render_error(ResponseMode::Check, 2, "<script>alert(1)</script>")
            .unwrap();
        assert_eq!(
            body.body(),
            "<payment-avail-response>\n    <result>\n        <code>2</code>\n        \
             <desc>&lt;script&gt;alert(1)&lt;/script&gt;</desc>\n    </result>\n\
             </payment-avail-response>"
        );
    }

    #[test]
    fn test_error_truncates_description() {
        let body = Bog
            .render_error(ResponseMode::Reg, 2, &"ა".repeat(200))
            .unwrap();
        assert!(body.body().starts_with("<register-payment-response>"));
        assert!(body.body().contains(&format!("<desc>{}</desc>", "ა".repeat(125))));
    }

    #[test]
    fn test_unsupported_modes() {
        assert!(matches!(
            Bog.render_error(ResponseMode::Redirect, 2, "x"),
            Err(Error::UnsupportedMode { provider: "bog", .. })
        ));
        assert!(matches!(
            Bog.render_success(ResponseMode::Response, &ProviderConfig::new(), &check_data()),
            Err(Error::UnsupportedMode { .. })
        ));
    }
}
