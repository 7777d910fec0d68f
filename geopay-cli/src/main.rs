//! Command-line front end for the geopay gateway protocols.
//!
//! # Usage
//!
//! ```bash
//! # Outbound Bog payment URL
//! geopay --provider bog -o merchant_id=M1 -o page_id=P1 url -p order_id=42
//!
//! # Verify a signed callback, printing the provider error body on failure
//! geopay --provider bog --config bog.env verify --mode check --url 'https://shop/cb?...&signature=...'
//!
//! # Render a TBC Pay check answer
//! geopay --provider tbcpay respond --mode check -f account=555123 -f customer=Nino
//! ```
//!
//! # Environment Variables
//!
//! - `GEOPAY_PROVIDER` - Provider name (default: `bog`)
//! - `GEOPAY_CONFIG` - Dotenv file with provider options
//! - `RUST_LOG` - Log filter (default: the `log_level` option, else `debug`)
//!
//! Any provider option not given with `--option` is also looked up in the
//! process environment. Logs go to stderr and, when `log_path` is set, to a
//! daily file `<log_path>/<provider>.log`.

mod args;

use std::io::{self, Write};

use clap::Parser;
use geopay::config::{LOG_LEVEL, LOG_PATH};
use geopay::{CallbackContext, Payment, ProviderConfig, ResponseData, XmlResponse};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::args::{Cli, Command, RespondArgs, VerifyArgs};

fn main() {
    let cli = Cli::parse();

    let mut config = cli.provider_config();
    let loaded = cli.config.as_ref().map_or(Ok(()), |path| config.load_file(path));
    let _guard = init_tracing(&config, &cli.provider);

    let result: Result<(), Box<dyn std::error::Error>> = loaded
        .map_err(Into::into)
        .and_then(|()| run(&cli, config));
    if let Err(e) = result {
        tracing::error!("geopay failed: {e}");
        std::process::exit(1);
    }
}

/// Installs stderr logging plus the optional daily log file.
fn init_tracing(config: &ProviderConfig, provider: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_or(LOG_LEVEL, "debug")));

    let (file_layer, guard) = match config.get(LOG_PATH).filter(|p| !p.is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{provider}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn run(cli: &Cli, config: ProviderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let payment = Payment::new(&cli.provider, config)?;
    tracing::info!(provider = %cli.provider, mode = %payment.mode(), "Loaded configuration");

    match &cli.command {
        Command::Url { params } => {
            let mut payment = payment;
            for (name, value) in params {
                payment.add_param(name.as_str(), value.as_str());
            }
            let redirect = payment.redirect_response()?;
            if cli.json {
                emit(&serde_json::json!({
                    "status": redirect.status(),
                    "location": redirect.location(),
                }))
            } else {
                emit(redirect.location())
            }
        }
        Command::Verify(args) => verify(cli, payment, args),
        Command::Respond(args) => respond(cli, payment, args),
    }
}

fn verify(cli: &Cli, mut payment: Payment, args: &VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = CallbackContext::from_url(args.url.as_str())?;
    if let Some(ip) = args.client_ip {
        request = request.with_client_ip(ip);
    }
    if let Some(header) = &args.authorization {
        request = request.with_basic_auth(header);
    }
    if let Some(mode) = args.mode {
        payment.set_mode(mode);
    }

    match check_callback(&mut payment, request, args) {
        Ok(()) => {
            tracing::info!("Callback verified");
            if cli.json {
                emit(&serde_json::json!({ "verified": true }))
            } else {
                emit("OK")
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Callback rejected");
            let response = payment.reject(err)?;
            emit_response(cli, &response)
        }
    }
}

/// Attaches the callback and runs the signature check, then the access gates
/// that were asked for. The callback stays attached on every failure.
fn check_callback(
    payment: &mut Payment,
    request: CallbackContext,
    args: &VerifyArgs,
) -> Result<(), geopay::Error> {
    payment.attach_request(request)?;
    payment.check_signature()?;
    if args.client_ip.is_some() {
        payment.check_ip_allowed()?;
    }
    if args.authorization.is_some() {
        payment.check_http_auth()?;
    }
    Ok(())
}

fn respond(cli: &Cli, payment: Payment, args: &RespondArgs) -> Result<(), Box<dyn std::error::Error>> {
    let payment = match args.mode {
        Some(mode) => payment.with_mode(mode),
        None => payment,
    };

    let response = match &args.error {
        Some(message) => payment.error(args.code, Some(message.as_str()))?,
        None => {
            let data: ResponseData = args.fields.iter().cloned().collect();
            payment.success(&data)?
        }
    };
    emit_response(cli, &response)
}

fn emit_response(cli: &Cli, response: &XmlResponse) -> Result<(), Box<dyn std::error::Error>> {
    if cli.json {
        emit(&serde_json::json!({
            "status": response.status(),
            "content_type": response.content_type(),
            "body": response.body(),
        }))
    } else {
        emit(response.body())
    }
}

fn emit(value: impl std::fmt::Display) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{value}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use geopay::ResponseMode;

    use super::*;

    fn verify_args(url: &str) -> VerifyArgs {
        VerifyArgs {
            url: url.to_owned(),
            mode: Some(ResponseMode::Response),
            client_ip: None,
            authorization: None,
        }
    }

    #[test]
    fn test_malformed_confirm_request_is_declined() {
        let args = verify_args("https://shop.test/cb?ConfirmRequest=%3CConfirmRequest%3E&signature=abc");
        let mut payment = Payment::new("cartu", ProviderConfig::new())
            .unwrap()
            .with_mode(ResponseMode::Response);
        let request = CallbackContext::from_url(args.url.as_str()).unwrap();

        let err = check_callback(&mut payment, request, &args).unwrap_err();
        assert!(matches!(err, geopay::Error::InvalidXml(_)));

        let body = payment.reject(err).unwrap();
        assert!(body.body().contains("<Status>DECLINED</Status>"));
    }

    #[test]
    fn test_unsigned_callback_is_declined() {
        let args = verify_args(
            "https://shop.test/cb?ConfirmRequest=\
             %3CConfirmRequest%3E%3CTransactionId%3ET9%3C%2FTransactionId%3E%3C%2FConfirmRequest%3E",
        );
        let mut payment = Payment::new("cartu", ProviderConfig::new())
            .unwrap()
            .with_mode(ResponseMode::Response);
        let request = CallbackContext::from_url(args.url.as_str()).unwrap();

        let err = check_callback(&mut payment, request, &args).unwrap_err();
        assert!(matches!(err, geopay::Error::MissingSignature));

        let body = payment.reject(err).unwrap();
        assert!(body.body().contains("<TransactionId>T9</TransactionId>"));
        assert!(body.body().contains("<Status>DECLINED</Status>"));
    }
}
