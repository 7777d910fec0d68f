//! Command-line arguments.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use geopay::{ProviderConfig, ResponseMode};

/// Build gateway URLs, verify callbacks and render provider responses.
#[derive(Debug, Parser)]
#[command(name = "geopay", version, about)]
pub struct Cli {
    /// Provider name: bog, cartu or tbcpay.
    #[arg(long, env = "GEOPAY_PROVIDER", global = true, default_value = "bog")]
    pub provider: String,

    /// Provider option as `name=value`; repeatable.
    #[arg(long = "option", short = 'o', value_parser = parse_key_val, global = true)]
    pub options: Vec<(String, String)>,

    /// Dotenv file with provider options.
    #[arg(long, env = "GEOPAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the outbound payment URL.
    Url {
        /// Custom URL parameter as `name=value`; repeatable.
        #[arg(long = "param", short = 'p', value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Verify a callback signature and access gates.
    Verify(VerifyArgs),
    /// Render a success or error body.
    Respond(RespondArgs),
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Full callback URL as received.
    #[arg(long)]
    pub url: String,

    /// Mode used to render an error body.
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ResponseMode>,

    /// Client address, checked against `allowed_ips`.
    #[arg(long)]
    pub client_ip: Option<IpAddr>,

    /// `Authorization` header value, checked against the configured Basic credentials.
    #[arg(long)]
    pub authorization: Option<String>,
}

#[derive(Debug, Args)]
pub struct RespondArgs {
    /// Response mode; defaults to the provider's own.
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ResponseMode>,

    /// Success field as `name=value`; repeatable.
    #[arg(long = "field", short = 'f', value_parser = parse_key_val, conflicts_with = "error")]
    pub fields: Vec<(String, String)>,

    /// Render an error body with this message.
    #[arg(long)]
    pub error: Option<String>,

    /// Error code; defaults to the provider's own.
    #[arg(long, requires = "error")]
    pub code: Option<u32>,
}

impl Cli {
    /// Explicit options over a snapshot of the process environment.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::from_options(self.options.iter().cloned()).with_process_env()
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty name in {s:?}"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn parse_mode(s: &str) -> Result<ResponseMode, String> {
    s.parse().map_err(|e: geopay::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("back_url_s=https://ok?a=b").unwrap(),
            ("back_url_s".to_owned(), "https://ok?a=b".to_owned())
        );
        assert_eq!(parse_key_val("lang=").unwrap(), ("lang".to_owned(), String::new()));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "geopay",
            "--provider",
            "tbcpay",
            "respond",
            "--mode",
            "check",
            "-f",
            "account=1",
            "-o",
            "lang=en",
        ])
        .unwrap();
        assert_eq!(cli.provider, "tbcpay");
        assert_eq!(cli.options, [("lang".to_owned(), "en".to_owned())]);
        let Command::Respond(args) = cli.command else {
            panic!("expected respond");
        };
        assert_eq!(args.mode, Some(ResponseMode::Check));
        assert_eq!(args.fields.len(), 1);
    }

    #[test]
    fn test_fields_conflict_with_error() {
        let parsed = Cli::try_parse_from(["geopay", "respond", "-f", "a=1", "--error", "x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_code_requires_error() {
        let parsed = Cli::try_parse_from(["geopay", "respond", "--code", "3"]);
        assert!(parsed.is_err());
    }
}
