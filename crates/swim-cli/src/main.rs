//! SWIM CLI - upgrade a network device through Catalyst Center
//!
//! Resolves the image for a software version and the device for a hostname,
//! distributes the image, then activates it, waiting for each task to finish.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use swim_client::{CancellationToken, ControllerClient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::UpgradeArgs;
use crate::config::{Config, ControllerOverrides};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "swim-cli")]
#[command(author, about = "Catalyst Center software image upgrade")]
#[command(disable_version_flag = true)]
struct Cli {
    /// The hostname of the device to be upgraded
    #[arg(long)]
    hostname: String,

    /// Version of the software to be upgraded
    #[arg(long = "version", value_name = "VERSION")]
    software: String,

    /// Controller address (host or URL)
    #[arg(long, env = "SWIM_CONTROLLER")]
    controller: Option<String>,

    /// Controller HTTPS port
    #[arg(long, env = "SWIM_PORT")]
    port: Option<u16>,

    /// Controller username
    #[arg(long, env = "SWIM_USERNAME")]
    username: Option<String>,

    /// Controller password
    #[arg(long, env = "SWIM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Seconds to wait for each task before giving up
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds between task status checks
    #[arg(long, value_name = "SECS")]
    retry_interval: Option<u64>,

    /// Stop after distribution
    #[arg(long)]
    skip_activate: bool,

    /// Configuration file path
    #[arg(short, long, env = "SWIM_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let format = cli
        .output
        .or_else(|| config.output.as_deref().and_then(OutputFormat::parse))
        .unwrap_or_default();
    let ctx = OutputContext::new(format, config.no_color(cli.no_color), cli.quiet);

    let controller = config.controller_config(&ControllerOverrides {
        host: cli.controller.clone(),
        port: cli.port,
        username: cli.username.clone(),
        password: cli.password.clone(),
        insecure: cli.insecure,
        timeout_secs: cli.timeout,
        retry_interval_secs: cli.retry_interval,
    })?;

    let args = UpgradeArgs {
        hostname: cli.hostname.clone(),
        version: cli.software.clone(),
        policy: controller.polling.policy(),
        skip_activate: cli.skip_activate,
    };

    // First Ctrl+C stops before the next submission or interrupts the current
    // wait; a second one exits immediately
    let cancel = CancellationToken::new();
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        if c.is_cancelled() {
            std::process::exit(130);
        }
        c.cancel();
    })?;

    let client = ControllerClient::connect(controller)
        .await
        .context("Failed to authenticate with controller")?;

    match commands::upgrade(&client, &args, &cancel, &ctx).await {
        Ok(report) => {
            ctx.report(&report);
            Ok(())
        }
        Err(e) => {
            ctx.error(&format!("Upgrade aborted: {:#}", e));
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_arguments() {
        let cli = Cli::try_parse_from([
            "swim-cli",
            "--hostname",
            "edge1.example.com",
            "--version",
            "17.9.4",
        ])
        .unwrap();
        assert_eq!(cli.hostname, "edge1.example.com");
        assert_eq!(cli.software, "17.9.4");
        assert!(!cli.insecure);
        assert!(cli.output.is_none());

        assert!(Cli::try_parse_from(["swim-cli", "--hostname", "edge1"]).is_err());
        assert!(Cli::try_parse_from(["swim-cli", "--version", "17.9.4"]).is_err());
    }

    #[test]
    fn test_polling_flags() {
        let cli = Cli::try_parse_from([
            "swim-cli",
            "--hostname",
            "edge1",
            "--version",
            "17.9.4",
            "--timeout",
            "600",
            "--retry-interval",
            "15",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.timeout, Some(600));
        assert_eq!(cli.retry_interval, Some(15));
        assert_eq!(cli.output, Some(OutputFormat::Json));
    }
}
