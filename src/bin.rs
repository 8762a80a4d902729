//! Binary entry point for `assistant-bot`.
//!
//! This module provides the command-line interface for assistant-bot with options
//! for configuration file paths and logging verbosity. It initializes the
//! necessary components and starts the service, or runs the one-off Google
//! authorization flow.

use assistant_bot::{
    base::{config::Config, types::Void},
    service::credential::CapabilityScope,
};
use clap::{Parser, Subcommand, ValueEnum};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Assistant-bot: a Slack personal assistant for mail and calendar.
///
/// Configuration can come from `.hidden/config.toml` or environment variables.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans over OTLP (HTTP) in addition to logging them.
    #[arg(long)]
    otlp: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Google consent flow for a capability and store the credential.
    Authorize {
        /// Which capability to authorize.
        #[arg(value_enum)]
        capability: Capability,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Capability {
    Gmail,
    Calendar,
}

impl From<Capability> for CapabilityScope {
    fn from(capability: Capability) -> Self {
        match capability {
            Capability::Gmail => CapabilityScope::ReadMessages,
            Capability::Calendar => CapabilityScope::ScheduledEvents,
        }
    }
}

/// Main entry point for the assistant-bot binary.
///
/// Sets up logging based on verbosity, loads configuration, and starts the bot.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer, when asked for.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("assistant-bot");

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    match args.command {
        Some(Command::Authorize { capability }) => {
            let config = Config::read(args.config.as_deref())?;
            assistant_bot::authorize(config, capability.into()).await
        }
        None => {
            let config = Config::load(args.config.as_deref())?;
            assistant_bot::start(config).await
        }
    }
}
