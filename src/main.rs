use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use readiness_poller::config::cli::{DEFAULT_LOG_FILTER, PROGRESS_DIRECTIVE};
use readiness_poller::config::{Cli, OutputFormat};
use readiness_poller::services::readiness::{
    history_lines, summary_line, wait_until_ready, PollSession, ReadinessError, SessionSummary,
    EXIT_CONFIGURATION_ERROR, EXIT_READY,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    let settings = match cli.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_CONFIGURATION_ERROR);
        }
    };

    match wait_until_ready(&settings.target, &settings.poll, &settings.probe).await {
        Ok(session) => {
            print_summary(&session, settings.output);
            ExitCode::from(EXIT_READY)
        }
        Err(ReadinessError::TimedOut(session)) => {
            eprintln!("Attempt history for {}:", session.target);
            for line in history_lines(&session) {
                eprintln!("{}", line);
            }
            print_summary(&session, settings.output);
            ExitCode::from(ReadinessError::TimedOut(session).exit_code())
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(cli: &Cli) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(cli.log_directives(rust_log.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{}", DEFAULT_LOG_FILTER, PROGRESS_DIRECTIVE)));

    // Keep stdout clean for the JSON document
    let (writer, ansi) = match cli.output {
        OutputFormat::Text => (BoxMakeWriter::new(std::io::stdout), std::io::stdout().is_terminal()),
        OutputFormat::Json => (BoxMakeWriter::new(std::io::stderr), std::io::stderr().is_terminal()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .init();
}

fn print_summary(session: &PollSession, output: OutputFormat) {
    match output {
        OutputFormat::Text => println!("{}", summary_line(session)),
        OutputFormat::Json => match serde_json::to_string_pretty(&SessionSummary::from(session)) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize summary: {}", e),
        },
    }
}
