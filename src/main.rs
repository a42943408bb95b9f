mod auth;
mod cli;
mod collections;
mod environment;
mod http;
mod testing;

use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use auth::Session;
use cli::{CliConfig, OutputFormat};
use collections::Collection;
use environment::{ConfigError, Settings, build_variable_map};
use http::client::{ClientBuildError, HttpClient};
use testing::report::ReportError;
use testing::runner::Runner;

const EXIT_FATAL: u8 = 2;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientBuildError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CliConfig::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "Contract run aborted");
            eprintln!("error: {err}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: &CliConfig) -> Result<u8, AppError> {
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides())?;
    tracing::info!(
        base_url = %settings.base_url,
        email = %settings.credentials.email(),
        timeout_ms = settings.timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let collection = Collection::blueview(settings.expected_role.as_deref());
    let variables = build_variable_map(&settings, &collection.variables);
    let client = HttpClient::new(settings.timeout)?;

    tracing::info!(collection = %collection.name, cases = collection.cases.len(), "Starting run");
    let report = Runner::new(
        client,
        Session::new(settings.base_url.clone()),
        settings.credentials.clone(),
        variables,
    )
    .with_filter(cli.filter.clone())
    .run_suite(&collection.cases)
    .await;

    match cli.format {
        OutputFormat::Text => print!("{}", report.render_text(cli.verbose)),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if let Some(path) = &cli.report_path {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "Report written");
    }

    Ok(report.exit_code(cli.fail_on_skip))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
