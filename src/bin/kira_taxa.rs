use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kira_taxa::config::ConfigLoader;
use kira_taxa::domain::OutputFormat;
use kira_taxa::error::{ErrorClass, TaxaError};
use kira_taxa::output::{JsonOutput, OutputMode, StderrProgress};
use kira_taxa::parsers::ParserRegistry;
use kira_taxa::resolver::EnrichmentPolicy;
use kira_taxa::service::{ProgressSink, ProgressSinkKind, Request, Response, Service};
use kira_taxa::transport::HttpTransport;

#[derive(Parser)]
#[command(name = "kira-taxa")]
#[command(about = "Resolve taxon names and GUIDs against the uBio NameBank")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(long, global = true)]
    workers: Option<usize>,

    #[arg(long, global = true)]
    on_enrichment_error: Option<EnrichmentPolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch one NameBank record by GUID or identifier")]
    Record(RecordArgs),
    #[command(about = "Search names and enrich every match with its full record")]
    Search(SearchArgs),
    #[command(about = "Dispatch a request the way the web service does, including redirects")]
    Resolve(ResolveArgs),
    #[command(about = "List the output formats the service advertises")]
    Formats,
}

#[derive(Args)]
struct RecordArgs {
    guid: String,

    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(long, default_value = "")]
    path: String,

    #[arg(long)]
    query: Option<String>,

    #[arg(long)]
    guid: Option<String>,

    #[arg(long, default_value = "json")]
    format: OutputFormat,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(taxa) = report.downcast_ref::<TaxaError>() {
            return ExitCode::from(map_exit_code(taxa));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TaxaError) -> u8 {
    match error.class() {
        ErrorClass::Client | ErrorClass::Configuration => 2,
        ErrorClass::Upstream => 3,
        ErrorClass::Internal => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    if let Commands::Formats = cli.command {
        for format in kira_taxa::domain::SUPPORTED_FORMATS {
            println!("{format}\t{}", format.media_type());
        }
        return Ok(());
    }

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(key) = cli.api_key.filter(|key| !key.trim().is_empty()) {
        config.api_key = Some(key.trim().to_string());
    }
    if let Some(workers) = cli.workers {
        if workers == 0 {
            let err = TaxaError::InvalidConfig("--workers must be at least 1".to_string());
            return Err(err.into());
        }
        config.enrichment_workers = workers;
    }
    if let Some(policy) = cli.on_enrichment_error {
        config.enrichment_policy = policy;
    }
    tracing::debug!(
        source = ?config.source,
        service_url = %config.service_url,
        "configuration loaded"
    );

    let transport = HttpTransport::new(config.timeout, config.max_retries)?;
    let service = Service::new(transport, Arc::new(ParserRegistry::with_defaults()), &config)?;

    match cli.command {
        Commands::Record(args) => {
            let sink = progress(output_mode, ProgressSinkKind::Record);
            let set = service.record(&args.guid, sink.as_ref())?;
            JsonOutput::print_document(&set, args.format)?;
        }
        Commands::Search(args) => {
            let sink = progress(output_mode, ProgressSinkKind::Search);
            let set = service.search(&args.query, sink.as_ref())?;
            JsonOutput::print_document(&set, args.format)?;
        }
        Commands::Resolve(args) => {
            let sink = progress(output_mode, ProgressSinkKind::Resolve);
            let request = Request {
                format: args.format,
                query: args.query,
                path: args.path,
                guid: args.guid,
            };
            let response = service.handle(&request, sink.as_ref())?;
            if let Response::Redirect(url) = &response {
                eprintln!("redirect: {url}");
            }
            JsonOutput::print_response(&response, request.format)?;
        }
        Commands::Formats => {}
    }
    Ok(())
}

fn progress(mode: OutputMode, kind: ProgressSinkKind) -> Box<dyn ProgressSink> {
    match mode {
        OutputMode::Interactive => Box::new(StderrProgress::new(kind)),
        OutputMode::NonInteractive => Box::new(JsonOutput),
    }
}
