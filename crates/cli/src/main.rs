// ABOUTME: CLI binary for the fxcomics pipeline.
// ABOUTME: Resolves strips, series and calendars, and encodes or decodes snowcode tokens.

mod logging;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fxcomics_pipeline::options::DEFAULT_ORIGIN;
use fxcomics_pipeline::present::{render_embed, status_document};
use fxcomics_pipeline::{Client, Snowcode, StripError, StripRequest};
use serde::Serialize;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "fxcomics")]
#[command(about = "Resolve comic strips and series metadata from the upstream comics site")]
struct Args {
    /// Upstream site origin
    #[arg(long, global = true, default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// Base URL of a scraping relay used as the last strip strategy
    #[arg(long, global = true)]
    relay: Option<String>,

    /// Outbound User-Agent header
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Outbound Accept-Language header
    #[arg(long, global = true)]
    accept_language: Option<String>,

    /// Extra routing header sent upstream, as NAME=VALUE
    #[arg(long, global = true, value_parser = parse_header)]
    routing_hint: Option<(String, String)>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    /// Output compact JSON instead of pretty
    #[arg(long, global = true)]
    compact: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long, global = true)]
    output: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one day's strip
    Strip {
        slug: String,
        /// YYYY-MM-DD or YYYY-M-D
        date: String,
        #[arg(short = 'f', long, value_enum, default_value_t = StripFormat::Json)]
        format: StripFormat,
        /// This service's public origin, used for embed icons and status links
        #[arg(long, default_value = "https://fxgocomics.com")]
        public_origin: String,
    },
    /// Resolve a comic's about page
    Series { slug: String },
    /// Resolve the last few days of strips, newest first
    Calendar { slug: String },
    /// Encode or decode snowcode tokens
    Snowcode {
        #[command(subcommand)]
        action: SnowcodeAction,
    },
}

#[derive(Subcommand, Debug)]
enum SnowcodeAction {
    Encode { slug: String, date: String },
    Decode { token: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StripFormat {
    /// Normalized strip record
    Json,
    /// Unfurl HTML page with preview meta tags
    Embed,
    /// Federated status document
    Status,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {:?}", raw)),
    }
}

fn build_client(args: &Args) -> Result<Client> {
    let mut builder = Client::builder()
        .origin(args.origin.as_str())
        .timeout(Duration::from_secs(args.timeout_secs));
    if let Some(relay) = &args.relay {
        builder = builder.relay_url(relay.as_str());
    }
    if let Some(user_agent) = &args.user_agent {
        builder = builder.user_agent(user_agent.as_str());
    }
    if let Some(accept_language) = &args.accept_language {
        builder = builder.accept_language(accept_language.as_str());
    }
    if let Some((name, value)) = &args.routing_hint {
        builder = builder.routing_hint(name.as_str(), value.as_str());
    }
    Ok(builder.build()?)
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(out)
}

async fn run(args: &Args) -> Result<String> {
    match &args.command {
        Command::Snowcode { action } => match action {
            SnowcodeAction::Encode { slug, date } => {
                let request = StripRequest::parse(slug, date)?;
                Ok(fxcomics_pipeline::encode(&Snowcode::from(&request))?)
            }
            SnowcodeAction::Decode { token } => {
                let code = fxcomics_pipeline::decode(token)?;
                let request = code.to_request()?;
                to_json(
                    &json!({
                        "slug": code.slug,
                        "date": code.date,
                        "url": format!("{}{}", args.origin.trim_end_matches('/'), request.path()),
                    }),
                    args.compact,
                )
            }
        },
        Command::Strip {
            slug,
            date,
            format,
            public_origin,
        } => {
            let request = StripRequest::parse(slug, date)?;
            let client = build_client(args)?;
            let strip = client.resolve_strip(&request).await?;
            match format {
                StripFormat::Json => to_json(&strip, args.compact),
                StripFormat::Embed => Ok(render_embed(&strip, &request.slug, public_origin)?),
                StripFormat::Status => {
                    let token = fxcomics_pipeline::encode(&Snowcode::from(&request))?;
                    to_json(
                        &status_document(&strip, &request.slug, &token, public_origin),
                        args.compact,
                    )
                }
            }
        }
        Command::Series { slug } => {
            let series = build_client(args)?.series(slug).await?;
            to_json(&series, args.compact)
        }
        Command::Calendar { slug } => {
            let strips = build_client(args)?.calendar(slug).await?;
            tracing::info!(slug = %slug, count = strips.len(), "calendar resolved");
            to_json(&strips, args.compact)
        }
    }
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<StripError>() {
        Some(e) if e.is_caller_error() => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(if args.verbose { "debug" } else { "info" }) {
        eprintln!("error: {:#}", e);
        return ExitCode::from(1);
    }

    let output = match run(&args).await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return exit_code(&e);
        }
    };

    if let Some(path) = &args.output {
        if let Err(e) = fs::write(path, &output).with_context(|| format!("writing {:?}", path)) {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    } else {
        println!("{}", output);
    }

    ExitCode::SUCCESS
}
