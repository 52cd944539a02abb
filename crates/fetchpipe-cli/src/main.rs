//! `fetchpipe` command line

mod settings;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fetchpipe_artifact::STEP_SEPARATOR;
use fetchpipe_core::{PipelineError, PipelineRunner, ProcessRequest, StepRegistry};
use settings::Overrides;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let pipeline = Arg::new("pipeline")
        .required(true)
        .help("Source URL followed by `..step` tokens and an optional extension");

    Command::new("fetchpipe")
        .version(fetchpipe_core::VERSION)
        .about("Fetch remote resources, transform them and cache the results")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("cache-root")
                .long("cache-root")
                .env("FETCHPIPE_CACHE_ROOT")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Root directory of the artifact cache"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("process")
                .about("Run a pipeline and print the result record")
                .arg(pipeline.clone())
                .arg(
                    Arg::new("wait")
                        .long("wait")
                        .action(ArgAction::SetTrue)
                        .help("Wait for an identical in-flight request instead of duplicating it"),
                ),
        )
        .subcommand(
            Command::new("signature")
                .about("Print the claim signature and artifact stem of a pipeline")
                .arg(pipeline),
        )
        .subcommand(Command::new("steps").about("List the built-in steps"))
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}

/// Exit status for a failed run: 2 for bad requests, 1 otherwise
fn failure_code(err: &PipelineError) -> u8 {
    if err.is_bad_request() {
        2
    } else {
        1
    }
}

fn pipeline_arg(args: &ArgMatches) -> anyhow::Result<&str> {
    args.get_one::<String>("pipeline")
        .map(String::as_str)
        .context("missing pipeline")
}

async fn process(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = settings::load(
        args.get_one::<PathBuf>("config").map(PathBuf::as_path),
        Overrides {
            cache_root: args.get_one::<PathBuf>("cache-root").cloned(),
            wait: args.get_flag("wait"),
        },
    )?;
    let runner = PipelineRunner::from_config(config)?;

    match runner.process_str(pipeline_arg(args)?).await {
        Ok(artifact) => {
            println!("{}", serde_json::to_string_pretty(&artifact)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(ExitCode::from(failure_code(&e)))
        }
    }
}

fn signature_record(pipeline: &str) -> anyhow::Result<serde_json::Value> {
    let request = ProcessRequest::parse(pipeline)?;
    let bundle = request.bundle();
    let stem = std::iter::once(bundle.source_url())
        .chain(bundle.chain().iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(STEP_SEPARATOR);

    Ok(serde_json::json!({
        "signature": request.signature(),
        "stem": stem,
        "targetExtension": bundle.target_extension(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    let json = matches
        .subcommand()
        .map_or(false, |(_, args)| args.get_flag("json"));
    init_tracing(json)?;

    match matches.subcommand() {
        Some(("process", args)) => return process(args).await,
        Some(("signature", args)) => {
            let record = signature_record(pipeline_arg(args)?)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Some(("steps", _)) => {
            for name in StepRegistry::with_builtins().names() {
                println!("{name}");
            }
        }
        _ => {}
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let matches = cli()
            .try_get_matches_from([
                "fetchpipe",
                "process",
                "http://example.com/a.jpg..bw.jpg",
                "--cache-root",
                "/tmp/cache",
                "--wait",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "process");
        assert_eq!(pipeline_arg(args).unwrap(), "http://example.com/a.jpg..bw.jpg");
        assert!(args.get_flag("wait"));
        assert_eq!(
            args.get_one::<PathBuf>("cache-root"),
            Some(&PathBuf::from("/tmp/cache"))
        );
    }

    #[test]
    fn bad_requests_exit_with_two() {
        let bad = PipelineError::UnknownStep("sepia".into());
        assert_eq!(failure_code(&bad), 2);

        let upstream = PipelineError::Fetch(fetchpipe_core::FetchError::Status {
            url: "http://example.com/a.jpg".into(),
            status: 404,
        });
        assert_eq!(failure_code(&upstream), 1);
    }

    #[test]
    fn signature_record_names_the_claim_key() {
        let record = signature_record("http:/example.com/a.jpg..bw.jpg").unwrap();
        let request = ProcessRequest::parse("http://example.com/a.jpg..bw.jpg").unwrap();

        assert_eq!(record["signature"], request.signature().to_string());
        assert!(record["signature"].as_str().unwrap().starts_with("lock--"));
        assert_eq!(record["stem"], "http://example.com/a.jpg..bw");
        assert_eq!(record["targetExtension"], ".jpg");
    }

    #[test]
    fn subcommand_is_required() {
        assert!(cli().try_get_matches_from(["fetchpipe"]).is_err());
    }
}
