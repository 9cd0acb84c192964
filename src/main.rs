use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use vision_job_client::artifact::ArtifactRetriever;
use vision_job_client::schema;
use vision_job_client::{
    Config, DetectionType, HttpVideoService, JobController, JobParameters, JobStatus, KeyStyle,
    LifecycleState, PreconditionError, StatusPoller, VideoService,
};

fn cli() -> Command {
    let type_arg = Arg::new("type")
        .short('t')
        .long("type")
        .value_name("TYPE")
        .help("Detection type: loitering, gather, leave or banner")
        .required(true);
    let param_arg = Arg::new("param")
        .short('p')
        .long("param")
        .value_name("NAME=VALUE")
        .help("Override a parameter, e.g. gatherThreshold=8 or gatherRoi=[(0,0),(10,0),(10,10)]")
        .action(ArgAction::Append);

    Command::new("vision-job")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Submit and track detection jobs on a remote video analysis service")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .global(true),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Service base URL")
                .global(true),
        )
        .arg(
            Arg::new("key-style")
                .long("key-style")
                .value_name("STYLE")
                .help("Parameter key naming on the wire")
                .value_parser(["camel_case", "snake_case"])
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("types").about("List detection types and their parameters"))
        .subcommand(Command::new("ping").about("Check that the service is reachable"))
        .subcommand(
            Command::new("upload")
                .about("Upload a video and print its file id")
                .arg(Arg::new("file").value_name("FILE").required(true)),
        )
        .subcommand(
            Command::new("submit")
                .about("Submit a detection job for an uploaded file")
                .arg(Arg::new("file-id").value_name("FILE_ID").required(true))
                .arg(type_arg.clone())
                .arg(param_arg.clone()),
        )
        .subcommand(
            Command::new("status")
                .about("Show the status of a task")
                .arg(Arg::new("task-id").value_name("TASK_ID").required(true)),
        )
        .subcommand(
            Command::new("download")
                .about("Download the processed video of a completed task")
                .arg(Arg::new("task-id").value_name("TASK_ID").required(true))
                .arg(Arg::new("out").short('o').long("out").value_name("DIR").help("Output directory")),
        )
        .subcommand(
            Command::new("run")
                .about("Upload, submit, poll until done and download")
                .arg(Arg::new("file").value_name("FILE").required(true))
                .arg(type_arg)
                .arg(param_arg)
                .arg(Arg::new("out").short('o').long("out").value_name("DIR").help("Output directory"))
                .arg(
                    Arg::new("no-download")
                        .long("no-download")
                        .help("Stop once the job reaches a terminal state")
                        .action(ArgAction::SetTrue),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    // start logging before the config is read; the configured level is applied afterwards
    let initial_level = std::env::var("VISION_JOB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let (filter, filter_handle) = reload::Layer::new(EnvFilter::new(log_directives(&initial_level, verbose)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose))
        .init();

    let config = load_config(&matches)?;
    if !verbose && config.output.log_level != initial_level {
        filter_handle
            .reload(EnvFilter::new(log_directives(&config.output.log_level, false)))
            .context("applying configured log level")?;
    }

    match matches.subcommand() {
        Some(("types", _)) => {
            print_types();
            Ok(())
        }
        Some(("ping", _)) => ping(&config).await,
        Some(("upload", sub)) => upload(&config, sub).await,
        Some(("submit", sub)) => submit(&config, sub).await,
        Some(("status", sub)) => status(&config, sub).await,
        Some(("download", sub)) => download(&config, sub).await,
        Some(("run", sub)) => run(&config, sub).await,
        _ => unreachable!("subcommand is required"),
    }
}

/// Filter directives: `--verbose` means debug for this crate with other crates at info
fn log_directives(level: &str, verbose: bool) -> String {
    if verbose {
        "vision_job_client=debug,vision_job=debug,info".to_string()
    } else {
        format!("vision_job_client={},vision_job={},warn", level, level)
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(path).with_context(|| format!("loading {}", path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.service.base_url = base_url.clone();
    }
    if let Some(style) = matches.get_one::<String>("key-style") {
        config.service.key_style = match style.as_str() {
            "snake_case" => KeyStyle::SnakeCase,
            _ => KeyStyle::CamelCase,
        };
    }

    config.validate()?;
    Ok(config)
}

fn service(config: &Config) -> Result<Arc<dyn VideoService>> {
    Ok(Arc::new(HttpVideoService::new(config)?))
}

fn parameters(sub: &ArgMatches) -> Result<JobParameters> {
    let detection_type: DetectionType = sub
        .get_one::<String>("type")
        .ok_or_else(|| anyhow!("--type is required"))?
        .parse()?;

    let mut params = JobParameters::defaults(detection_type);
    if let Some(overrides) = sub.get_many::<String>("param") {
        for item in overrides {
            let (name, value) = item
                .split_once('=')
                .ok_or_else(|| anyhow!("expected NAME=VALUE, got {}", item))?;
            params = params.with_text(name.trim(), value)?;
        }
    }
    Ok(params)
}

fn print_types() {
    for spec in schema::all() {
        println!("{} - {}", spec.detection_type, spec.label);
        for param in spec.parameters {
            let mut bounds = Vec::new();
            if let Some(min) = param.min {
                bounds.push(format!("min {}", min));
            }
            if let Some(max) = param.max {
                bounds.push(format!("max {}", max));
            }
            if let Some(step) = param.step {
                bounds.push(format!("step {}", step));
            }
            println!(
                "    {:<24} {:<8} default {}{}{}",
                param.name,
                param.kind,
                param.default_value(),
                param.unit.map(|u| format!(" {}", u)).unwrap_or_default(),
                if bounds.is_empty() { String::new() } else { format!(" ({})", bounds.join(", ")) }
            );
        }
    }
}

async fn ping(config: &Config) -> Result<()> {
    let info = service(config)?.service_info().await?;
    println!(
        "{} is up: {}{}",
        config.service.base_url,
        info.message,
        info.version.map(|v| format!(" (version {})", v)).unwrap_or_default()
    );
    Ok(())
}

async fn upload(config: &Config, sub: &ArgMatches) -> Result<()> {
    let file = sub.get_one::<String>("file").ok_or_else(|| anyhow!("FILE is required"))?;
    let mut controller = JobController::new(service(config)?, config);
    controller.select_file(file);
    let file_id = controller.upload().await?;
    println!("{}", file_id);
    Ok(())
}

async fn submit(config: &Config, sub: &ArgMatches) -> Result<()> {
    let file_id = sub.get_one::<String>("file-id").ok_or_else(|| anyhow!("FILE_ID is required"))?;
    let params = parameters(sub)?;
    let mut controller = JobController::new(service(config)?, config);
    let request = controller
        .request_builder()
        .build_from_parameters(Some(file_id.as_str()), &params)?;
    let task_id = controller.submit(request).await?;
    println!("{}", task_id);
    Ok(())
}

async fn status(config: &Config, sub: &ArgMatches) -> Result<()> {
    let task_id = sub.get_one::<String>("task-id").ok_or_else(|| anyhow!("TASK_ID is required"))?;
    let status = service(config)?.task_status(task_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn download(config: &Config, sub: &ArgMatches) -> Result<()> {
    let task_id = sub.get_one::<String>("task-id").ok_or_else(|| anyhow!("TASK_ID is required"))?;
    let out = sub
        .get_one::<String>("out")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output.download_dir.clone());

    let service = service(config)?;
    let status = service.task_status(task_id).await?;
    if status.status != JobStatus::Completed {
        return Err(PreconditionError::NotReady {
            task_id: task_id.clone(),
            status: status.status.to_string(),
        }
        .into());
    }

    let artifact = ArtifactRetriever::new(service).retrieve(task_id).await?;
    let path = artifact.save_to(&out).await?;
    println!("{}", path.display());
    Ok(())
}

async fn run(config: &Config, sub: &ArgMatches) -> Result<()> {
    let file = sub.get_one::<String>("file").ok_or_else(|| anyhow!("FILE is required"))?;
    let params = parameters(sub)?;
    let out = sub
        .get_one::<String>("out")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output.download_dir.clone());

    let mut controller = JobController::new(service(config)?, config);
    controller.select_file(file);
    let file_id = controller.upload().await?;
    info!("📁 File id: {}", file_id);

    let task_id = controller.start_detection(&params).await?;
    info!("🔧 Task id: {}", task_id);

    let poller = StatusPoller::new(&config.polling);
    let outcome = poller
        .run(&mut controller, &task_id, |job, state| {
            info!(
                "⏳ {} {}{}",
                state,
                job.progress_percent.map(|p| format!("{:.0}%", p)).unwrap_or_default(),
                job.frames_processed.map(|f| format!(" ({} frames)", f)).unwrap_or_default()
            );
        })
        .await?;

    match outcome.state {
        LifecycleState::Completed if !sub.get_flag("no-download") => {
            let artifact = controller.download(&task_id).await?;
            let path = artifact.save_to(&out).await?;
            println!("{}", path.display());
            Ok(())
        }
        LifecycleState::Completed => {
            println!("{}", task_id);
            Ok(())
        }
        LifecycleState::Failed => Err(anyhow!(
            "task {} failed: {}",
            task_id,
            outcome.job.failure_reason.as_deref().unwrap_or("no reason given")
        )),
        state => Err(anyhow!(
            "task {} did not finish after {} checks (state: {})",
            task_id,
            outcome.attempts,
            state
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directives() {
        assert_eq!(
            log_directives("debug", false),
            "vision_job_client=debug,vision_job=debug,warn"
        );
        assert_eq!(
            log_directives("error", true),
            "vision_job_client=debug,vision_job=debug,info"
        );
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["vision-job", "status", "t1", "--verbose", "--key-style", "snake_case"])
            .unwrap();
        assert!(matches.get_flag("verbose"));
        let config = load_config(&matches).unwrap();
        assert_eq!(config.service.key_style, KeyStyle::SnakeCase);
    }
}
