use crate::{
    backend::Diagnosis,
    config::{Config, EvaluateRequest, RunConfig},
    error::exit_code,
    pipeline::{self, Backends},
    render,
    report::RunReport,
    shutdown::{CancelFlag, install_interrupt_handler},
    util::ensure_dir,
    wizard::{Wizard, WizardOutcome},
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug, Default)]
#[command(name = "liveness-check")]
#[command(about = "Evaluate face images against SaaS and local SDK liveness backends")]
pub struct Args {
    /// Single image to evaluate (also accepted as -img).
    #[arg(long, conflicts_with = "directory")]
    pub image: Option<PathBuf>,

    /// Directory of images to evaluate (also accepted as -dir).
    #[arg(long)]
    pub directory: Option<PathBuf>,

    #[arg(long)]
    pub use_saas: bool,

    /// Overrides the API key read from the environment.
    #[arg(long)]
    pub saas_api_key: Option<String>,

    #[arg(long)]
    pub use_sdk: bool,

    /// Ports of the local SDK instances (up to 3).
    #[arg(long, num_args = 1..)]
    pub sdk_port: Vec<u16>,

    /// Version labels, one per port. Defaults to v1, v2, ...
    #[arg(long, num_args = 1..)]
    pub sdk_version: Vec<String>,

    #[arg(long)]
    pub analyze_jpeg_quality: bool,

    /// Markdown report path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    pub workers: Option<usize>,

    #[arg(short, long)]
    pub verbose: bool,

    /// Ask for every option on the terminal instead of reading flags.
    #[arg(short, long)]
    pub interactive: bool,

    /// Path to config TOML. If omitted, uses ./liveness-check.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn request(&self) -> EvaluateRequest {
        EvaluateRequest {
            image: self.image.clone(),
            directory: self.directory.clone(),
            use_saas: self.use_saas,
            saas_api_key: self.saas_api_key.clone(),
            use_sdk: self.use_sdk,
            sdk_ports: self.sdk_port.clone(),
            sdk_versions: self.sdk_version.clone(),
            analyze_jpeg_quality: self.analyze_jpeg_quality,
            output: self.output.clone(),
            workers: self.workers,
            verbose: self.verbose,
        }
    }
}

/// Rewrites the single-dash long spellings `-img` and `-dir` into their
/// `--image` and `--directory` forms so clap can parse them.
pub fn normalize_legacy_flags<I>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    argv.into_iter()
        .map(|arg| {
            let Some(s) = arg.to_str() else {
                return arg;
            };
            for (legacy, long) in [("-img", "--image"), ("-dir", "--directory")] {
                if s == legacy {
                    return OsString::from(long);
                }
                if let Some(value) = s.strip_prefix(legacy).and_then(|r| r.strip_prefix('=')) {
                    return OsString::from(format!("{long}={value}"));
                }
            }
            arg
        })
        .collect()
}

pub fn dispatch(args: Args) -> Result<i32> {
    let cfg = Config::resolve(args.config.as_deref())?;

    let req = if args.interactive {
        let stdin = std::io::stdin();
        let wizard = Wizard::new(stdin.lock(), std::io::stdout(), &cfg);
        match wizard.run()? {
            WizardOutcome::Run(req) => req,
            WizardOutcome::Cancelled => return Ok(exit_code::SUCCESS),
        }
    } else {
        args.request()
    };

    run_evaluation(&req, &cfg)
}

pub fn run_evaluation(req: &EvaluateRequest, cfg: &Config) -> Result<i32> {
    let run = RunConfig::build(req, cfg)?;

    let log_path = resolve_log_path(cfg, &run.output);
    let _guard = init_logging(cfg, run.verbose, log_path.as_deref())?;

    let backends = Backends::from_run_config(&run)?;
    let cancel = CancelFlag::new();
    install_interrupt_handler(&cancel)?;

    let report = pipeline::evaluate(&run, &backends, &cancel)?;
    let written = render::write_report(&report, &run.output, &cfg.output)?;
    info!("run_id={} report={}", report.run_id, written.markdown.display());

    println!(
        "{}",
        serde_json::to_string_pretty(&summary(&report, &written))?
    );

    if report.is_partial() {
        Ok(exit_code::INTERRUPTED)
    } else {
        Ok(exit_code::SUCCESS)
    }
}

fn summary(report: &RunReport, written: &render::WrittenReport) -> serde_json::Value {
    let mut columns = Vec::new();
    if let Some(name) = &report.layout.saas_column {
        let diags: Vec<&Diagnosis> = report
            .rows
            .iter()
            .filter_map(|r| r.saas_diagnosis.as_ref())
            .collect();
        columns.push(column_summary(name, &diags));
    }
    for (i, name) in report.layout.sdk_columns.iter().enumerate() {
        let diags: Vec<&Diagnosis> = report
            .rows
            .iter()
            .filter_map(|r| r.sdk_diagnoses.get(i))
            .collect();
        columns.push(column_summary(name, &diags));
    }

    serde_json::json!({
        "run_id": report.run_id,
        "report": written.markdown,
        "json": written.json,
        "images": report.total_images,
        "evaluated": report.rows.len(),
        "interrupted": report.is_partial(),
        "backends": columns,
    })
}

fn column_summary(name: &str, diags: &[&Diagnosis]) -> serde_json::Value {
    let ok = diags.iter().filter(|d| d.is_success()).count();
    serde_json::json!({
        "column": name,
        "succeeded": ok,
        "failed": diags.len() - ok,
    })
}

fn init_logging(cfg: &Config, verbose: bool, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if verbose {
        "debug"
    } else {
        cfg.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config, report_path: &Path) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    let dir = report_path.parent().unwrap_or_else(|| Path::new("."));
    Some(dir.join("liveness-check.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(normalize_legacy_flags(argv.iter().map(OsString::from)))
    }

    #[test]
    fn legacy_short_flags_are_rewritten() {
        let args = parse(&["liveness-check", "-img", "a.jpg", "--use-saas"]);
        assert_eq!(args.image, Some(PathBuf::from("a.jpg")));

        let args = parse(&["liveness-check", "-dir=photos", "--use-saas"]);
        assert_eq!(args.directory, Some(PathBuf::from("photos")));
    }

    #[test]
    fn multi_value_sdk_flags() {
        let args = parse(&[
            "liveness-check",
            "--directory",
            "d",
            "--use-sdk",
            "--sdk-port",
            "8080",
            "9090",
            "--sdk-version",
            "5.0",
            "5.1",
            "-w",
            "2",
            "-v",
        ]);
        let req = args.request();
        assert_eq!(req.sdk_ports, [8080, 9090]);
        assert_eq!(req.sdk_versions, ["5.0", "5.1"]);
        assert_eq!(req.workers, Some(2));
        assert!(req.verbose && req.use_sdk && !req.use_saas);
    }

    #[test]
    fn image_and_directory_conflict() {
        let argv = ["liveness-check", "--image", "a", "--directory", "b"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn log_path_defaults_next_to_report() {
        let mut cfg = Config::default();
        assert_eq!(resolve_log_path(&cfg, Path::new("out/r.md")), None);
        cfg.logging.write_to_file = true;
        assert_eq!(
            resolve_log_path(&cfg, Path::new("out/r.md")),
            Some(PathBuf::from("out/liveness-check.log"))
        );
    }
}
