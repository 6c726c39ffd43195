use crate::error::ConfigError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MAX_SDK_TARGETS: usize = 3;

pub const DEFAULT_CONFIG_FILE: &str = "liveness-check.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub saas: Saas,
    #[serde(default)]
    pub sdk: Sdk,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub discovery: Discovery,
    #[serde(default)]
    pub processing: Processing,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::ConfigFileMissing(path.to_path_buf()).into());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&raw).map_err(|e| ConfigError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(cfg)
    }

    /// Loads `user` if given, else `./liveness-check.toml` if present, else defaults.
    pub fn resolve(user: Option<&Path>) -> Result<Self> {
        if let Some(p) = user {
            return Self::load(p);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default.exists() {
            Self::load(&default)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saas {
    pub url: String,
    pub api_key_env: String,
    pub result_field: String,
}
impl Default for Saas {
    fn default() -> Self {
        Self {
            url: "https://api.identity-platform.io/services/evaluatePassiveLivenessToken".into(),
            api_key_env: "LIVENESS_SAAS_API_KEY".into(),
            result_field: "serviceResultLog".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sdk {
    pub host: String,
    pub endpoint: String,
    pub result_field: String,
}
impl Default for Sdk {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            endpoint: "/api/v1/selphid/passive-liveness/evaluate".into(),
            result_field: "diagnostic".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Http {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}
impl Default for Http {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub extensions: Vec<String>,
}
impl Default for Discovery {
    fn default() -> Self {
        Self {
            extensions: ["png", "jpg", "jpeg", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Processing {
    pub workers: usize,
}
impl Default for Processing {
    fn default() -> Self {
        Self { workers: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub default_path: String,
    pub copy_images: bool,
    pub images_dir: String,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub write_json: bool,
    pub json_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            default_path: "reports/informe_liveness.md".into(),
            copy_images: true,
            images_dir: "temp_images".into(),
            thumb_width: 120,
            thumb_height: 160,
            write_json: false,
            json_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

/// What the user asked for, before validation. Produced identically by the
/// CLI flags and by the interactive wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluateRequest {
    pub image: Option<PathBuf>,
    pub directory: Option<PathBuf>,
    pub use_saas: bool,
    pub saas_api_key: Option<String>,
    pub use_sdk: bool,
    pub sdk_ports: Vec<u16>,
    pub sdk_versions: Vec<String>,
    pub analyze_jpeg_quality: bool,
    pub output: Option<PathBuf>,
    pub workers: Option<usize>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ImageSource {
    File(PathBuf),
    Directory(PathBuf),
}

impl ImageSource {
    pub fn path(&self) -> &Path {
        match self {
            ImageSource::File(p) | ImageSource::Directory(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaasTarget {
    pub url: String,
    #[serde(skip)]
    pub api_key: String,
    pub result_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdkTarget {
    pub port: u16,
    pub version: String,
    pub url: String,
    pub result_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeouts {
    pub request_seconds: u64,
    pub connect_seconds: u64,
}

/// The validated, immutable configuration of one run. Built once before any
/// evaluation starts and shared read-only by every component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    pub source: ImageSource,
    pub extensions: Vec<String>,
    pub saas: Option<SaasTarget>,
    pub sdk_targets: Vec<SdkTarget>,
    pub analyze_jpeg_quality: bool,
    pub workers: usize,
    pub output: PathBuf,
    pub verbose: bool,
    /// Off with `--verbose` or JSON logs, whose lines would tear the bar.
    pub show_progress: bool,
    pub timeouts: Timeouts,
}

impl RunConfig {
    /// Validates `req` against the configuration invariants. Never touches the
    /// filesystem.
    pub fn build(req: &EvaluateRequest, cfg: &Config) -> Result<Self, ConfigError> {
        let source = match (&req.image, &req.directory) {
            (Some(img), _) => ImageSource::File(img.clone()),
            (None, Some(dir)) => ImageSource::Directory(dir.clone()),
            (None, None) => return Err(ConfigError::MissingImageSource),
        };

        if req.sdk_ports.len() > MAX_SDK_TARGETS {
            return Err(ConfigError::TooManySdkTargets {
                max: MAX_SDK_TARGETS,
                got: req.sdk_ports.len(),
            });
        }
        if !req.sdk_versions.is_empty() && req.sdk_versions.len() != req.sdk_ports.len() {
            return Err(ConfigError::SdkCountMismatch {
                ports: req.sdk_ports.len(),
                versions: req.sdk_versions.len(),
            });
        }
        if !req.use_saas && !req.use_sdk {
            return Err(ConfigError::NoBackendEnabled);
        }
        if req.use_sdk && req.sdk_ports.is_empty() {
            return Err(ConfigError::MissingSdkPorts);
        }

        let workers = req.workers.unwrap_or(cfg.processing.workers);
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        let saas = req.use_saas.then(|| SaasTarget {
            url: cfg.saas.url.clone(),
            api_key: req
                .saas_api_key
                .clone()
                .or_else(|| std::env::var(&cfg.saas.api_key_env).ok())
                .unwrap_or_default(),
            result_field: cfg.saas.result_field.clone(),
        });

        let sdk_targets = if req.use_sdk {
            req.sdk_ports
                .iter()
                .enumerate()
                .map(|(i, &port)| SdkTarget {
                    port,
                    version: req
                        .sdk_versions
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("v{}", i + 1)),
                    url: format!("http://{}:{}{}", cfg.sdk.host, port, cfg.sdk.endpoint),
                    result_field: cfg.sdk.result_field.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let output = req
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&cfg.output.default_path));

        Ok(Self {
            source,
            extensions: cfg
                .discovery
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            saas,
            sdk_targets,
            analyze_jpeg_quality: req.analyze_jpeg_quality,
            workers,
            output,
            verbose: req.verbose,
            show_progress: !req.verbose && !cfg.logging.json,
            timeouts: Timeouts {
                request_seconds: cfg.http.timeout_seconds,
                connect_seconds: cfg.http.connect_timeout_seconds,
            },
        })
    }

    pub fn normalized_for_hash(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
