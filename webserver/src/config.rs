//! Runtime configuration read from the environment
//!
//! `.env` is loaded by the binary before `Config::from_env` runs; variables
//! already present in the process environment win.

use pool::WorkerCommand;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WebServerError, WebServerResult};

const DEFAULT_PYTHON_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CV_LENGTH: usize = 50_000;
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Python module answering pooled requests over stdio
pub const WORKER_MODULE: &str = "cvperfect_py.worker";
/// Python module run once per job by the direct fallback
pub const CLI_MODULE: &str = "cvperfect_py.cli";

/// Service-role credentials for the Supabase REST API
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Whether local Python processing is attempted at all
    pub enable_python_processing: bool,
    /// Bound on a direct CLI run
    pub python_timeout: Duration,
    pub max_cv_length: usize,
    /// Basic plan goes through the local chain (otherwise straight to remote)
    pub basic_uses_pool: bool,
    pub python_bin: String,
    pub worker_dir: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub remote_url: String,
    pub supabase: Option<SupabaseConfig>,
    /// Hides internal error details from responses
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_python_processing: false,
            python_timeout: Duration::from_millis(DEFAULT_PYTHON_TIMEOUT_MS),
            max_cv_length: DEFAULT_MAX_CV_LENGTH,
            basic_uses_pool: true,
            python_bin: "python".to_string(),
            worker_dir: None,
            temp_dir: PathBuf::from("./temp"),
            remote_url: format!("{DEFAULT_BASE_URL}/api/analyze"),
            supabase: None,
            production: false,
        }
    }
}

impl Config {
    pub fn from_env() -> WebServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> WebServerResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let base_url = get("NEXT_PUBLIC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let remote_url = get("REMOTE_OPTIMIZE_URL")
            .unwrap_or_else(|| format!("{}/api/analyze", base_url.trim_end_matches('/')));

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_key)) => Some(SupabaseConfig { url, service_key }),
            _ => None,
        };

        let environment = get("APP_ENV").or_else(|| get("NODE_ENV")).unwrap_or_default();

        Ok(Self {
            enable_python_processing: parse_flag("USE_PYTHON_CLI", get("USE_PYTHON_CLI"), defaults.enable_python_processing)?,
            python_timeout: Duration::from_millis(parse_number(
                "PYTHON_TIMEOUT",
                get("PYTHON_TIMEOUT"),
                DEFAULT_PYTHON_TIMEOUT_MS,
            )?),
            max_cv_length: parse_number("MAX_CV_LENGTH", get("MAX_CV_LENGTH"), DEFAULT_MAX_CV_LENGTH)?,
            basic_uses_pool: parse_flag("BASIC_USE_PYTHON", get("BASIC_USE_PYTHON"), defaults.basic_uses_pool)?,
            python_bin: get("PYTHON_BIN").unwrap_or(defaults.python_bin),
            worker_dir: get("PYTHON_WORKDIR").map(PathBuf::from),
            temp_dir: get("CV_TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            remote_url,
            supabase,
            production: environment.eq_ignore_ascii_case("production"),
        })
    }

    /// Long-lived worker speaking line-delimited JSON
    pub fn worker_command(&self) -> WorkerCommand {
        WorkerCommand::python_module(&self.python_bin, WORKER_MODULE, &[]).with_current_dir(self.worker_dir.clone())
    }

    /// One-shot CLI prefix; the runner appends per-job arguments
    pub fn cli_command(&self) -> WorkerCommand {
        WorkerCommand::python_module(&self.python_bin, CLI_MODULE, &["optimize"])
            .with_current_dir(self.worker_dir.clone())
    }
}

fn parse_flag(field: &str, value: Option<String>, default: bool) -> WebServerResult<bool> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(WebServerError::InvalidConfig {
            field: field.to_string(),
            value,
        }),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: Option<String>, default: T) -> WebServerResult<T> {
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| WebServerError::InvalidConfig {
            field: field.to_string(),
            value,
        }),
    }
}
