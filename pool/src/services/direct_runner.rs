//! One-shot worker CLI invocation through temporary files
//!
//! Every run gets a private directory under the temp root holding the input
//! files and the artifacts the CLI writes. The directory is removed when the
//! run ends, whatever the outcome.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use uuid::Uuid;

use crate::core::render;
use crate::error::{PoolError, PoolResult};
use crate::services::worker_process::WorkerCommand;
use crate::traits::DirectRunner;
use shared::{process_debug, process_error, process_warn, OptimizationResult, OptimizeJob, ProcessId, Tier};

/// Default bound on a single CLI run
pub const DEFAULT_DIRECT_TIMEOUT: Duration = Duration::from_secs(30);

const CV_FILE: &str = "input_cv.txt";
const JOB_POSTING_FILE: &str = "job_posting.txt";
const HTML_ARTIFACT: &str = "optimized_cv.html";
const IMPROVEMENTS_ARTIFACT: &str = "improvements.json";
const REPORT_ARTIFACT: &str = "report.json";
const SUGGESTIONS_ARTIFACT: &str = "suggestions.json";

const FALLBACK_IMPROVEMENT: &str = "CV zostało przetworzone przez system fallback";
const DEFAULT_ATS_SCORE: f64 = 75.0;
const DEFAULT_KEYWORD_MATCH: f64 = 80.0;
const STDERR_EXCERPT_CHARS: usize = 200;

/// Runs the worker CLI once per job
#[derive(Debug, Clone)]
pub struct CliRunner {
    command: WorkerCommand,
    temp_root: PathBuf,
    timeout: Duration,
}

impl CliRunner {
    /// `command` is the CLI prefix; per-run arguments are appended to it
    pub fn new(command: WorkerCommand, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            command,
            temp_root: temp_root.into(),
            timeout: DEFAULT_DIRECT_TIMEOUT,
        }
    }

    /// Configure the run timeout (fluent API)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    async fn run_in(
        &self,
        workspace: &Path,
        job: &OptimizeJob,
        tier: Tier,
        template: &str,
        process: &ProcessId,
    ) -> PoolResult<OptimizationResult> {
        let cv_path = workspace.join(CV_FILE);
        tokio::fs::write(&cv_path, &job.current_cv).await?;

        let job_path = if job.has_job_posting() {
            let path = workspace.join(JOB_POSTING_FILE);
            tokio::fs::write(&path, &job.job_posting).await?;
            Some(path)
        } else {
            None
        };

        let mut cmd = self.command.to_command();
        cmd.arg("--cv")
            .arg(&cv_path)
            .arg("--out")
            .arg(workspace)
            .arg("--plan")
            .arg(tier.as_str())
            .arg("--template")
            .arg(template)
            .arg("--lang")
            .arg("auto");
        if let Some(path) = &job_path {
            cmd.arg("--job").arg(path);
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        process_debug!(process, "🔄 Executing worker CLI for {} plan", tier);
        let child = cmd.spawn().map_err(|err| PoolError::DirectRun {
            message: format!("failed to start {}: {err}", self.command.program),
        })?;

        // on timeout the dropped future kills the child
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(PoolError::DirectTimeout { timeout: self.timeout }),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            process_error!(process, "🚨 Worker CLI failed ({}): {}", output.status, stderr.trim());
            return Err(PoolError::DirectExit {
                code: output.status.code(),
                stderr: stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect(),
            });
        }

        Ok(collect_artifacts(workspace, job, process).await)
    }
}

/// Assemble a result from whatever artifacts the CLI left behind
async fn collect_artifacts(workspace: &Path, job: &OptimizeJob, process: &ProcessId) -> OptimizationResult {
    let optimized_cv = match tokio::fs::read_to_string(workspace.join(HTML_ARTIFACT)).await {
        Ok(html) => html,
        Err(_) => {
            process_warn!(process, "⚠️ HTML output not found, generating basic version");
            render::basic_html(job)
        }
    };

    let improvements = read_json::<Vec<Value>>(&workspace.join(IMPROVEMENTS_ARTIFACT))
        .await
        .unwrap_or_else(|| vec![json!(FALLBACK_IMPROVEMENT)]);

    let (ats_score, keyword_match, subscores) = match read_json::<Value>(&workspace.join(REPORT_ARTIFACT)).await {
        Some(report) => (
            score(&report, "ats_score").unwrap_or(DEFAULT_ATS_SCORE),
            score(&report, "keyword_match").unwrap_or(DEFAULT_KEYWORD_MATCH),
            Some(report.get("subscores").cloned().unwrap_or_else(|| json!({}))),
        ),
        None => (DEFAULT_ATS_SCORE, DEFAULT_KEYWORD_MATCH, None),
    };

    let suggestions = read_json::<Vec<Value>>(&workspace.join(SUGGESTIONS_ARTIFACT))
        .await
        .unwrap_or_default();

    OptimizationResult {
        optimized_cv,
        improvements,
        ats_score: Some(ats_score),
        keyword_match: Some(keyword_match),
        subscores,
        cover_letter: render::cover_letter(job),
        suggestions,
        ..Default::default()
    }
}

/// A positive numeric field of the report; zero counts as missing
fn score(report: &Value, field: &str) -> Option<f64> {
    report.get(field).and_then(Value::as_f64).filter(|value| *value != 0.0)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[async_trait::async_trait]
impl DirectRunner for CliRunner {
    async fn run(&self, job: &OptimizeJob, tier: Tier, template: &str) -> PoolResult<OptimizationResult> {
        tokio::fs::create_dir_all(&self.temp_root)
            .await
            .map_err(|err| PoolError::DirectRun {
                message: format!("cannot create temp root {}: {err}", self.temp_root.display()),
            })?;

        let session = Uuid::new_v4().simple().to_string();
        let short_id: String = session.chars().take(8).collect();
        let process = ProcessId::DirectRun(short_id.clone());

        let workspace = tempfile::Builder::new()
            .prefix(&format!("{session}-"))
            .tempdir_in(&self.temp_root)
            .map_err(|err| PoolError::DirectRun {
                message: format!("cannot create session directory: {err}"),
            })?;

        let outcome = self.run_in(workspace.path(), job, tier, template, &process).await;

        let path = workspace.path().to_path_buf();
        if let Err(err) = workspace.close() {
            process_warn!(process, "⚠️ Failed to remove {}: {}", path.display(), err);
        }

        let mut result = outcome?;
        result.metadata.session_id = Some(short_id);
        Ok(result)
    }
}
