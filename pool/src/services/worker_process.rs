//! Spawning and supervision of a single pooled worker process
//!
//! Each worker gets three background tasks: a stdout reader that decodes
//! frames and routes them by correlation id, a stderr reader that keeps a
//! bounded tail for error messages, and a supervisor that owns the `Child`
//! and either notices an unexpected exit or terminates the process on request.

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::{FrameDecoder, FrameEvent, MAX_FRAME_BYTES};
use crate::error::{PoolError, PoolResult};
use shared::{process_debug, process_warn, ProcessId, Tier, WorkerRequest, WorkerResponse};

/// Bytes of stderr kept for error messages
const STDERR_TAIL_BYTES: usize = 2048;

/// How long an exited worker's stdout reader may take to drain remaining frames
const STDOUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Program and arguments used to launch a worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// `<python> -m <module> [extra args]`
    pub fn python_module(python: &str, module: &str, extra: &[&str]) -> Self {
        let mut args = vec!["-m".to_string(), module.to_string()];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        Self::new(python, args)
    }

    /// Configure working directory (fluent API)
    pub fn with_current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.current_dir = dir;
        self
    }

    /// Add an environment variable for the child (fluent API)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared I/O state for one live worker
///
/// Holds the stdin writer and the map of correlation ids awaiting a response.
pub(crate) struct WorkerLink {
    tier: Tier,
    process: ProcessId,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    pending: Mutex<HashMap<Uuid, oneshot::Sender<PoolResult<Value>>>>,
    stderr_tail: Mutex<String>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WorkerLink {
    fn new(tier: Tier, process: ProcessId, stdin: ChildStdin, kill: oneshot::Sender<()>) -> Self {
        Self {
            tier,
            process,
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            pending: Mutex::new(HashMap::new()),
            stderr_tail: Mutex::new(String::new()),
            kill: Mutex::new(Some(kill)),
            supervisor: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Start waiting for the response carrying `id`
    ///
    /// On a closed link the returned receiver fails immediately.
    pub(crate) fn register(&self, id: Uuid) -> oneshot::Receiver<PoolResult<Value>> {
        let (tx, rx) = oneshot::channel();
        if !self.closed.load(Ordering::SeqCst) {
            lock(&self.pending).insert(id, tx);
        }
        rx
    }

    /// Stop waiting for `id`; a late response for it will be ignored
    pub(crate) fn forget(&self, id: Uuid) {
        lock(&self.pending).remove(&id);
    }

    /// Whether the worker's output ended or it was terminated
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) async fn write_request(&self, request: &WorkerRequest) -> PoolResult<()> {
        let line = request.to_line()?;
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| PoolError::WorkerProcess {
            tier: self.tier,
            message: "worker stdin is closed".to_string(),
        })?;
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Route a decoded stdout frame to whoever awaits its correlation id
    fn deliver(&self, frame: Value) {
        let Some(id) = WorkerResponse::correlation_id(&frame) else {
            process_debug!(self.process, "Ignoring worker frame without correlation id");
            return;
        };

        let Some(waiter) = lock(&self.pending).remove(&id) else {
            process_debug!(self.process, "Ignoring late response for request {}", id);
            return;
        };

        let outcome = match serde_json::from_value::<WorkerResponse>(frame) {
            Ok(response) => response.into_result().map_err(|message| PoolError::WorkerReported {
                tier: self.tier,
                message,
            }),
            Err(err) => Err(PoolError::Protocol {
                message: format!("malformed response for {id}: {err}"),
            }),
        };
        let _ = waiter.send(outcome);
    }

    /// Reject every outstanding request; the link accepts no new ones afterwards
    pub(crate) fn fail_all(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);
        let waiters: Vec<_> = lock(&self.pending).drain().collect();
        if waiters.is_empty() {
            return;
        }

        let message = self.describe_failure(reason);
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(PoolError::WorkerProcess {
                tier: self.tier,
                message: message.clone(),
            }));
        }
    }

    /// Reason plus whatever the worker last wrote to stderr
    pub(crate) fn describe_failure(&self, reason: &str) -> String {
        let tail = self.stderr_tail();
        if tail.is_empty() {
            reason.to_string()
        } else {
            format!("{reason}; stderr: {tail}")
        }
    }

    pub(crate) fn stderr_tail(&self) -> String {
        lock(&self.stderr_tail).trim().to_string()
    }

    fn record_stderr(&self, line: &str) {
        let mut tail = lock(&self.stderr_tail);
        tail.push_str(line);
        tail.push('\n');
        if tail.len() > STDERR_TAIL_BYTES {
            let mut cut = tail.len() - STDERR_TAIL_BYTES;
            while !tail.is_char_boundary(cut) {
                cut += 1;
            }
            tail.drain(..cut);
        }
    }

    /// Ask the supervisor to terminate the process; idempotent
    pub(crate) fn terminate(&self) {
        if let Some(kill) = lock(&self.kill).take() {
            let _ = kill.send(());
        }
    }

    /// Wait for the supervisor to finish reaping the process
    pub(crate) async fn wait_terminated(&self, limit: Duration) {
        let handle = lock(&self.supervisor).take();
        if let Some(handle) = handle {
            if tokio::time::timeout(limit, handle).await.is_err() {
                process_warn!(self.process, "⚠️ Worker did not terminate within {:?}", limit);
            }
        }
    }
}

/// A freshly spawned worker
pub(crate) struct SpawnedWorker {
    pub pid: Option<u32>,
    pub link: Arc<WorkerLink>,
}

/// Callback run once when a worker exits without being asked to
pub(crate) type ExitHook = Box<dyn FnOnce() + Send + 'static>;

/// Launch a worker and its background tasks
///
/// Must be called from within a Tokio runtime.
pub(crate) fn spawn_worker(
    command: &WorkerCommand,
    tier: Tier,
    process: ProcessId,
    grace: Duration,
    on_exit: ExitHook,
) -> std::io::Result<SpawnedWorker> {
    let mut cmd = command.to_command();
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
        (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
        // dropping `child` kills it
        _ => return Err(std::io::Error::other("worker stdio was not captured")),
    };

    let (kill_tx, kill_rx) = oneshot::channel();
    let link = Arc::new(WorkerLink::new(tier, process.clone(), stdin, kill_tx));

    let reader = tokio::spawn(read_frames(stdout, Arc::clone(&link)));
    tokio::spawn(capture_stderr(stderr, Arc::clone(&link)));
    let supervisor = tokio::spawn(supervise(child, kill_rx, reader, Arc::clone(&link), grace, on_exit));
    *lock(&link.supervisor) = Some(supervisor);

    process_debug!(
        process,
        "🔨 Spawned {} worker (PID: {})",
        tier,
        pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string())
    );

    Ok(SpawnedWorker { pid, link })
}

async fn read_frames(mut stdout: ChildStdout, link: Arc<WorkerLink>) {
    let mut decoder = FrameDecoder::new(MAX_FRAME_BYTES);
    let mut chunk = vec![0u8; 8 * 1024];

    loop {
        let read = match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => {
                process_warn!(link.process, "⚠️ Worker stdout read failed: {}", err);
                break;
            }
        };

        for event in decoder.push(&chunk[..read]) {
            match event {
                FrameEvent::Frame(frame) => link.deliver(frame),
                FrameEvent::Skipped(line) => process_debug!(link.process, "stdout: {}", line),
                FrameEvent::Overflow(bytes) => {
                    process_warn!(link.process, "⚠️ Discarded {} undecodable stdout bytes", bytes)
                }
            }
        }
    }

    link.fail_all("worker closed its output");
}

/// Keep draining stderr until EOF; invalid UTF-8 is replaced, never fatal
async fn capture_stderr(stderr: ChildStderr, link: Arc<WorkerLink>) {
    let mut reader = BufReader::new(stderr);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&raw);
                let line = text.trim_end_matches(['\n', '\r']);
                process_debug!(link.process, "stderr: {}", line);
                link.record_stderr(line);
            }
            Err(err) => {
                process_debug!(link.process, "stderr read failed: {}", err);
                break;
            }
        }
    }
}

async fn supervise(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    reader: JoinHandle<()>,
    link: Arc<WorkerLink>,
    grace: Duration,
    on_exit: ExitHook,
) {
    tokio::select! {
        status = child.wait() => {
            let reason = match status {
                Ok(status) => format!("worker exited ({status})"),
                Err(err) => format!("worker wait failed: {err}"),
            };
            // let frames written just before exit reach their callers
            let _ = tokio::time::timeout(STDOUT_DRAIN_TIMEOUT, reader).await;
            process_warn!(link.process, "⚠️ {}", link.describe_failure(&reason));
            link.fail_all(&reason);
            on_exit();
        }
        _ = kill_rx => {
            terminate_child(&mut child, grace, &link.process).await;
            link.fail_all("worker terminated by pool");
        }
    }
}

/// SIGTERM first, SIGKILL once the grace period is over
async fn terminate_child(child: &mut Child, grace: Duration, process: &ProcessId) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
            && tokio::time::timeout(grace, child.wait()).await.is_ok()
        {
            process_debug!(process, "🛑 Worker terminated");
            return;
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(err) = child.kill().await {
        process_debug!(process, "Worker kill failed: {}", err);
    } else {
        process_debug!(process, "🛑 Worker killed");
    }
}
