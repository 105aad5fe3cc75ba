//! Per-tier pool of long-lived worker processes
//!
//! Each tier owns a bounded set of workers and a FIFO of requests waiting for
//! one. A worker runs at most one request at a time; requests and responses
//! are matched over its stdio by correlation id.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::{PendingRequest, TierQueue};
use crate::error::{PoolError, PoolResult};
use crate::services::worker_process::{spawn_worker, WorkerCommand, WorkerLink};
use crate::traits::{PoolStats, ProcessPool, TierStats};
use shared::{process_debug, process_error, process_info, process_warn, OptimizeJob, ProcessId, Tier, WorkerRequest};

/// Premium workers started by `initialize`
pub const PREWARM_WORKERS: usize = 2;

/// A worker is retired once its lifetime request count exceeds this
pub const RETIRE_AFTER_REQUESTS: u64 = 100;

/// Time between SIGTERM and SIGKILL when terminating a worker
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Real process pool backed by OS processes
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<PoolShared>,
}

struct PoolShared {
    command: WorkerCommand,
    grace: Duration,
    retire_after: u64,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    initialized: bool,
    next_worker_id: u64,
    tiers: HashMap<Tier, TierState>,
}

#[derive(Default)]
struct TierState {
    workers: Vec<WorkerHandle>,
    queue: TierQueue,
}

/// Pool-side bookkeeping for one live worker process
///
/// Dropping the handle terminates the process.
struct WorkerHandle {
    id: u64,
    tier: Tier,
    pid: Option<u32>,
    busy: bool,
    created_at: Instant,
    request_count: u64,
    link: Arc<WorkerLink>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        process_debug!(ProcessId::worker(self.tier, self.id), "Releasing worker handle");
        self.link.terminate();
    }
}

/// A queued request matched with the worker that will run it
struct Assignment {
    tier: Tier,
    worker_id: u64,
    link: Arc<WorkerLink>,
    request: PendingRequest,
}

impl WorkerPool {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                command,
                grace: SHUTDOWN_GRACE,
                retire_after: RETIRE_AFTER_REQUESTS,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Configure the SIGTERM to SIGKILL grace period (fluent API)
    pub fn with_shutdown_grace(self, grace: Duration) -> Self {
        self.reconfigure(|shared| shared.grace = grace)
    }

    /// Configure the retirement threshold (fluent API)
    pub fn with_retire_after(self, requests: u64) -> Self {
        self.reconfigure(|shared| shared.retire_after = requests)
    }

    fn reconfigure(self, apply: impl FnOnce(&mut PoolShared)) -> Self {
        match Arc::try_unwrap(self.shared) {
            Ok(mut shared) => {
                apply(&mut shared);
                Self {
                    shared: Arc::new(shared),
                }
            }
            // already cloned; settings are fixed from here on
            Err(shared) => Self { shared },
        }
    }

    /// Process ids of the live workers of a tier
    pub fn worker_pids(&self, tier: Tier) -> Vec<u32> {
        let mut state = self.shared.lock();
        state.tier_mut(tier).workers.iter().filter_map(|w| w.pid).collect()
    }
}

impl PoolState {
    fn tier_mut(&mut self, tier: Tier) -> &mut TierState {
        self.tiers.entry(tier).or_default()
    }
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.initialized {
            return;
        }
        state.initialized = true;
        process_info!(ProcessId::Pool, "🔧 Initializing Python process pool");

        for tier in Tier::ALL.into_iter().filter(Tier::is_prewarmed) {
            for _ in 0..PREWARM_WORKERS.min(tier.max_workers()) {
                if let Err(err) = self.spawn_locked(&mut state, tier) {
                    process_warn!(ProcessId::Pool, "⚠️ Failed to pre-warm {} worker: {}", tier, err);
                    break;
                }
            }
        }

        process_info!(ProcessId::Pool, "✅ Python process pool initialized");
    }

    /// Spawn a worker into `tier`; the pool lock must be held
    fn spawn_locked(self: &Arc<Self>, state: &mut PoolState, tier: Tier) -> std::io::Result<()> {
        state.next_worker_id += 1;
        let id = state.next_worker_id;

        let pool = Arc::downgrade(self);
        let on_exit = Box::new(move || handle_worker_exit(pool, tier, id));
        let spawned = spawn_worker(&self.command, tier, ProcessId::worker(tier, id), self.grace, on_exit)?;

        state.tier_mut(tier).workers.push(WorkerHandle {
            id,
            tier,
            pid: spawned.pid,
            busy: false,
            created_at: Instant::now(),
            request_count: 0,
            link: spawned.link,
        });
        Ok(())
    }

    /// Hand queued requests of `tier` to idle workers, spawning up to the cap
    fn dispatch(self: &Arc<Self>, tier: Tier) {
        let mut assignments = Vec::new();
        let mut state = self.lock();

        loop {
            let tier_state = state.tier_mut(tier);
            tier_state.workers.retain(|worker| !worker.link.is_closed());

            let Some(request) = tier_state.queue.pop() else {
                break;
            };
            if request.is_abandoned() {
                continue;
            }

            if let Some(worker) = tier_state.workers.iter_mut().find(|worker| !worker.busy) {
                worker.busy = true;
                worker.request_count += 1;
                assignments.push(Assignment {
                    tier,
                    worker_id: worker.id,
                    link: Arc::clone(&worker.link),
                    request,
                });
                continue;
            }

            if tier_state.workers.len() >= tier.max_workers() {
                // every worker busy; wait for a release
                tier_state.queue.push_front(request);
                break;
            }

            let no_workers = tier_state.workers.is_empty();
            match self.spawn_locked(&mut state, tier) {
                Ok(()) => state.tier_mut(tier).queue.push_front(request),
                Err(err) if no_workers => {
                    process_error!(ProcessId::Pool, "🚨 Failed to create worker for {}: {}", tier, err);
                    let message = err.to_string();
                    let _ = request.complete(Err(PoolError::SpawnFailed {
                        tier,
                        message: message.clone(),
                    }));
                    for queued in state.tier_mut(tier).queue.drain() {
                        let _ = queued.complete(Err(PoolError::SpawnFailed {
                            tier,
                            message: message.clone(),
                        }));
                    }
                    break;
                }
                Err(err) => {
                    process_warn!(ProcessId::Pool, "⚠️ Failed to add {} worker: {}", tier, err);
                    state.tier_mut(tier).queue.push_front(request);
                    break;
                }
            }
        }

        drop(state);

        for assignment in assignments {
            tokio::spawn(run_assignment(Arc::clone(self), assignment));
        }
    }

    /// Return a worker to the idle set, or retire it, then drain the queue
    fn release(self: &Arc<Self>, tier: Tier, worker_id: u64) {
        {
            let mut state = self.lock();
            let retire_after = self.retire_after;
            let workers = &mut state.tier_mut(tier).workers;

            if let Some(index) = workers.iter().position(|worker| worker.id == worker_id) {
                let worker = &mut workers[index];
                worker.busy = false;
                if worker.request_count > retire_after {
                    let retired = workers.remove(index);
                    process_info!(
                        ProcessId::worker(tier, worker_id),
                        "♻️ Retiring worker after {} requests (uptime {:?})",
                        retired.request_count,
                        retired.created_at.elapsed()
                    );
                }
            }
        }

        self.dispatch(tier);
    }

    /// Take a still-queued request out of its queue
    fn withdraw(&self, tier: Tier, id: Uuid) -> Option<PendingRequest> {
        self.lock().tier_mut(tier).queue.remove(id)
    }

    fn stats(&self) -> PoolStats {
        let mut state = self.lock();
        let initialized = state.initialized;
        let tiers = Tier::ALL
            .into_iter()
            .map(|tier| {
                let tier_state = state.tier_mut(tier);
                let live: Vec<&WorkerHandle> = tier_state.workers.iter().filter(|w| !w.link.is_closed()).collect();
                let busy = live.iter().filter(|w| w.busy).count();
                TierStats {
                    tier,
                    workers: live.len(),
                    busy,
                    idle: live.len() - busy,
                    queued: tier_state.queue.len(),
                    max_workers: tier.max_workers(),
                }
            })
            .collect();

        PoolStats { initialized, tiers }
    }
}

fn handle_worker_exit(pool: Weak<PoolShared>, tier: Tier, worker_id: u64) {
    let Some(pool) = pool.upgrade() else {
        return;
    };

    let removed = {
        let mut state = pool.lock();
        let workers = &mut state.tier_mut(tier).workers;
        workers
            .iter()
            .position(|worker| worker.id == worker_id)
            .map(|index| workers.remove(index))
    };

    if let Some(worker) = removed {
        process_warn!(
            ProcessId::worker(tier, worker_id),
            "⚠️ Worker removed after exit ({} requests served)",
            worker.request_count
        );
    }

    pool.dispatch(tier);
}

async fn run_assignment(pool: Arc<PoolShared>, assignment: Assignment) {
    let Assignment {
        tier,
        worker_id,
        link,
        request,
    } = assignment;
    let (id, payload, responder) = request.into_parts();

    let outcome = exchange(&link, tier, id, payload).await;
    if let Err(err) = &outcome {
        process_debug!(ProcessId::worker(tier, worker_id), "Request {} failed: {}", id, err);
    }
    let _ = responder.send(outcome);

    pool.release(tier, worker_id);
}

/// Write one request frame and wait for the matching response
async fn exchange(link: &WorkerLink, tier: Tier, id: Uuid, payload: Value) -> PoolResult<Value> {
    let response = link.register(id);

    if let Err(err) = link.write_request(&WorkerRequest::optimize(id, payload, tier)).await {
        link.forget(id);
        return Err(PoolError::WorkerProcess {
            tier,
            message: link.describe_failure(&format!("failed to send request: {err}")),
        });
    }

    match tokio::time::timeout(tier.timeout(), response).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(PoolError::WorkerProcess {
            tier,
            message: link.describe_failure("worker went away"),
        }),
        Err(_) => {
            // a late response for this id is dropped by the reader
            link.forget(id);
            Err(PoolError::WorkerTimeout {
                tier,
                timeout: tier.timeout(),
                stderr: link.stderr_tail(),
            })
        }
    }
}

#[async_trait::async_trait]
impl ProcessPool for WorkerPool {
    fn initialize(&self) {
        self.shared.initialize();
    }

    async fn submit(&self, job: OptimizeJob, tier: Tier) -> PoolResult<Value> {
        self.shared.initialize();

        let payload = serde_json::to_value(&job)?;
        let (request, mut response) = PendingRequest::new(tier, payload);
        let id = request.id;
        let deadline = request.queue_deadline();

        self.shared.lock().tier_mut(tier).queue.push(request);
        self.shared.dispatch(tier);

        let outcome = match tokio::time::timeout_at(deadline, &mut response).await {
            Ok(outcome) => outcome,
            Err(_) => match self.shared.withdraw(tier, id) {
                Some(_) => {
                    process_warn!(ProcessId::Pool, "⏱️ Request {} expired while queued for {}", id, tier);
                    return Err(PoolError::QueueTimeout {
                        tier,
                        waited: tier.timeout(),
                    });
                }
                // already assigned; the assignment timer decides
                None => response.await,
            },
        };

        outcome.unwrap_or_else(|_| {
            Err(PoolError::WorkerProcess {
                tier,
                message: "request dropped before completion".to_string(),
            })
        })
    }

    fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    async fn shutdown(&self) {
        let (workers, queued) = {
            let mut state = self.shared.lock();
            state.initialized = false;
            let mut workers = Vec::new();
            let mut queued = Vec::new();
            for tier_state in state.tiers.values_mut() {
                workers.append(&mut tier_state.workers);
                queued.extend(tier_state.queue.drain());
            }
            (workers, queued)
        };

        process_info!(
            ProcessId::Pool,
            "🛑 Shutting down Python process pool ({} workers, {} queued)",
            workers.len(),
            queued.len()
        );

        for request in queued {
            let _ = request.complete(Err(PoolError::ShutDown));
        }

        let links: Vec<Arc<WorkerLink>> = workers.iter().map(|worker| Arc::clone(&worker.link)).collect();
        // dropping the handles signals every worker at once
        drop(workers);

        for link in links {
            link.wait_terminated(self.shared.grace + Duration::from_secs(1)).await;
        }

        process_info!(ProcessId::Pool, "✅ Python process pool shut down");
    }
}
