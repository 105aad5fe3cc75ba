//! Worker pool tests against real script worker processes

mod common;

use common::{TestFixtures, TestHelpers};
use futures_util::future::join_all;
use pool::{PoolError, ProcessPool};
use shared::Tier;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_first_basic_job_spawns_one_worker() {
    let pool = TestHelpers::pool(TestFixtures::ECHO_WORKER);

    let result = pool
        .submit(TestFixtures::job("a@b.com").with_plan(Tier::Basic), Tier::Basic)
        .await
        .unwrap();

    assert_eq!(result["optimizedCV"], "<p>a@b.com</p>");
    assert_eq!(result["served"], 1);

    let settled = TestHelpers::wait_for(SETTLE, || {
        let stats = pool.stats();
        let basic = stats.tier(Tier::Basic).unwrap();
        basic.workers == 1 && basic.idle == 1
    })
    .await;
    assert!(settled, "basic tier should hold exactly one idle worker");

    pool.shutdown().await;
}

#[tokio::test]
async fn test_initialize_prewarms_premium_only_once() {
    let pool = TestHelpers::pool(TestFixtures::ECHO_WORKER);

    pool.initialize();
    pool.initialize();

    let stats = pool.stats();
    assert!(stats.initialized);
    assert_eq!(stats.tier(Tier::Premium).unwrap().workers, 2);
    assert_eq!(stats.tier(Tier::Gold).unwrap().workers, 0);
    assert_eq!(stats.tier(Tier::Basic).unwrap().workers, 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_prewarmed_premium_workers_serve_immediately() {
    let pool = TestHelpers::pool_with_delay(TestFixtures::ECHO_WORKER, "0.3");
    pool.initialize();
    let prewarmed: HashSet<u32> = pool.worker_pids(Tier::Premium).into_iter().collect();

    let results = join_all((0..2).map(|n| pool.submit(TestFixtures::job_for(Tier::Premium, n), Tier::Premium))).await;

    let served_by: HashSet<u64> = results
        .iter()
        .map(|result| result.as_ref().unwrap()["worker"].as_u64().unwrap())
        .collect();
    assert_eq!(served_by.len(), 2, "both jobs run in parallel on different workers");
    assert!(served_by.iter().all(|pid| prewarmed.contains(&(*pid as u32))));
    assert_eq!(pool.stats().tier(Tier::Premium).unwrap().workers, 2);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_premium_cap_queues_the_sixth_job() {
    let pool = TestHelpers::pool_with_delay(TestFixtures::ECHO_WORKER, "0.3");

    let results = join_all((0..6).map(|n| pool.submit(TestFixtures::job_for(Tier::Premium, n), Tier::Premium))).await;

    let mut per_worker = std::collections::HashMap::<u64, u64>::new();
    for result in &results {
        let value = result.as_ref().unwrap();
        *per_worker.entry(value["worker"].as_u64().unwrap()).or_default() += 1;
    }
    assert_eq!(per_worker.len(), 5);
    assert_eq!(per_worker.values().max(), Some(&2));
    assert_eq!(pool.stats().tier(Tier::Premium).unwrap().workers, 5);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_busy_workers_never_exceed_tier_cap() {
    let pool = Arc::new(TestHelpers::pool_with_delay(TestFixtures::ECHO_WORKER, "0.5"));

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(TestFixtures::job_for(Tier::Gold, n), Tier::Gold).await })
        })
        .collect();

    let mut peak_busy = 0;
    let mut saw_queue = false;
    for _ in 0..40 {
        let stats = pool.stats();
        let gold = stats.tier(Tier::Gold).unwrap();
        assert!(gold.workers <= Tier::Gold.max_workers());
        assert!(gold.busy <= Tier::Gold.max_workers());
        peak_busy = peak_busy.max(gold.busy);
        saw_queue |= gold.queued > 0;
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(peak_busy, 3);
    assert!(saw_queue);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_responses_reach_their_own_callers() {
    let pool = TestHelpers::pool_with_delay(TestFixtures::ECHO_WORKER, "0.05");

    let jobs: Vec<_> = (0..12).map(|n| TestFixtures::job_for(Tier::Premium, n)).collect();
    let results = join_all(jobs.iter().cloned().map(|job| pool.submit(job, Tier::Premium))).await;

    for (job, result) in jobs.iter().zip(results) {
        assert_eq!(result.unwrap()["email"], job.email.as_str());
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn test_single_worker_serves_queue_in_submission_order() {
    let pool = TestHelpers::pool(TestFixtures::ECHO_WORKER);

    let jobs: Vec<_> = (0..5).map(|n| TestFixtures::job_for(Tier::Basic, n)).collect();
    let results = join_all(jobs.iter().cloned().map(|job| pool.submit(job, Tier::Basic))).await;

    let order: Vec<u64> = results
        .iter()
        .map(|result| result.as_ref().unwrap()["served"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_fragmented_output_is_reassembled() {
    let pool = TestHelpers::pool(TestFixtures::FRAGMENTED_WORKER);

    let result = pool.submit(TestFixtures::job("a@b.com"), Tier::Gold).await.unwrap();

    assert_eq!(result["optimizedCV"], "<p>fragmented</p>");
    assert_eq!(result["atsScore"], 90);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_worker_retires_after_request_threshold() {
    let pool = TestHelpers::pool(TestFixtures::ECHO_WORKER).with_retire_after(2);

    let mut pids = Vec::new();
    for n in 0..4 {
        let result = pool.submit(TestFixtures::job_for(Tier::Basic, n), Tier::Basic).await.unwrap();
        pids.push(result["worker"].as_u64().unwrap());
    }

    assert_eq!(pids[0], pids[1]);
    assert_eq!(pids[1], pids[2]);
    assert_ne!(pids[2], pids[3], "a worker past the threshold is not reused");

    pool.shutdown().await;
}

#[tokio::test]
async fn test_worker_reported_error_keeps_worker() {
    let pool = TestHelpers::pool(TestFixtures::ERROR_WORKER);

    let err = pool.submit(TestFixtures::job("a@b.com"), Tier::Basic).await.unwrap_err();
    assert!(matches!(&err, PoolError::WorkerReported { message, .. } if message == "model failed"));
    let first = pool.worker_pids(Tier::Basic);

    let _ = pool.submit(TestFixtures::job("a@b.com"), Tier::Basic).await;
    assert_eq!(pool.worker_pids(Tier::Basic), first);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_crashed_worker_rejects_and_is_removed() {
    let pool = TestHelpers::pool(TestFixtures::CRASH_WORKER);

    let err = pool.submit(TestFixtures::job("a@b.com"), Tier::Basic).await.unwrap_err();
    assert!(matches!(err, PoolError::WorkerProcess { tier: Tier::Basic, .. }), "{err}");
    assert!(!err.is_timeout());

    let removed = TestHelpers::wait_for(SETTLE, || pool.stats().tier(Tier::Basic).unwrap().workers == 0).await;
    assert!(removed);

    // freed capacity is reused by the next request
    let err = pool.submit(TestFixtures::job("a@b.com"), Tier::Basic).await.unwrap_err();
    assert!(matches!(err, PoolError::WorkerProcess { .. }));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_spawn_failure_rejects_queued_requests() {
    let pool = pool::WorkerPool::new(pool::WorkerCommand::new("/nonexistent/cv-worker", Vec::<String>::new()));

    let results = join_all((0..3).map(|n| pool.submit(TestFixtures::job_for(Tier::Gold, n), Tier::Gold))).await;

    for result in results {
        assert!(matches!(result, Err(PoolError::SpawnFailed { tier: Tier::Gold, .. })));
    }
    assert_eq!(pool.stats().total_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_worker_times_out_and_is_released() {
    let pool = TestHelpers::pool(TestFixtures::SILENT_WORKER);

    let started = tokio::time::Instant::now();
    let err = pool.submit(TestFixtures::job("a@b.com"), Tier::Gold).await.unwrap_err();

    assert!(matches!(err, PoolError::WorkerTimeout { tier: Tier::Gold, .. }), "{err}");
    assert!(started.elapsed() >= Tier::Gold.timeout());
    assert!(err.to_string().contains("timeout"));

    let released = TestHelpers::wait_for(SETTLE, || pool.stats().tier(Tier::Gold).unwrap().idle == 1).await;
    assert!(released, "timed-out worker returns to the idle set");
    let pids = pool.worker_pids(Tier::Gold);

    let err = pool.submit(TestFixtures::job("a@b.com"), Tier::Gold).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(pool.worker_pids(Tier::Gold), pids, "the same worker is reused");

    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_answer_never_reaches_the_next_request() {
    let pool = TestHelpers::pool_with_delay(TestFixtures::SLOW_FIRST_WORKER, "1");

    let err = pool
        .submit(TestFixtures::job_for(Tier::Basic, 1), Tier::Basic)
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::WorkerTimeout { tier: Tier::Basic, .. }), "{err}");

    // the stale answer is still in flight on the worker's stdout
    tokio::time::resume();
    let released = TestHelpers::wait_for(SETTLE, || pool.stats().tier(Tier::Basic).unwrap().idle == 1).await;
    assert!(released);

    let second = pool
        .submit(TestFixtures::job_for(Tier::Basic, 2), Tier::Basic)
        .await
        .unwrap();
    assert_eq!(second["email"], "user2@example.com");
    assert_eq!(second["served"], 2);
    assert_eq!(pool.stats().tier(Tier::Basic).unwrap().workers, 1);

    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_request_queued_behind_stuck_worker_times_out() {
    let pool = TestHelpers::pool(TestFixtures::SILENT_WORKER);

    let (first, second) = tokio::join!(
        pool.submit(TestFixtures::job_for(Tier::Basic, 1), Tier::Basic),
        pool.submit(TestFixtures::job_for(Tier::Basic, 2), Tier::Basic),
    );

    assert!(matches!(first, Err(PoolError::WorkerTimeout { .. })));
    assert!(second.unwrap_err().is_timeout());
    assert_eq!(pool.stats().tier(Tier::Basic).unwrap().queued, 0);

    pool.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_terminates_every_worker() {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let pool = Arc::new(TestHelpers::pool(TestFixtures::SILENT_WORKER));
    pool.initialize();

    let in_flight = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit(TestFixtures::job_for(Tier::Basic, 1), Tier::Basic).await })
    };
    let queued = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit(TestFixtures::job_for(Tier::Basic, 2), Tier::Basic).await })
    };
    let settled = TestHelpers::wait_for(SETTLE, || {
        let stats = pool.stats();
        let basic = stats.tier(Tier::Basic).unwrap();
        basic.busy == 1 && basic.queued == 1
    })
    .await;
    assert!(settled);

    let pids: Vec<u32> = Tier::ALL.into_iter().flat_map(|tier| pool.worker_pids(tier)).collect();
    assert_eq!(pids.len(), 3);

    pool.shutdown().await;

    let stats = pool.stats();
    assert!(!stats.initialized);
    assert_eq!(stats.total_workers(), 0);
    assert!(stats.tiers.iter().all(|tier| tier.queued == 0));

    for pid in pids {
        assert_eq!(kill(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH), "pid {pid} survived shutdown");
    }

    assert!(matches!(queued.await.unwrap(), Err(PoolError::ShutDown)));
    assert!(matches!(in_flight.await.unwrap(), Err(PoolError::WorkerProcess { .. })));
}
