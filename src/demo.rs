//! A synthetic workload for trying out configurations.
//!
//! A few workers record into a small tree of monitors:
//!
//! ```text
//! demo
//! ├── requests        counter, one per iteration
//! ├── errors          counter, every tenth iteration
//! ├── db.query        stopwatch, synthetic 1-7 ms latencies
//! └── workerN.task    stopwatch per worker, real splits
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use watchtree_core::purger::{IncrementalPurger, TokioScheduler};
use watchtree_core::{utils, Manager, MonitorError, Sample};

/// Number of concurrent workers.
pub const WORKERS: u64 = 4;

/// Result of one demo run.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub iterations: u64,
    pub elapsed_ms: u64,
    /// Samples of every tracked monitor, sorted by name.
    pub samples: Vec<Sample>,
    /// Plain-text dump of the tree.
    pub tree: Option<String>,
}

/// Synthetic latency for iteration `i`, in nanoseconds.
fn synthetic_latency(i: u64) -> u64 {
    (i % 7 + 1) * 1_000_000
}

async fn worker(manager: Arc<dyn Manager>, id: u64, iterations: u64) -> Result<(), MonitorError> {
    let task = manager.stopwatch(&format!("demo.worker{}.task", id))?;
    let requests = manager.counter("demo.requests")?;
    let errors = manager.counter("demo.errors")?;
    let query = manager.stopwatch("demo.db.query")?;

    for i in (id..iterations).step_by(WORKERS as usize) {
        let split = task.start();
        requests.increase();
        query.add_time(synthetic_latency(i));
        if i % 10 == 9 {
            errors.increase();
        }
        tokio::task::yield_now().await;
        split.stop();
    }
    Ok(())
}

/// Runs `iterations` units of work spread over [`WORKERS`] tasks on the
/// current runtime, with an incremental purger running alongside.
pub async fn run(manager: Arc<dyn Manager>, iterations: u64) -> anyhow::Result<DemoReport> {
    let started = Instant::now();
    let purger = TokioScheduler::current().map(|scheduler| {
        IncrementalPurger::with_scheduler(manager.clone(), Arc::new(scheduler))
    });
    if let Some(purger) = &purger {
        purger.start(Duration::from_secs(1))?;
    }

    let handles: Vec<_> = (0..WORKERS)
        .map(|id| tokio::spawn(worker(manager.clone(), id, iterations)))
        .collect();
    for handle in handles {
        handle.await??;
    }

    if let Some(purger) = &purger {
        purger.cancel()?;
    }
    manager.message(&format!("Demo finished after {} iterations", iterations));
    tracing::info!(iterations, "Demo workload finished");

    let samples = manager
        .monitors(&|_| true)
        .iter()
        .map(|monitor| monitor.sample())
        .collect();
    Ok(DemoReport {
        iterations,
        elapsed_ms: started.elapsed().as_millis() as u64,
        samples,
        tree: utils::tree_string(manager.root_monitor().as_monitor()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchtree_core::{EnabledManager, MonitorState};

    fn named<'a>(report: &'a DemoReport, name: &str) -> &'a Sample {
        report
            .samples
            .iter()
            .find(|s| s.name() == Some(name))
            .unwrap()
    }

    #[tokio::test]
    async fn records_every_iteration() {
        let manager = Arc::new(EnabledManager::new());
        let report = run(manager, 40).await.unwrap();

        let requests = named(&report, "demo.requests").as_counter().unwrap();
        assert_eq!(requests.counter, 40);
        let errors = named(&report, "demo.errors").as_counter().unwrap();
        assert_eq!(errors.counter, 4);

        let query = named(&report, "demo.db.query").as_stopwatch().unwrap();
        assert_eq!(query.counter, 40);
        assert_eq!(query.min, 1_000_000);
        assert_eq!(query.max, 7_000_000);

        let task = named(&report, "demo.worker0.task").as_stopwatch().unwrap();
        assert_eq!(task.counter, 10);
        assert_eq!(task.active, 0);
        assert!(report.tree.unwrap().contains("requests(+)"));
    }

    #[tokio::test]
    async fn disabled_subtree_stays_empty() {
        let manager = Arc::new(EnabledManager::new());
        manager
            .counter("demo.requests")
            .unwrap()
            .set_state(MonitorState::Disabled, false);

        let report = run(manager, 8).await.unwrap();
        let requests = named(&report, "demo.requests").as_counter().unwrap();
        assert_eq!(requests.counter, 0);
    }

    #[tokio::test]
    async fn config_document_disables_matching_monitors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.yaml");
        std::fs::write(&path, "monitors:\n  - pattern: \"demo.db.*\"\n    state: disabled\n")
            .unwrap();

        let manager = Arc::new(EnabledManager::new());
        assert!(crate::settings::configure(manager.as_ref(), &path));
        let report = run(manager, 5).await.unwrap();

        let query = named(&report, "demo.db.query").as_stopwatch().unwrap();
        assert_eq!(query.counter, 0);
        assert!(report.tree.unwrap().contains("query(-)"));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = DemoReport {
            iterations: 0,
            elapsed_ms: 0,
            samples: Vec::new(),
            tree: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["iterations"], 0);
        assert!(json["samples"].as_array().unwrap().is_empty());
    }
}
