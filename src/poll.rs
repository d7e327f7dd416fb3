use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("condition not met after {elapsed:?} (limit {timeout:?})")]
pub struct TimeoutError {
    pub elapsed: Duration,
    pub timeout: Duration,
}

/// A bounded, fixed-cadence blocking wait for an external condition.
/// There is no backoff growth; the interval between checks is constant.
pub struct Poller {
    interval: Duration,
    timeout: Duration,
}

impl Poller {
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout,
        }
    }

    pub fn with_interval(timeout: Duration, interval: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Evaluate `predicate` until it reports true, or fail once the
    /// elapsed time since the first evaluation reaches the timeout.
    /// Predicate errors propagate immediately.
    pub fn wait_until<E, F>(&self, mut predicate: F) -> Result<(), E>
    where
        E: From<TimeoutError>,
        F: FnMut() -> Result<bool, E>,
    {
        let started = Instant::now();
        loop {
            if predicate()? {
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(TimeoutError {
                    elapsed,
                    timeout: self.timeout,
                }
                .into());
            }
            std::thread::sleep(self.interval);
        }
    }
}

/// One row of `kubectl get pods`, rebuilt from scratch on every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub status: String,
}

/// Parse the tabular pod listing (NAME READY STATUS RESTARTS AGE).
/// The first line is the column header.
pub fn parse_pods(stdout: &str) -> Vec<PodRecord> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            Some(PodRecord {
                name: (*columns.first()?).to_string(),
                status: (*columns.get(2)?).to_string(),
            })
        })
        .collect()
}

/// The first pod whose name contains `needle`. Scheduler-generated pod
/// names carry the workload name as a prefix, so a substring test finds
/// them; with several replicas only the first row is inspected.
pub fn first_matching<'a>(pods: &'a [PodRecord], needle: &str) -> Option<&'a PodRecord> {
    pods.iter().find(|pod| pod.name.contains(needle))
}
