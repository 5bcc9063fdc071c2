//! Stress command implementation.

use super::Format;
use kvmux_core::{Client, ClientConfig, ConnectionStats};
use kvmux_testkit::{
    stress_concurrent_mixed, stress_pipelined_puts, stress_search, stress_sequential_puts,
    MemoryCluster, MemoryEngine, StressConfig, StressTestResult, STRESS_SPACE,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Options for a stress session.
#[derive(Debug, Clone)]
pub struct StressOptions {
    /// Operations per run.
    pub operations: usize,
    /// Submitting threads for the concurrent run.
    pub threads: usize,
    /// Connections in the client pool.
    pub workers: usize,
    /// Distinct keys.
    pub keys: usize,
    /// Operations in flight for the pipelined run.
    pub depth: usize,
    /// Completion shuffling seed.
    pub shuffle: Option<u64>,
}

/// One named run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Run name.
    pub name: &'static str,
    /// Outcome.
    #[serde(flatten)]
    pub result: StressTestResult,
}

/// Multiplexer counters after every run.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Requests the engine accepted.
    pub submitted: u64,
    /// Requests the engine refused.
    pub rejected: u64,
    /// Completions delivered to a pending operation.
    pub completions: u64,
    /// Completions whose id was not pending.
    pub orphaned: u64,
    /// Polls that reported nothing.
    pub idle_polls: u64,
    /// Operations still pending.
    pub pending: u64,
}

impl From<ConnectionStats> for StatsReport {
    fn from(stats: ConnectionStats) -> Self {
        Self {
            submitted: stats.submitted,
            rejected: stats.rejected,
            completions: stats.completions,
            orphaned: stats.orphaned,
            idle_polls: stats.idle_polls,
            pending: stats.pending,
        }
    }
}

/// Full stress session output.
#[derive(Debug, Serialize)]
pub struct StressReport {
    /// Connections in the pool.
    pub workers: usize,
    /// Completion shuffling seed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<u64>,
    /// Runs in execution order.
    pub runs: Vec<RunReport>,
    /// Pool counters.
    pub stats: StatsReport,
}

/// Runs the stress command.
pub fn run(options: &StressOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let report = execute(options)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("=== Runs ===");
            for run in &report.runs {
                run.result.print_summary(run.name);
            }
            let stats = &report.stats;
            println!("\n=== Multiplexer ===");
            println!("Workers: {}", report.workers);
            println!("Submitted: {}", stats.submitted);
            println!("Rejected: {}", stats.rejected);
            println!("Completions: {}", stats.completions);
            println!("Orphaned: {}", stats.orphaned);
            println!("Idle polls: {}", stats.idle_polls);
            println!("Pending: {}", stats.pending);
        }
    }

    if report.runs.iter().any(|run| run.result.failed_ops > 0) {
        return Err("Some operations failed".into());
    }
    Ok(())
}

/// Opens an in-memory cluster, runs every stress suite and closes the pool.
pub fn execute(options: &StressOptions) -> Result<StressReport, Box<dyn std::error::Error>> {
    let cluster = match options.shuffle {
        Some(seed) => MemoryCluster::shuffled(seed),
        None => MemoryCluster::new(),
    };
    cluster.add_space(STRESS_SPACE)?;

    let config = ClientConfig::default()
        .with_workers(options.workers)
        .with_block_timeout(Duration::from_millis(10));
    let client: Client<MemoryEngine> = Client::connect(&cluster, config)?;
    info!(workers = client.workers(), "connected to in-memory cluster");

    let stress = StressConfig {
        operations: options.operations,
        threads: options.threads,
        keys: options.keys,
        pipeline_depth: options.depth,
    };

    let suites: [(&'static str, fn(&Client<MemoryEngine>, &StressConfig) -> StressTestResult); 4] = [
        ("Sequential puts", stress_sequential_puts),
        ("Pipelined puts", stress_pipelined_puts),
        ("Concurrent mixed", stress_concurrent_mixed),
        ("Search", stress_search),
    ];

    let mut runs = Vec::with_capacity(suites.len());
    for (name, suite) in suites {
        debug!(run = name, "starting");
        let result = suite(&client, &stress);
        info!(
            run = name,
            ops = result.total_ops,
            failed = result.failed_ops,
            "finished"
        );
        runs.push(RunReport { name, result });
    }

    let stats = client.stats();
    client.close();

    Ok(StressReport {
        workers: options.workers,
        shuffle: options.shuffle,
        runs,
        stats: stats.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressOptions {
        StressOptions {
            operations: 200,
            threads: 2,
            workers: 2,
            keys: 20,
            depth: 8,
            shuffle: None,
        }
    }

    #[test]
    fn every_suite_runs_without_failures() {
        let report = execute(&small()).unwrap();
        assert_eq!(report.runs.len(), 4);
        assert!(report.runs.iter().all(|run| run.result.failed_ops == 0));
        assert_eq!(report.stats.pending, 0);
        assert_eq!(report.stats.rejected, 0);
    }

    #[test]
    fn shuffled_session_reports_seed() {
        let report = execute(&StressOptions {
            shuffle: Some(9),
            ..small()
        })
        .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["shuffle"], 9);
        assert_eq!(json["runs"][0]["name"], "Sequential puts");
        assert!(json["runs"][0]["elapsed_ms"].is_number());
    }
}
