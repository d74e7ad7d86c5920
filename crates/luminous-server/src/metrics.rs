// ============================================
// File: crates/luminous-server/src/metrics.rs
// ============================================
//! # Metrics Sink
//!
//! ## Creation Reason
//! The registry and stream handler report *what* changed about a node;
//! how that is stored or exported is behind the `MetricsSink` trait.
//!
//! ## Main Functionality
//! - `MetricsSink`: the five node notifications
//! - `PrometheusMetrics`: records through the `metrics` facade
//! - `RecordingMetrics`: keeps every notification in memory (tests)
//! - `install_exporter`: Prometheus scrape endpoint
//!
//! ## Series
//! ```text
//! luminous_mesh_nodes_total{state}
//! luminous_mesh_node_status{node_id,hostname,state}
//! luminous_mesh_node_cpu_usage{node_id,hostname}
//! luminous_mesh_node_memory_usage_bytes{node_id,hostname}
//! luminous_mesh_node_disk_usage_bytes{node_id,hostname}
//! luminous_mesh_node_active_tasks{node_id,hostname}
//! luminous_mesh_node_completed_tasks_total{node_id,hostname}
//! luminous_mesh_node_failed_tasks_total{node_id,hostname}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Samples carry `Option`s: a value absent from a status update must
//!   leave the series untouched, not reset it to zero
//! - The facade cannot delete series; removal zeroes them instead
//!
//! ## Last Modified
//! v0.1.0 - Initial metrics sink

use std::net::SocketAddr;

use dashmap::DashMap;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use parking_lot::Mutex;
use tracing::info;

use crate::error::{Result, ServerError};

const NODES_TOTAL: &str = "luminous_mesh_nodes_total";
const NODE_STATUS: &str = "luminous_mesh_node_status";
const NODE_CPU: &str = "luminous_mesh_node_cpu_usage";
const NODE_MEMORY: &str = "luminous_mesh_node_memory_usage_bytes";
const NODE_DISK: &str = "luminous_mesh_node_disk_usage_bytes";
const NODE_ACTIVE_TASKS: &str = "luminous_mesh_node_active_tasks";
const NODE_COMPLETED_TASKS: &str = "luminous_mesh_node_completed_tasks_total";
const NODE_FAILED_TASKS: &str = "luminous_mesh_node_failed_tasks_total";

// ============================================
// Samples
// ============================================

/// Resource usage reported in one status update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    /// CPU usage percentage.
    pub cpu: Option<f64>,
    /// Memory usage.
    pub memory: Option<f64>,
    /// Disk usage.
    pub disk: Option<f64>,
}

impl ResourceSample {
    /// Returns `true` if nothing was reported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none() && self.disk.is_none()
    }
}

/// Task counters reported in one status update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaskSample {
    /// Tasks currently running.
    pub active: Option<f64>,
    /// Tasks completed since the last report.
    pub completed: Option<u64>,
    /// Tasks failed since the last report.
    pub failed: Option<u64>,
}

impl TaskSample {
    /// Returns `true` if nothing was reported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.active.is_none() && self.completed.is_none() && self.failed.is_none()
    }
}

// ============================================
// MetricsSink Trait
// ============================================

/// Side-effect-only notifications about nodes.
pub trait MetricsSink: Send + Sync {
    /// A node reported a new operational state.
    fn update_node_status(&self, node_id: &str, hostname: &str, state: &str);

    /// A node reported resource usage.
    fn update_node_resources(&self, node_id: &str, hostname: &str, sample: &ResourceSample);

    /// A node reported task counters.
    fn update_node_tasks(&self, node_id: &str, hostname: &str, sample: &TaskSample);

    /// A node is gone; drop its per-node series.
    fn remove_node_metrics(&self, node_id: &str, hostname: &str);

    /// Number of nodes currently in `state`.
    fn update_node_count(&self, state: &str, count: usize);
}

// ============================================
// PrometheusMetrics
// ============================================

/// Sink recording through the global `metrics` recorder.
#[derive(Debug, Default)]
pub struct PrometheusMetrics {
    /// Last `(hostname, state)` labels per node, so the previous status
    /// series can be cleared even after a hostname change.
    last_state: DashMap<String, (String, String)>,
}

impl PrometheusMetrics {
    /// Creates the sink and registers series descriptions.
    #[must_use]
    pub fn new() -> Self {
        describe_gauge!(NODES_TOTAL, "Total number of nodes in the mesh");
        describe_gauge!(NODE_STATUS, "Current status of nodes");
        describe_gauge!(NODE_CPU, "CPU usage percentage by node");
        describe_gauge!(NODE_MEMORY, "Memory usage in bytes by node");
        describe_gauge!(NODE_DISK, "Disk usage in bytes by node");
        describe_gauge!(NODE_ACTIVE_TASKS, "Number of active tasks by node");
        describe_counter!(NODE_COMPLETED_TASKS, "Total number of completed tasks by node");
        describe_counter!(NODE_FAILED_TASKS, "Total number of failed tasks by node");
        Self::default()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn update_node_status(&self, node_id: &str, hostname: &str, state: &str) {
        let previous = self
            .last_state
            .insert(node_id.to_string(), (hostname.to_string(), state.to_string()));

        if let Some((old_hostname, old_state)) =
            previous.filter(|(h, s)| h != hostname || s != state)
        {
            gauge!(NODE_STATUS, "node_id" => node_id.to_string(), "hostname" => old_hostname, "state" => old_state)
                .set(0.0);
        }
        gauge!(NODE_STATUS, "node_id" => node_id.to_string(), "hostname" => hostname.to_string(), "state" => state.to_string())
            .set(1.0);
    }

    fn update_node_resources(&self, node_id: &str, hostname: &str, sample: &ResourceSample) {
        let series = [(NODE_CPU, sample.cpu), (NODE_MEMORY, sample.memory), (NODE_DISK, sample.disk)];
        for (name, value) in series {
            if let Some(value) = value {
                gauge!(name, "node_id" => node_id.to_string(), "hostname" => hostname.to_string())
                    .set(value);
            }
        }
    }

    fn update_node_tasks(&self, node_id: &str, hostname: &str, sample: &TaskSample) {
        if let Some(active) = sample.active {
            gauge!(NODE_ACTIVE_TASKS, "node_id" => node_id.to_string(), "hostname" => hostname.to_string())
                .set(active);
        }
        if let Some(completed) = sample.completed {
            counter!(NODE_COMPLETED_TASKS, "node_id" => node_id.to_string(), "hostname" => hostname.to_string())
                .increment(completed);
        }
        if let Some(failed) = sample.failed {
            counter!(NODE_FAILED_TASKS, "node_id" => node_id.to_string(), "hostname" => hostname.to_string())
                .increment(failed);
        }
    }

    fn remove_node_metrics(&self, node_id: &str, hostname: &str) {
        if let Some((_, (last_hostname, state))) = self.last_state.remove(node_id) {
            gauge!(NODE_STATUS, "node_id" => node_id.to_string(), "hostname" => last_hostname, "state" => state)
                .set(0.0);
        }
        for name in [NODE_CPU, NODE_MEMORY, NODE_DISK, NODE_ACTIVE_TASKS] {
            gauge!(name, "node_id" => node_id.to_string(), "hostname" => hostname.to_string()).set(0.0);
        }
    }

    fn update_node_count(&self, state: &str, count: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!(NODES_TOTAL, "state" => state.to_string()).set(count as f64);
    }
}

/// Installs the global recorder and serves `/metrics` on `addr`.
///
/// # Errors
/// Returns `StartupFailed` if the recorder or listener cannot be set up.
pub fn install_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ServerError::startup_failed(format!("metrics exporter: {e}")))?;

    info!(listen_addr = %addr, "Prometheus exporter listening");
    Ok(())
}

// ============================================
// RecordingMetrics
// ============================================

/// One notification received by [`RecordingMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    /// `update_node_status`
    Status {
        /// Node id
        node_id: String,
        /// Hostname label
        hostname: String,
        /// State label
        state: String,
    },
    /// `update_node_resources`
    Resources {
        /// Node id
        node_id: String,
        /// Reported values
        sample: ResourceSample,
    },
    /// `update_node_tasks`
    Tasks {
        /// Node id
        node_id: String,
        /// Reported values
        sample: TaskSample,
    },
    /// `remove_node_metrics`
    Removed {
        /// Node id
        node_id: String,
    },
    /// `update_node_count`
    Count {
        /// State label
        state: String,
        /// Nodes in that state
        count: usize,
    },
}

/// Sink that remembers every notification, for tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the notifications received so far.
    #[must_use]
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn update_node_status(&self, node_id: &str, hostname: &str, state: &str) {
        self.events.lock().push(MetricEvent::Status {
            node_id: node_id.to_string(),
            hostname: hostname.to_string(),
            state: state.to_string(),
        });
    }

    fn update_node_resources(&self, node_id: &str, _hostname: &str, sample: &ResourceSample) {
        self.events.lock().push(MetricEvent::Resources {
            node_id: node_id.to_string(),
            sample: *sample,
        });
    }

    fn update_node_tasks(&self, node_id: &str, _hostname: &str, sample: &TaskSample) {
        self.events.lock().push(MetricEvent::Tasks {
            node_id: node_id.to_string(),
            sample: *sample,
        });
    }

    fn remove_node_metrics(&self, node_id: &str, _hostname: &str) {
        self.events.lock().push(MetricEvent::Removed {
            node_id: node_id.to_string(),
        });
    }

    fn update_node_count(&self, state: &str, count: usize) {
        self.events.lock().push(MetricEvent::Count {
            state: state.to_string(),
            count,
        });
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Value of the first rendered line starting with `series` and containing `needle`.
    fn rendered_value(rendered: &str, series: &str, needle: &str) -> f64 {
        let line = rendered
            .lines()
            .find(|l| l.starts_with(series) && l.contains(needle))
            .unwrap();
        line.rsplit(' ').next().unwrap().parse().unwrap()
    }

    #[test]
    fn test_sample_emptiness() {
        assert!(ResourceSample::default().is_empty());
        assert!(!ResourceSample {
            disk: Some(1.0),
            ..Default::default()
        }
        .is_empty());
        assert!(TaskSample::default().is_empty());
    }

    #[test]
    fn test_prometheus_rendering() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let sink = PrometheusMetrics::new();
            sink.update_node_count("NODE_STATE_RUNNING", 3);
            sink.update_node_status("n1", "host-a", "NODE_STATE_RUNNING");
            sink.update_node_resources(
                "n1",
                "host-a",
                &ResourceSample {
                    cpu: Some(42.5),
                    ..Default::default()
                },
            );
            sink.update_node_tasks(
                "n1",
                "host-a",
                &TaskSample {
                    completed: Some(7),
                    ..Default::default()
                },
            );
        });

        let rendered = handle.render();
        assert_eq!(rendered_value(&rendered, NODES_TOTAL, "NODE_STATE_RUNNING"), 3.0);
        assert_eq!(rendered_value(&rendered, NODE_CPU, "host-a"), 42.5);
        assert_eq!(rendered_value(&rendered, NODE_COMPLETED_TASKS, "host-a"), 7.0);
        // Only CPU was reported
        assert!(!rendered.contains("luminous_mesh_node_memory_usage_bytes{"));
    }

    #[test]
    fn test_state_change_clears_previous_state() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let sink = PrometheusMetrics::new();
            sink.update_node_status("n1", "host-a", "NODE_STATE_STARTING");
            sink.update_node_status("n1", "host-a", "NODE_STATE_RUNNING");
        });

        let rendered = handle.render();
        assert_eq!(rendered_value(&rendered, NODE_STATUS, "NODE_STATE_STARTING"), 0.0);
        assert_eq!(rendered_value(&rendered, NODE_STATUS, "NODE_STATE_RUNNING"), 1.0);
    }

    #[test]
    fn test_hostname_change_clears_previous_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let sink = PrometheusMetrics::new();
            sink.update_node_status("n1", "host-a", "NODE_STATE_RUNNING");
            sink.update_node_status("n1", "host-b", "NODE_STATE_RUNNING");
        });

        let rendered = handle.render();
        assert_eq!(rendered_value(&rendered, NODE_STATUS, "\"host-a\""), 0.0);
        assert_eq!(rendered_value(&rendered, NODE_STATUS, "\"host-b\""), 1.0);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingMetrics::new();
        sink.update_node_count("NODE_STATE_RUNNING", 2);
        sink.remove_node_metrics("n1", "host-a");

        assert_eq!(
            sink.events(),
            vec![
                MetricEvent::Count {
                    state: "NODE_STATE_RUNNING".into(),
                    count: 2
                },
                MetricEvent::Removed {
                    node_id: "n1".into()
                },
            ]
        );
    }
}
