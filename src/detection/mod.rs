//! Anomaly detection orchestrator.
//!
//! Maintains an open set of registered detector plugins, fans a packet set
//! out to all of them (or a category subset) on a bounded worker pool, and
//! merges their findings into a single severity-ranked list. A detector
//! that panics contributes nothing and never takes its siblings down.

pub mod detectors;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::DetectionConfig;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord};

/// A pluggable anomaly detector.
///
/// `detect` must be a pure function of its input: no shared mutable state,
/// so the orchestrator is free to run plugins concurrently.
pub trait AnomalyDetector: Send + Sync {
    /// Unique name; the registration dedup key.
    fn name(&self) -> &'static str;

    fn category(&self) -> DetectorCategory;

    /// Cheap applicability pre-check. When false, the orchestrator records
    /// an empty contribution without invoking `detect`.
    fn can_detect(&self, _packets: &[PacketRecord]) -> bool {
        true
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly>;
}

/// Coarse progress emitted after each detector completes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DetectionProgress {
    pub detectors_completed: usize,
    pub total_detectors: usize,
    pub packets_analyzed: u64,
    pub threats_found: u64,
}

/// Explicit progress capability, passed by the caller. Reporting failures
/// are logged and never abort detection.
pub trait ProgressSink: Send + Sync {
    fn on_progress(
        &self,
        progress: DetectionProgress,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Default)]
struct ProgressState {
    packets_analyzed: u64,
    threats_found: u64,
    detectors_completed: usize,
}

/// Composite anomaly-detection orchestrator.
pub struct AnomalyEngine {
    /// Registered detectors; guarded by its own lock, distinct from the
    /// progress lock.
    registry: Mutex<Vec<Arc<dyn AnomalyDetector>>>,
    progress: Mutex<ProgressState>,
    worker_threads: Option<usize>,
}

impl AnomalyEngine {
    pub fn new(config: &DetectionConfig) -> Self {
        AnomalyEngine {
            registry: Mutex::new(Vec::new()),
            progress: Mutex::new(ProgressState::default()),
            worker_threads: config.worker_threads,
        }
    }

    /// Register a detector. Idempotent by name: a second registration under
    /// an existing name is ignored and returns false.
    pub fn register_detector(&self, detector: Arc<dyn AnomalyDetector>) -> bool {
        let mut registry = self.registry.lock();
        if registry.iter().any(|d| d.name() == detector.name()) {
            log::debug!("Detector '{}' already registered", detector.name());
            return false;
        }
        log::info!(
            "Registered detector '{}' ({:?})",
            detector.name(),
            detector.category()
        );
        registry.push(detector);
        true
    }

    /// Remove a detector by name. Returns whether one was removed.
    pub fn unregister_detector(&self, name: &str) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.len();
        registry.retain(|d| d.name() != name);
        registry.len() != before
    }

    pub fn detector_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Run every registered detector over the packet set and return the
    /// merged findings, severity descending then detection time ascending.
    pub fn detect_all(
        &self,
        packets: &[PacketRecord],
        sink: Option<&dyn ProgressSink>,
    ) -> Vec<NetworkAnomaly> {
        let snapshot: Vec<Arc<dyn AnomalyDetector>> = self.registry.lock().clone();
        self.run_detectors(snapshot, packets, sink)
    }

    /// Identical fan-out restricted to detectors of one category.
    pub fn detect_by_category(
        &self,
        packets: &[PacketRecord],
        category: DetectorCategory,
        sink: Option<&dyn ProgressSink>,
    ) -> Vec<NetworkAnomaly> {
        let snapshot: Vec<Arc<dyn AnomalyDetector>> = self
            .registry
            .lock()
            .iter()
            .filter(|d| d.category() == category)
            .cloned()
            .collect();
        self.run_detectors(snapshot, packets, sink)
    }

    /// Current run's progress counters.
    pub fn progress(&self) -> DetectionProgress {
        let state = self.progress.lock();
        DetectionProgress {
            detectors_completed: state.detectors_completed,
            total_detectors: self.registry.lock().len(),
            packets_analyzed: state.packets_analyzed,
            threats_found: state.threats_found,
        }
    }

    fn run_detectors(
        &self,
        detectors: Vec<Arc<dyn AnomalyDetector>>,
        packets: &[PacketRecord],
        sink: Option<&dyn ProgressSink>,
    ) -> Vec<NetworkAnomaly> {
        let total = detectors.len();
        *self.progress.lock() = ProgressState::default();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = unbounded::<Arc<dyn AnomalyDetector>>();
        for detector in detectors {
            let _ = job_tx.send(detector);
        }
        drop(job_tx);

        let workers = self
            .worker_threads
            .or_else(|| std::thread::available_parallelism().map(|n| n.get()).ok())
            .unwrap_or(4)
            .clamp(1, total);

        let findings: Mutex<Vec<NetworkAnomaly>> = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let findings = &findings;
                scope.spawn(move || {
                    while let Ok(detector) = job_rx.recv() {
                        let contribution = run_isolated(detector.as_ref(), packets);
                        let found = contribution.len();
                        findings.lock().extend(contribution);

                        let progress = {
                            let mut state = self.progress.lock();
                            state.detectors_completed += 1;
                            state.packets_analyzed += packets.len() as u64;
                            state.threats_found += found as u64;
                            DetectionProgress {
                                detectors_completed: state.detectors_completed,
                                total_detectors: total,
                                packets_analyzed: state.packets_analyzed,
                                threats_found: state.threats_found,
                            }
                        };
                        if let Some(sink) = sink {
                            if let Err(e) = sink.on_progress(progress) {
                                log::debug!("Progress sink failed: {}", e);
                            }
                        }
                    }
                });
            }
        });

        let mut merged = findings.into_inner();
        merged.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(a.detected_at.cmp(&b.detected_at))
        });
        merged
    }
}

/// Run one detector behind its own failure boundary: a panic becomes a
/// zero-result contribution plus a diagnostic, never propagating to
/// sibling detectors.
fn run_isolated(detector: &dyn AnomalyDetector, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
    if !detector.can_detect(packets) {
        log::debug!("Detector '{}' not applicable, skipping", detector.name());
        return Vec::new();
    }
    match catch_unwind(AssertUnwindSafe(|| detector.detect(packets))) {
        Ok(findings) => findings,
        Err(_) => {
            log::error!(
                "Detector '{}' panicked; contributing no findings",
                detector.name()
            );
            Vec::new()
        }
    }
}
