// DriveMonitor - Hazard Detector Engine
//
// A fixed, ordered rule set (crash, braking, acceleration, cornering) run
// against every sample. Each rule owns a mutable threshold stored as atomic
// f32 bits so the command path can retune it while the processor is reading.
//
// Crash alerts jump the alert queue; warnings queue behind them in arrival
// order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{validate_threshold, Thresholds};
use crate::error::Result;
use crate::events::{Alert, Sample, StatusResponse, ThresholdKind, WarningKind};
use crate::queue::RingBuffer;

/// Alert class a rule produces when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Crash,
    Warning(WarningKind),
}

// ---------------------------------------------------------------------------
// Rule definitions
// ---------------------------------------------------------------------------

impl ThresholdKind {
    pub fn rule_name(&self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::Braking => "harsh_braking",
            Self::Acceleration => "harsh_accel",
            Self::Cornering => "harsh_cornering",
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Self::Crash => Classification::Crash,
            Self::Braking => Classification::Warning(WarningKind::Braking),
            Self::Acceleration => Classification::Warning(WarningKind::Acceleration),
            Self::Cornering => Classification::Warning(WarningKind::Cornering),
        }
    }

    /// Does `sample` cross this rule's `threshold`?
    pub fn check(&self, sample: &Sample, threshold: f32) -> bool {
        match self {
            Self::Crash => sample.dynamic_magnitude() >= threshold,
            // Deceleration shows up as negative longitudinal acceleration.
            Self::Braking => sample.y <= -threshold,
            Self::Acceleration => sample.y >= threshold,
            Self::Cornering => sample.x.abs() >= threshold,
        }
    }

    /// The value the rule judged, for logging and the crash alert.
    pub fn extract_value(&self, sample: &Sample) -> f32 {
        match self {
            Self::Crash => sample.dynamic_magnitude(),
            Self::Braking | Self::Acceleration => sample.y,
            Self::Cornering => sample.x,
        }
    }
}

struct Detector {
    kind: ThresholdKind,
    threshold: AtomicU32,
}

impl Detector {
    fn new(kind: ThresholdKind, threshold: f32) -> Self {
        Self { kind, threshold: AtomicU32::new(threshold.to_bits()) }
    }

    fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold.load(Ordering::Acquire))
    }

    fn set_threshold(&self, value: f32) {
        self.threshold.store(value.to_bits(), Ordering::Release);
    }

    fn fire(&self, sample: &Sample, timestamp: u32) -> Option<Alert> {
        if !self.kind.check(sample, self.threshold()) {
            return None;
        }

        let value = self.kind.extract_value(sample);
        log::info!("{} detected! Value: {:.2} g", self.kind.rule_name(), value);

        Some(match self.kind.classification() {
            Classification::Crash => Alert::Crash { timestamp, magnitude: value },
            Classification::Warning(kind) => Alert::Warning {
                kind,
                timestamp,
                x: sample.x,
                y: sample.y,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What one sample's evaluation did to the alert queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Alerts successfully enqueued.
    pub raised: usize,
    /// Enqueues that displaced an older alert.
    pub evicted: usize,
    /// Alerts lost to a full `DropNewest` queue or a lock timeout.
    pub dropped: usize,
}

pub struct DetectorEngine {
    detectors: [Detector; 4],
    clock: Arc<dyn Clock>,
}

impl DetectorEngine {
    pub fn new(thresholds: Thresholds, clock: Arc<dyn Clock>) -> Self {
        let detectors = ThresholdKind::ALL.map(|kind| Detector::new(kind, thresholds.get(kind)));
        log::info!(
            "Detectors initialised: crash={:.1} braking={:.1} accel={:.1} cornering={:.1}",
            thresholds.crash,
            thresholds.braking,
            thresholds.accel,
            thresholds.cornering
        );
        Self { detectors, clock }
    }

    fn detector(&self, kind: ThresholdKind) -> &Detector {
        match kind {
            ThresholdKind::Crash => &self.detectors[0],
            ThresholdKind::Braking => &self.detectors[1],
            ThresholdKind::Acceleration => &self.detectors[2],
            ThresholdKind::Cornering => &self.detectors[3],
        }
    }

    /// Overwrite one rule's threshold. Visible to the next evaluation on any
    /// thread.
    pub fn set_threshold(&self, kind: ThresholdKind, value: f32) -> Result<()> {
        validate_threshold(kind, value)?;
        self.detector(kind).set_threshold(value);
        log::info!("{} threshold set to {:.2} g", kind.rule_name(), value);
        Ok(())
    }

    pub fn threshold(&self, kind: ThresholdKind) -> f32 {
        self.detector(kind).threshold()
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            crash: self.threshold(ThresholdKind::Crash),
            braking: self.threshold(ThresholdKind::Braking),
            accel: self.threshold(ThresholdKind::Acceleration),
            cornering: self.threshold(ThresholdKind::Cornering),
        }
    }

    /// Alerts `sample` triggers, in rule order, without touching any queue.
    pub fn detect(&self, sample: &Sample) -> Vec<Alert> {
        let timestamp = self.clock.now_ms();
        self.detectors.iter().filter_map(|d| d.fire(sample, timestamp)).collect()
    }

    /// Run every rule against `sample` and enqueue what fires: crashes at the
    /// front (behind crashes already waiting there), warnings at the back.
    pub fn evaluate(&self, sample: &Sample, alerts: &RingBuffer<Alert>) -> Evaluation {
        let mut outcome = Evaluation::default();

        for alert in self.detect(sample) {
            let status = if alert.is_crash() {
                alerts.push_front_after(alert, Alert::is_crash)
            } else {
                alerts.push_back(alert)
            };

            if status.ok {
                outcome.raised += 1;
                if status.was_full {
                    outcome.evicted += 1;
                }
            } else {
                outcome.dropped += 1;
                log::warn!("alert queue: failed to queue {:?} alert", alert);
            }
        }

        outcome
    }
}
