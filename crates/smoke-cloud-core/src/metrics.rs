use serde::{Deserialize, Serialize};

/// Lifecycle phase of a smoke cloud.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Untriggered,
    Thrown,
    Deploying,
    Deployed,
    Decaying,
    Decayed,
}

impl Phase {
    /// Whether the cloud currently owns a grid.
    pub fn has_grid(self) -> bool {
        matches!(self, Phase::Deploying | Phase::Deployed | Phase::Decaying)
    }

    pub fn is_finished(self) -> bool {
        self == Phase::Decayed
    }
}

/// What one `advance` call did.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TickReport {
    pub phase_before: Phase,
    pub phase_after: Phase,
    pub cells_added: usize,
    pub cells_removed: usize,
    pub growth_ticks: usize,
    pub decay_ticks: usize,
    pub despawn_requested: bool,
}

impl TickReport {
    pub fn transitioned(&self) -> bool {
        self.phase_before != self.phase_after
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CloudSnapshot {
    pub elapsed: f64,
    pub phase: Phase,
    pub occupied: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub frames: usize,
    pub elapsed: f64,
    pub final_phase: Phase,
    pub peak_occupied: usize,
    pub growth_ticks: usize,
    pub decay_ticks: usize,
    pub cells_instantiated: usize,
    pub cells_destroyed: usize,
    pub despawn_requested: bool,
    #[serde(default)]
    pub samples: Vec<CloudSnapshot>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            schema_version: default_schema_version(),
            ..Self::default()
        }
    }

    /// Fold one frame's report into the running totals.
    pub fn record(&mut self, dt: f64, report: &TickReport, occupied: usize) {
        self.frames += 1;
        self.elapsed += dt;
        self.final_phase = report.phase_after;
        self.peak_occupied = self.peak_occupied.max(occupied);
        self.growth_ticks += report.growth_ticks;
        self.decay_ticks += report.decay_ticks;
        self.despawn_requested |= report.despawn_requested;
    }

    pub fn sample(&mut self, phase: Phase, occupied: usize) {
        self.samples.push(CloudSnapshot {
            elapsed: self.elapsed,
            phase,
            occupied,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::Decaying).unwrap();
        assert_eq!(json, "\"decaying\"");
        let phase: Phase = serde_json::from_str("\"deployed\"").unwrap();
        assert_eq!(phase, Phase::Deployed);
    }

    #[test]
    fn grid_phases() {
        assert!(!Phase::Untriggered.has_grid());
        assert!(!Phase::Thrown.has_grid());
        assert!(Phase::Deploying.has_grid());
        assert!(Phase::Deployed.has_grid());
        assert!(Phase::Decaying.has_grid());
        assert!(!Phase::Decayed.has_grid());
        assert!(Phase::Decayed.is_finished());
    }

    #[test]
    fn summary_accumulates_reports() {
        let mut summary = RunSummary::new();
        let report = TickReport {
            phase_before: Phase::Deploying,
            phase_after: Phase::Deployed,
            cells_added: 10,
            growth_ticks: 2,
            ..TickReport::default()
        };
        assert!(report.transitioned());
        summary.record(0.5, &report, 12);
        summary.record(
            0.5,
            &TickReport {
                phase_before: Phase::Deployed,
                phase_after: Phase::Deployed,
                ..TickReport::default()
            },
            9,
        );
        summary.sample(Phase::Deployed, 9);
        assert_eq!(summary.schema_version, 1);
        assert_eq!(summary.frames, 2);
        assert!((summary.elapsed - 1.0).abs() < 1e-12);
        assert_eq!(summary.peak_occupied, 12);
        assert_eq!(summary.growth_ticks, 2);
        assert_eq!(summary.final_phase, Phase::Deployed);
        assert_eq!(summary.samples.len(), 1);
    }

    #[test]
    fn legacy_summary_json_fills_defaults() {
        let json = r#"{
            "frames": 3,
            "elapsed": 0.1,
            "final_phase": "decayed",
            "peak_occupied": 5,
            "growth_ticks": 1,
            "decay_ticks": 2,
            "cells_instantiated": 5,
            "cells_destroyed": 5,
            "despawn_requested": true
        }"#;
        let summary: RunSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.schema_version, 1);
        assert!(summary.samples.is_empty());
        assert_eq!(summary.final_phase, Phase::Decayed);
    }
}
