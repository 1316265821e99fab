//! Adaptive overheat detection.
//!
//! An [`AgentState`] first learns a temperature baseline from a fixed number of
//! readings, then classifies every following reading against a learned soft
//! threshold, a fixed hard limit and a rising-trend rule.

mod config;
mod model;

use std::collections::VecDeque;

pub use config::AgentConfig;
pub use model::{Action, Decision, Reading, Status};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AgentError {
    #[error("invalid reading: temperature {0} is not a finite number")]
    InvalidReading(f64),

    #[error("invalid agent configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Calibrating,
    Monitoring,
}

#[derive(Clone, Debug)]
enum Stage {
    Calibrating { samples: Vec<f64> },
    Monitoring { baseline: f64, threshold: f64 },
}

/// Per-session detector state. Callers driving it from several threads serialize access.
#[derive(Clone, Debug)]
pub struct AgentState {
    cfg: AgentConfig,
    stage: Stage,
    history: VecDeque<f64>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::with_valid_config(AgentConfig::default())
    }
}

impl AgentState {
    pub fn new(cfg: AgentConfig) -> Result<Self, AgentError> {
        cfg.validate()?;
        Ok(Self::with_valid_config(cfg))
    }

    fn with_valid_config(cfg: AgentConfig) -> Self {
        Self {
            stage: Stage::Calibrating {
                samples: Vec::new(),
            },
            history: VecDeque::new(),
            cfg,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.cfg
    }

    pub fn phase(&self) -> Phase {
        match self.stage {
            Stage::Calibrating { .. } => Phase::Calibrating,
            Stage::Monitoring { .. } => Phase::Monitoring,
        }
    }

    pub fn baseline_temp(&self) -> Option<f64> {
        match self.stage {
            Stage::Monitoring { baseline, .. } => Some(baseline),
            Stage::Calibrating { .. } => None,
        }
    }

    pub fn dynamic_threshold(&self) -> Option<f64> {
        match self.stage {
            Stage::Monitoring { threshold, .. } => Some(threshold),
            Stage::Calibrating { .. } => None,
        }
    }

    pub fn hard_limit_temp(&self) -> f64 {
        self.cfg.hard_limit_temp
    }

    /// Monitoring temperatures, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    /// (collected, target); collected equals target once monitoring.
    pub fn calibration_progress(&self) -> (usize, usize) {
        let target = self.cfg.calibration_target;
        match &self.stage {
            Stage::Calibrating { samples } => (samples.len(), target),
            Stage::Monitoring { .. } => (target, target),
        }
    }

    /// Classify one reading. A non-finite temperature is rejected and leaves the state unchanged.
    pub fn analyze(&mut self, reading: &Reading) -> Result<Decision, AgentError> {
        let temp = reading.temperature;
        if !temp.is_finite() {
            return Err(AgentError::InvalidReading(temp));
        }

        match &mut self.stage {
            Stage::Calibrating { samples } => {
                samples.push(temp);
                let decision = Decision::learning(samples.len(), self.cfg.calibration_target);
                if samples.len() >= self.cfg.calibration_target {
                    let baseline = mean(samples);
                    let threshold = baseline * self.cfg.threshold_multiplier;
                    tracing::info!(baseline, threshold, "calibration complete");
                    self.stage = Stage::Monitoring {
                        baseline,
                        threshold,
                    };
                }
                Ok(decision)
            }
            Stage::Monitoring {
                baseline,
                threshold,
            } => {
                let (baseline, threshold) = (*baseline, *threshold);
                Ok(self.monitor(temp, baseline, threshold))
            }
        }
    }

    fn monitor(&mut self, temp: f64, baseline: f64, threshold: f64) -> Decision {
        if self.history.len() == self.cfg.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(temp);

        let mut d = Decision::stable();

        if temp > threshold {
            d.status = Status::Warning;
            d.reason = format!("Abnormal Deviation (>{threshold:.1})");
            d.actions = vec![Action::CheckLoad];
        }

        // Evaluated after the deviation rule so it always overrides it.
        if temp > self.cfg.hard_limit_temp {
            d.status = Status::Fault;
            d.reason = format!("Critical Overheat ({temp:.2})");
            d.actions = vec![Action::EmergencyStop, Action::AlarmOn, Action::FanMax];
        }

        if d.status == Status::Normal
            && temp > baseline + self.cfg.trend_margin
            && self.rising()
        {
            d.status = Status::Warning;
            d.reason = "Trend: Rapid Heating Detected".to_string();
            d.actions.push(Action::PreemptiveCooling);
        }

        if d.is_alert() {
            tracing::debug!(status = %d.status, reason = %d.reason, temp, "alert");
        }
        d
    }

    /// True when the last `trend_window` samples are strictly increasing.
    fn rising(&self) -> bool {
        let n = self.cfg.trend_window;
        if self.history.len() < n {
            return false;
        }
        let recent = self.history.range(self.history.len() - n..);
        recent.clone().zip(recent.skip(1)).all(|(a, b)| a < b)
    }
}

/// Incremental mean; stays finite for any finite samples.
fn mean(samples: &[f64]) -> f64 {
    let mut m = 0.0;
    for (i, &x) in samples.iter().enumerate() {
        let k = (i + 1) as f64;
        m += x / k - m / k;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const EPS: f64 = 1e-6;

    fn agent(target: usize) -> AgentState {
        AgentState::new(AgentConfig {
            calibration_target: target,
            ..Default::default()
        })
        .unwrap()
    }

    fn calibrated(temps: &[f64]) -> AgentState {
        let mut a = agent(temps.len());
        for &t in temps {
            a.analyze(&Reading::temp(t)).unwrap();
        }
        a
    }

    #[test]
    fn learning_for_exactly_target_calls() {
        let mut a = agent(3);
        for (i, t) in [10.0, 500.0, -20.0].into_iter().enumerate() {
            let d = a.analyze(&Reading::temp(t)).unwrap();
            assert_eq!(d.status, Status::Learning);
            assert!(d.actions.is_empty());
            assert_eq!(d.reason, format!("Calibrating ({}/3)", i + 1));
        }
        assert_eq!(a.phase(), Phase::Monitoring);
        for _ in 0..30 {
            let d = a.analyze(&Reading::temp(100.0)).unwrap();
            assert_ne!(d.status, Status::Learning);
        }
    }

    #[test]
    fn baseline_is_mean_and_threshold_scaled() {
        let a = calibrated(&[40.0, 42.0, 41.0]);
        assert!((a.baseline_temp().unwrap() - 41.0).abs() < EPS);
        assert!((a.dynamic_threshold().unwrap() - 49.2).abs() < EPS);
        assert_eq!(a.calibration_progress(), (3, 3));
    }

    #[test]
    fn no_baseline_before_calibration_completes() {
        let mut a = agent(20);
        for _ in 0..19 {
            a.analyze(&Reading::temp(45.0)).unwrap();
        }
        assert_eq!(a.phase(), Phase::Calibrating);
        assert_eq!(a.baseline_temp(), None);
        assert_eq!(a.dynamic_threshold(), None);
        assert_eq!(a.calibration_progress(), (19, 20));
    }

    #[test]
    fn calibration_readings_do_not_enter_history() {
        let a = calibrated(&[40.0, 42.0, 41.0]);
        assert_eq!(a.history().len(), 0);
    }

    #[test]
    fn stable_reading_is_normal() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        let d = a.analyze(&Reading::temp(41.5)).unwrap();
        assert_eq!(d.status, Status::Normal);
        assert_eq!(d.reason, "System Stable");
        assert!(d.actions.is_empty());
    }

    #[test]
    fn deviation_warns_with_check_load() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        let d = a.analyze(&Reading::temp(50.0)).unwrap();
        assert_eq!(d.status, Status::Warning);
        assert_eq!(d.actions, vec![Action::CheckLoad]);
        assert_eq!(d.reason, "Abnormal Deviation (>49.2)");
    }

    #[test]
    fn threshold_comparison_is_strict() {
        let mut a = calibrated(&[50.0]);
        // threshold = 60.0 exactly
        let d = a.analyze(&Reading::temp(60.0)).unwrap();
        assert_eq!(d.status, Status::Normal);

        let mut a = calibrated(&[40.0]);
        let d = a.analyze(&Reading::temp(80.0)).unwrap();
        assert_eq!(d.status, Status::Warning, "80.0 is not above the hard limit");
    }

    #[test]
    fn hard_limit_overrides_deviation() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        let d = a.analyze(&Reading::temp(85.0)).unwrap();
        assert_eq!(d.status, Status::Fault);
        assert_eq!(
            d.actions,
            vec![Action::EmergencyStop, Action::AlarmOn, Action::FanMax]
        );
        assert_eq!(d.reason, "Critical Overheat (85.00)");
    }

    #[test]
    fn hard_limit_fires_even_when_baseline_is_high() {
        // threshold 120 would never fire; the hard limit still must.
        let mut a = calibrated(&[100.0]);
        let d = a.analyze(&Reading::temp(81.0)).unwrap();
        assert_eq!(d.status, Status::Fault);
    }

    #[test]
    fn rising_trend_upgrades_normal() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        let mut last = None;
        for t in [44.0, 45.0, 46.0, 47.0, 48.0] {
            last = Some(a.analyze(&Reading::temp(t)).unwrap());
        }
        let d = last.unwrap();
        assert_eq!(d.status, Status::Warning);
        assert_eq!(d.reason, "Trend: Rapid Heating Detected");
        assert_eq!(d.actions, vec![Action::PreemptiveCooling]);
    }

    #[test]
    fn trend_needs_full_window() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        for t in [45.0, 46.0, 47.0, 48.0] {
            let d = a.analyze(&Reading::temp(t)).unwrap();
            assert_eq!(d.status, Status::Normal);
        }
    }

    #[test]
    fn tie_in_window_suppresses_trend() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        for t in [44.0, 45.0, 46.0, 47.0, 48.0] {
            a.analyze(&Reading::temp(t)).unwrap();
        }
        let d = a.analyze(&Reading::temp(48.0)).unwrap();
        assert_eq!(d.status, Status::Normal);
        assert!(d.actions.is_empty());
    }

    #[test]
    fn trend_requires_margin_above_baseline() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        let mut last = None;
        for t in [41.0, 42.0, 43.0, 44.0, 45.5] {
            last = Some(a.analyze(&Reading::temp(t)).unwrap());
        }
        // 45.5 < 41 + 5
        assert_eq!(last.unwrap().status, Status::Normal);
    }

    #[test]
    fn trend_does_not_touch_warning_or_fault() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        for t in [45.0, 46.0, 47.0, 48.0] {
            a.analyze(&Reading::temp(t)).unwrap();
        }
        let d = a.analyze(&Reading::temp(60.0)).unwrap();
        assert_eq!(d.status, Status::Warning);
        assert_eq!(d.actions, vec![Action::CheckLoad]);
        assert!(d.reason.starts_with("Abnormal Deviation"));

        let d = a.analyze(&Reading::temp(90.0)).unwrap();
        assert_eq!(d.status, Status::Fault);
        assert_eq!(
            d.actions,
            vec![Action::EmergencyStop, Action::AlarmOn, Action::FanMax]
        );
    }

    #[test]
    fn history_is_bounded_fifo() {
        let mut a = calibrated(&[40.0]);
        for i in 0..45 {
            a.analyze(&Reading::temp(i as f64)).unwrap();
            assert!(a.history().len() <= 20);
        }
        let h: Vec<f64> = a.history().collect();
        let expected: Vec<f64> = (25..45).map(|i| i as f64).collect();
        assert_eq!(h, expected);
    }

    #[test]
    fn fault_is_not_sticky() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        assert_eq!(a.analyze(&Reading::temp(90.0)).unwrap().status, Status::Fault);
        assert_eq!(a.analyze(&Reading::temp(41.0)).unwrap().status, Status::Normal);
    }

    #[test]
    fn non_finite_temperature_rejected_without_state_change() {
        let mut a = agent(2);
        assert_matches!(
            a.analyze(&Reading::temp(f64::NAN)),
            Err(AgentError::InvalidReading(_))
        );
        assert_matches!(
            a.analyze(&Reading::temp(f64::INFINITY)),
            Err(AgentError::InvalidReading(_))
        );
        assert_eq!(a.calibration_progress(), (0, 2));

        a.analyze(&Reading::temp(40.0)).unwrap();
        a.analyze(&Reading::temp(40.0)).unwrap();
        assert_matches!(
            a.analyze(&Reading::temp(f64::NEG_INFINITY)),
            Err(AgentError::InvalidReading(_))
        );
        assert_eq!(a.history().len(), 0);
    }

    #[test]
    fn huge_buffer_sizes_construct_without_allocating() {
        let mut a = AgentState::new(AgentConfig {
            calibration_target: usize::MAX,
            history_capacity: usize::MAX,
            ..Default::default()
        })
        .unwrap();
        for _ in 0..100 {
            let d = a.analyze(&Reading::temp(45.0)).unwrap();
            assert_eq!(d.status, Status::Learning);
        }
        assert_eq!(a.phase(), Phase::Calibrating);
        assert_eq!(a.calibration_progress(), (100, usize::MAX));
    }

    #[test]
    fn baseline_of_extreme_samples_stays_finite() {
        let mut a = AgentState::new(AgentConfig {
            calibration_target: 2,
            hard_limit_temp: f64::MAX,
            ..Default::default()
        })
        .unwrap();
        a.analyze(&Reading::temp(1e308)).unwrap();
        a.analyze(&Reading::temp(1e308)).unwrap();
        let baseline = a.baseline_temp().unwrap();
        let threshold = a.dynamic_threshold().unwrap();
        assert!(baseline.is_finite() && threshold.is_finite());
        assert!((baseline / 1e308 - 1.0).abs() < 1e-12);

        let d = a.analyze(&Reading::temp(1.5e308)).unwrap();
        assert_eq!(d.status, Status::Warning);
        assert_eq!(d.actions, vec![Action::CheckLoad]);
    }

    #[test]
    fn mean_matches_arithmetic_mean() {
        assert!((mean(&[40.0, 42.0, 41.0]) - 41.0).abs() < EPS);
        assert!((mean(&[-1e308, 1e308]) - 0.0).abs() < EPS);
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < EPS);
    }

    #[test]
    fn trend_window_uses_latest_samples_only() {
        let mut a = calibrated(&[40.0, 42.0, 41.0]);
        // The dip suppresses the trend until it leaves the five-sample window.
        for t in [44.0, 45.0, 30.0, 46.0, 47.0, 48.0] {
            assert_eq!(a.analyze(&Reading::temp(t)).unwrap().status, Status::Normal);
        }
        let d = a.analyze(&Reading::temp(49.0)).unwrap();
        assert_eq!(d.status, Status::Warning);
        assert_eq!(d.actions, vec![Action::PreemptiveCooling]);
    }

    #[test]
    fn zero_target_refused_at_construction() {
        let r = AgentState::new(AgentConfig {
            calibration_target: 0,
            ..Default::default()
        });
        assert_matches!(r, Err(AgentError::InvalidConfig(_)));
    }

    #[test]
    fn reading_uses_firmware_keys() {
        let r: Reading = serde_json::from_str(r#"{"temp": 45.2, "volt": 5.01, "curr": 1.2}"#).unwrap();
        assert_eq!(r, Reading::new(45.2, 5.01, 1.2));
    }

    #[test]
    fn missing_temperature_is_invalid_not_zero() {
        let mut a = AgentState::default();
        for raw in [r#"{"volt": 5.0}"#, r#"{"temp": null, "volt": 5.0}"#] {
            let r: Reading = serde_json::from_str(raw).unwrap();
            assert!(r.temperature.is_nan());
            assert_matches!(a.analyze(&r), Err(AgentError::InvalidReading(_)));
        }
    }

    #[test]
    fn decision_serializes_wire_names() {
        let mut a = calibrated(&[40.0]);
        let d = a.analyze(&Reading::temp(85.0)).unwrap();
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["status"], "FAULT");
        assert_eq!(
            v["actions"],
            serde_json::json!(["EMERGENCY_STOP", "ALARM_ON", "FAN_MAX"])
        );
        assert_eq!(Action::PreemptiveCooling.to_string(), "PRE_EMPTIVE_COOLING");
    }
}
