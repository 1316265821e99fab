use crate::AgentError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentConfig {
    /// Number of readings averaged into the baseline before monitoring starts.
    pub calibration_target: usize,
    /// Most recent monitoring temperatures kept for trend detection.
    pub history_capacity: usize,
    /// Samples that must be strictly increasing for the trend rule.
    pub trend_window: usize,
    /// Soft threshold = baseline * multiplier.
    pub threshold_multiplier: f64,
    /// Trend only counts once the current temperature exceeds baseline + margin.
    pub trend_margin: f64,
    /// Fixed safety ceiling (°C), independent of calibration.
    pub hard_limit_temp: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            calibration_target: 20,
            history_capacity: 20,
            trend_window: 5,
            threshold_multiplier: 1.2,
            trend_margin: 5.0,
            hard_limit_temp: 80.0,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.calibration_target == 0 {
            return Err(invalid("calibration_target must be at least 1"));
        }
        if self.trend_window < 2 {
            return Err(invalid("trend_window must be at least 2"));
        }
        if self.trend_window > self.history_capacity {
            return Err(invalid(format!(
                "trend_window ({}) exceeds history_capacity ({})",
                self.trend_window, self.history_capacity
            )));
        }
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier <= 0.0 {
            return Err(invalid("threshold_multiplier must be finite and positive"));
        }
        if !self.trend_margin.is_finite() {
            return Err(invalid("trend_margin must be finite"));
        }
        if !self.hard_limit_temp.is_finite() {
            return Err(invalid("hard_limit_temp must be finite"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> AgentError {
    AgentError::InvalidConfig(msg.into())
}
