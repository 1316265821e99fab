use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One sample from the device. Field aliases match the firmware's JSON keys.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// A missing or `null` temperature deserializes as NaN and is rejected by `analyze`.
    #[serde(alias = "temp", default = "missing", deserialize_with = "nullable")]
    pub temperature: f64,
    #[serde(alias = "volt", default)]
    pub voltage: f64,
    #[serde(alias = "curr", default)]
    pub current: f64,
}

impl Reading {
    pub fn new(temperature: f64, voltage: f64, current: f64) -> Self {
        Self {
            temperature,
            voltage,
            current,
        }
    }

    /// Temperature-only reading; voltage and current are not consulted by any rule.
    pub fn temp(temperature: f64) -> Self {
        Self::new(temperature, 0.0, 0.0)
    }
}

fn missing() -> f64 {
    f64::NAN
}

fn nullable<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Learning,
    Normal,
    Warning,
    Fault,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Learning => "LEARNING",
            Status::Normal => "NORMAL",
            Status::Warning => "WARNING",
            Status::Fault => "FAULT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrective commands understood by the downstream actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "CHECK_LOAD")]
    CheckLoad,
    #[serde(rename = "PRE_EMPTIVE_COOLING")]
    PreemptiveCooling,
    #[serde(rename = "EMERGENCY_STOP")]
    EmergencyStop,
    #[serde(rename = "ALARM_ON")]
    AlarmOn,
    #[serde(rename = "FAN_MAX")]
    FanMax,
}

impl Action {
    /// Wire identifier sent to the hardware link.
    pub fn command(self) -> &'static str {
        match self {
            Action::CheckLoad => "CHECK_LOAD",
            Action::PreemptiveCooling => "PRE_EMPTIVE_COOLING",
            Action::EmergencyStop => "EMERGENCY_STOP",
            Action::AlarmOn => "ALARM_ON",
            Action::FanMax => "FAN_MAX",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub status: Status,
    pub actions: Vec<Action>,
    pub reason: String,
}

impl Decision {
    pub(crate) fn stable() -> Self {
        Self {
            status: Status::Normal,
            actions: Vec::new(),
            reason: "System Stable".to_string(),
        }
    }

    pub(crate) fn learning(collected: usize, target: usize) -> Self {
        Self {
            status: Status::Learning,
            actions: Vec::new(),
            reason: format!("Calibrating ({collected}/{target})"),
        }
    }

    /// Warning or fault: something an operator log should keep.
    pub fn is_alert(&self) -> bool {
        matches!(self.status, Status::Warning | Status::Fault)
    }
}
