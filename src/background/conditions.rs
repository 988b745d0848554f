use serde::{Deserialize, Serialize};

use crate::config::BackgroundConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Offline,
    /// Connected, but metered
    Cellular,
    Wifi,
}

/// Snapshot of the device state background work depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConditions {
    pub connectivity: Connectivity,
    pub battery_low: bool,
}

impl DeviceConditions {
    pub fn is_connected(&self) -> bool {
        self.connectivity != Connectivity::Offline
    }

    pub fn is_unmetered(&self) -> bool {
        self.connectivity == Connectivity::Wifi
    }

    /// Scheduler constraints: any network, battery not low.
    pub fn allows_background_work(&self) -> bool {
        self.is_connected() && !self.battery_low
    }
}

/// Source of [`DeviceConditions`], polled before each background run.
pub trait ConditionsProbe: Send + Sync + 'static {
    fn current(&self) -> DeviceConditions;
}

/// Fixed conditions, taken from configuration on hosts with no OS probe.
#[derive(Debug, Clone, Copy)]
pub struct StaticConditions(pub DeviceConditions);

impl From<&BackgroundConfig> for StaticConditions {
    fn from(config: &BackgroundConfig) -> Self {
        Self(DeviceConditions {
            connectivity: config.connectivity,
            battery_low: config.battery_low,
        })
    }
}

impl ConditionsProbe for StaticConditions {
    fn current(&self) -> DeviceConditions {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(connectivity: Connectivity, battery_low: bool) -> DeviceConditions {
        DeviceConditions {
            connectivity,
            battery_low,
        }
    }

    #[test]
    fn test_constraint_matrix() {
        assert!(conditions(Connectivity::Wifi, false).allows_background_work());
        assert!(conditions(Connectivity::Cellular, false).allows_background_work());
        assert!(!conditions(Connectivity::Offline, false).allows_background_work());
        assert!(!conditions(Connectivity::Wifi, true).allows_background_work());
    }

    #[test]
    fn test_only_wifi_is_unmetered() {
        assert!(conditions(Connectivity::Wifi, true).is_unmetered());
        assert!(!conditions(Connectivity::Cellular, false).is_unmetered());
        assert!(!conditions(Connectivity::Offline, false).is_unmetered());
    }

    #[test]
    fn test_static_conditions_from_config() {
        let probe = StaticConditions::from(&BackgroundConfig {
            connectivity: Connectivity::Cellular,
            battery_low: true,
            ..BackgroundConfig::default()
        });
        assert_eq!(probe.current(), conditions(Connectivity::Cellular, true));
    }
}
