use crate::state::{new_state, Shared};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub sensors_tracked: u32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: std::sync::Arc<std::sync::atomic::AtomicU32>,
    mqtt_status: Shared<String>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0)),
            mqtt_status: new_state("connecting".to_string()),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn mark_mqtt_disconnected(&self) {
        *self.mqtt_status.lock() = "disconnected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health(&self, sensors_tracked: usize) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            sensors_tracked: sensors_tracked as u32,
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_reflects_mqtt_lifecycle() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.get_health(0).mqtt_status, "connecting");

        tracker.mark_mqtt_connected();
        assert_eq!(tracker.get_health(3).mqtt_status, "connected");

        tracker.increment_reconnects();
        let health = tracker.get_health(3);
        assert_eq!(health.mqtt_status, "reconnecting");
        assert_eq!(health.mqtt_reconnects, 1);
        assert_eq!(health.sensors_tracked, 3);
    }
}
