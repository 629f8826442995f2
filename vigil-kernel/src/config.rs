use crate::models::SensorMetadata;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelConfig {
    pub mqtt: Option<MqttConf>,
    #[serde(default = "default_heartbeat_topic")]
    pub heartbeat_topic: String,
    #[serde(default = "default_dead_timeout_ms")]
    pub dead_timeout_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Métadonnées statiques des capteurs connus (repository)
    #[serde(default)]
    pub sensors: HashMap<String, SensorMetadata>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

fn default_heartbeat_topic() -> String {
    "vigil/sensors/heartbeat@v1".into()
}

fn default_dead_timeout_ms() -> u64 {
    2000
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

fn default_data_file() -> String {
    "./data/sensors.json".into()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mqtt: Some(MqttConf { host: "localhost".into(), port: 1883 }),
            heartbeat_topic: default_heartbeat_topic(),
            dead_timeout_ms: default_dead_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            data_file: default_data_file(),
            http_port: default_http_port(),
            sensors: HashMap::new(),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("VIGIL_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() { return KernelConfig::default(); }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[kernel] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        eprintln!("[kernel] pas de kernel.yaml, usage config par défaut");
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_partial_yaml() {
        let cfg: KernelConfig = serde_yaml::from_str(
            "mqtt: { host: broker.lan, port: 1884 }\nsensors:\n  s-1: { name: Rack 4 temp, cluster: paris-dc }\n",
        )
        .unwrap();

        assert_eq!(cfg.dead_timeout_ms, 2000);
        assert_eq!(cfg.heartbeat_topic, "vigil/sensors/heartbeat@v1");
        assert_eq!(cfg.mqtt.unwrap().port, 1884);
        assert_eq!(cfg.sensors["s-1"].cluster, "paris-dc");
    }
}
