use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Métadonnées descriptives d'un capteur (résolues via le repository,
/// pas transportées par les heartbeats).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SensorMetadata {
    pub name: String,
    pub cluster: String,
    pub description: Option<String>,
}

/// État courant d'un capteur dans le cache. Une seule entrée par id.
/// `id`, `active` et `last_update` sont gérés par le système ; `config`
/// est un payload opaque conservé en sémantique merge (jamais écrasé
/// par un heartbeat qui l'omet).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SensorState {
    pub id: String,
    pub metadata: SensorMetadata,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

pub type SensorsMap = HashMap<String, SensorState>;

/// Heartbeat validé, prêt à être fusionné dans le cache.
#[derive(Debug, Clone)]
pub struct ValidHeartbeat {
    pub id: String,
    pub name: String,
    pub cluster: String,
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("payload is not valid JSON")]
    Unparseable,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Parse + validation explicite d'un payload heartbeat brut.
/// Champs requis : id, name, cluster (strings non vides). Les champs
/// inconnus sont ignorés, `ts` aussi (l'horloge serveur fait foi).
pub fn parse_heartbeat(payload: &[u8]) -> Result<ValidHeartbeat, EventError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|_| EventError::Unparseable)?;

    let id = require_string(&value, "id")?;
    let name = require_string(&value, "name")?;
    let cluster = require_string(&value, "cluster")?;
    let config = value.get("config").cloned();

    Ok(ValidHeartbeat { id, name, cluster, config })
}

fn require_string(value: &serde_json::Value, field: &'static str) -> Result<String, EventError> {
    match value.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(EventError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_heartbeat() {
        let payload = br#"{"id":"s-1","name":"temp","cluster":"paris","config":{"rate":5}}"#;
        let hb = parse_heartbeat(payload).unwrap();
        assert_eq!(hb.id, "s-1");
        assert_eq!(hb.cluster, "paris");
        assert_eq!(hb.config.unwrap()["rate"], 5);
    }

    #[test]
    fn parse_without_config() {
        let hb = parse_heartbeat(br#"{"id":"s-1","name":"temp","cluster":"paris"}"#).unwrap();
        assert!(hb.config.is_none());
    }

    #[test]
    fn reject_missing_cluster() {
        let err = parse_heartbeat(br#"{"id":"s-1","name":"temp"}"#).unwrap_err();
        assert!(matches!(err, EventError::MissingField("cluster")));
    }

    #[test]
    fn reject_empty_id() {
        let err = parse_heartbeat(br#"{"id":"","name":"temp","cluster":"paris"}"#).unwrap_err();
        assert!(matches!(err, EventError::MissingField("id")));
    }

    #[test]
    fn reject_non_json() {
        let err = parse_heartbeat(b"not json at all").unwrap_err();
        assert!(matches!(err, EventError::Unparseable));
    }
}
