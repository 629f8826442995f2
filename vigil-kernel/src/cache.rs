/**
 * STATE CACHE - Store durable de l'état des capteurs
 *
 * RÔLE : Point de passage unique de toutes les mutations d'état capteur.
 * Map en mémoire + write-through vers un fichier JSON (id -> SensorState).
 *
 * FONCTIONNEMENT :
 * - upsert_merge résout la fusion AVANT l'écriture : un record entrant qui
 *   omet `config` hérite du `config` déjà stocké, puis remplace entièrement
 *   l'ancienne valeur pour cette clé.
 * - le write lock est tenu du calcul de fusion jusqu'au commit mémoire :
 *   deux mutations de la même clé ne peuvent pas entrelacer leur fusion.
 * - persistance avant commit : si l'écriture disque échoue, le capteur
 *   reste inchangé en mémoire (abandon propre, retry au prochain event).
 */

use crate::models::{SensorState, SensorsMap};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("backing store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct StateCache {
    sensors: RwLock<SensorsMap>,
    data_file: String,
}

impl StateCache {
    pub fn new(data_file: &str) -> Self {
        Self {
            sensors: RwLock::new(HashMap::new()),
            data_file: data_file.to_string(),
        }
    }

    /// Charge les capteurs depuis le fichier JSON de persistance
    pub async fn load(&self) -> Result<(), CacheError> {
        if !std::path::Path::new(&self.data_file).exists() {
            println!("[cache] no existing sensors file, starting fresh");
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&self.data_file).await?;
        let sensors: SensorsMap = serde_json::from_str(&content)?;

        let mut map = self.sensors.write().await;
        println!("[cache] loaded {} sensors from {}", sensors.len(), self.data_file);
        *map = sensors;
        Ok(())
    }

    /// Snapshot complet du cache (ordre non spécifié)
    pub async fn get_all(&self) -> Result<Vec<SensorState>, CacheError> {
        Ok(self.sensors.read().await.values().cloned().collect())
    }

    /// Lookup ponctuel par id
    pub async fn get_one(&self, id: &str) -> Result<Option<SensorState>, CacheError> {
        Ok(self.sensors.read().await.get(id).cloned())
    }

    pub async fn len(&self) -> usize {
        self.sensors.read().await.len()
    }

    /// Upsert avec fusion : retourne le record effectivement stocké.
    pub async fn upsert_merge(&self, incoming: SensorState) -> Result<SensorState, CacheError> {
        let mut sensors = self.sensors.write().await;

        let mut merged = incoming;
        if merged.config.is_none() {
            if let Some(previous) = sensors.get(&merged.id) {
                merged.config = previous.config.clone();
            }
        }

        let mut next = sensors.clone();
        next.insert(merged.id.clone(), merged.clone());

        let content = serde_json::to_string_pretty(&next)?;
        tokio::fs::write(&self.data_file, content).await?;

        *sensors = next;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SensorMetadata;
    use time::OffsetDateTime;

    fn record(id: &str, config: Option<serde_json::Value>) -> SensorState {
        SensorState {
            id: id.to_string(),
            metadata: SensorMetadata {
                name: "temp".into(),
                cluster: "paris".into(),
                description: None,
            },
            active: true,
            last_update: OffsetDateTime::now_utc(),
            config,
        }
    }

    fn cache_in(dir: &tempfile::TempDir) -> StateCache {
        StateCache::new(dir.path().join("sensors.json").to_str().unwrap())
    }

    #[tokio::test]
    async fn upsert_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        cache.upsert_merge(record("s-1", None)).await.unwrap();
        let stored = cache.get_one("s-1").await.unwrap().unwrap();
        assert!(stored.active);
        assert_eq!(cache.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn merge_preserves_config_across_omissions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        // premier record sans config : rien à fusionner, config absente
        let stored = cache.upsert_merge(record("s-1", None)).await.unwrap();
        assert!(stored.config.is_none());

        // config posée, puis séquence d'upserts qui l'omettent
        cache
            .upsert_merge(record("s-1", Some(serde_json::json!({"rate": 5}))))
            .await
            .unwrap();
        cache.upsert_merge(record("s-1", None)).await.unwrap();
        let stored = cache.upsert_merge(record("s-1", None)).await.unwrap();
        assert_eq!(stored.config.unwrap()["rate"], 5);

        // un upsert qui porte une config l'écrase
        let stored = cache
            .upsert_merge(record("s-1", Some(serde_json::json!({"rate": 9}))))
            .await
            .unwrap();
        assert_eq!(stored.config.unwrap()["rate"], 9);
    }

    #[tokio::test]
    async fn persisted_state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = cache_in(&dir);
            cache
                .upsert_merge(record("s-1", Some(serde_json::json!({"rate": 5}))))
                .await
                .unwrap();
        }

        let cache = cache_in(&dir);
        cache.load().await.unwrap();
        let stored = cache.get_one("s-1").await.unwrap().unwrap();
        assert_eq!(stored.config.unwrap()["rate"], 5);
    }

    #[tokio::test]
    async fn failed_persist_leaves_memory_unchanged() {
        let cache = StateCache::new("/nonexistent-dir/sensors.json");

        let err = cache.upsert_merge(record("s-1", None)).await.unwrap_err();
        assert!(matches!(err, CacheError::Unavailable(_)));
        assert!(cache.get_one("s-1").await.unwrap().is_none());
    }
}
