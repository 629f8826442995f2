/**
 * METADATA REPOSITORY - Lookup des métadonnées statiques de capteurs
 *
 * RÔLE : Résolution id capteur -> {name, cluster, description}.
 * Lecture pure, aucun état mutable ; l'échec d'un lookup n'est jamais
 * bloquant pour une transition d'état (enrichissement best-effort).
 *
 * FONCTIONNEMENT : le trait permet de brancher d'autres backends plus
 * tard (SQLite, API distante) ; l'implémentation fournie lit la section
 * `sensors:` de kernel.yaml.
 */

use crate::models::SensorMetadata;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("sensor not found: {0}")]
    NotFound(String),
}

/// Interface commune des backends de métadonnées
pub trait MetadataRepository: Send + Sync {
    fn lookup(&self, id: &str) -> Result<SensorMetadata, MetadataError>;
}

/// Implémentation backée par la config YAML du kernel
pub struct ConfigMetadataRepository {
    sensors: HashMap<String, SensorMetadata>,
}

impl ConfigMetadataRepository {
    pub fn new(sensors: HashMap<String, SensorMetadata>) -> Self {
        Self { sensors }
    }
}

impl MetadataRepository for ConfigMetadataRepository {
    fn lookup(&self, id: &str) -> Result<SensorMetadata, MetadataError> {
        self.sensors
            .get(id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))
    }
}
