/**
 * LIVENESS MANAGER - Machine d'état alive/dead des capteurs
 *
 * RÔLE : Transforme le flux heartbeat (non fiable) et le timer de sweep
 * en transitions d'état validées + flux de notifications.
 *
 * FONCTIONNEMENT :
 * - ingest : parse/validation explicite -> enrichissement métadonnées
 *   (best-effort) -> fusion dans le State Cache -> broadcast du record
 *   fusionné, exactement une fois par event accepté.
 * - sweep : scan périodique du snapshot ; un capteur actif silencieux
 *   depuis strictement plus que dead_timeout passe à active=false.
 *   Le sweep est la seule autorité pour cette transition ; un capteur
 *   déjà mort est ignoré (pas de double notification).
 * - fan-out : canal broadcast borné ; un consommateur lent perd les
 *   events les plus anciens mais ne bloque jamais ingest ni sweep
 *   (l'état se re-dérive du cache au prochain event).
 *
 * ARCHITECTURE : toute mutation passe par cache.upsert_merge, dont le
 * write lock sérialise les écritures d'une même clé : un heartbeat et
 * un mark-dead concurrents sur le même capteur ne peuvent pas
 * entrelacer leur fusion.
 */

use crate::cache::StateCache;
use crate::metadata::{MetadataError, MetadataRepository};
use crate::models::{parse_heartbeat, EventError, SensorMetadata, SensorState};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct LivenessManager {
    cache: Arc<StateCache>,
    metadata: Arc<dyn MetadataRepository>,
    events: broadcast::Sender<SensorState>,
}

impl LivenessManager {
    pub fn new(cache: Arc<StateCache>, metadata: Arc<dyn MetadataRepository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { cache, metadata, events }
    }

    /// Abonnement au flux de transitions d'état
    pub fn subscribe(&self) -> broadcast::Receiver<SensorState> {
        self.events.subscribe()
    }

    /// Traite un payload heartbeat brut reçu du bus
    pub async fn ingest(&self, payload: &[u8]) {
        let hb = match parse_heartbeat(payload) {
            Ok(hb) => hb,
            Err(EventError::Unparseable) => {
                eprintln!("[liveness] unparseable heartbeat payload, event dropped");
                return;
            }
            Err(EventError::MissingField(field)) => {
                eprintln!("[liveness] warning: heartbeat missing field '{field}', event dropped");
                return;
            }
        };

        // enrichissement best-effort : un id inconnu du repository garde
        // les champs portés par le heartbeat lui-même
        let metadata = match self.metadata.lookup(&hb.id) {
            Ok(meta) => meta,
            Err(MetadataError::NotFound(_)) => SensorMetadata {
                name: hb.name,
                cluster: hb.cluster,
                description: None,
            },
        };

        let state = SensorState {
            id: hb.id,
            metadata,
            active: true,
            last_update: OffsetDateTime::now_utc(),
            config: hb.config,
        };

        match self.cache.upsert_merge(state).await {
            Ok(merged) => self.notify(merged),
            Err(e) => {
                eprintln!("[liveness] cache write failed during ingest: {e}, event dropped");
            }
        }
    }

    /// Passe en revue le snapshot du cache et marque morts les capteurs
    /// silencieux depuis strictement plus que `dead_timeout`.
    pub async fn sweep(&self, now: OffsetDateTime, dead_timeout: time::Duration) {
        let snapshot = match self.cache.get_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                eprintln!("[liveness] sweep skipped, cache unavailable: {e}");
                return;
            }
        };

        for sensor in snapshot {
            if !sensor.active {
                continue;
            }
            if now - sensor.last_update <= dead_timeout {
                continue;
            }

            // métadonnées re-résolues au moment du verdict ; en cas d'échec
            // on garde celles déjà stockées
            let metadata = match self.metadata.lookup(&sensor.id) {
                Ok(meta) => meta,
                Err(MetadataError::NotFound(_)) => sensor.metadata.clone(),
            };

            let dead = SensorState {
                id: sensor.id.clone(),
                metadata,
                active: false,
                last_update: now,
                config: None, // fusion : la config stockée est conservée
            };

            match self.cache.upsert_merge(dead).await {
                Ok(merged) => {
                    println!("[liveness] sensor {} marked dead (silent since {})", sensor.id, sensor.last_update);
                    self.notify(merged);
                }
                Err(e) => {
                    eprintln!("[liveness] cache write failed for {} during sweep, skipped this cycle: {e}", sensor.id);
                }
            }
        }
    }

    fn notify(&self, state: SensorState) {
        // send n'échoue que sans abonnés ; l'état reste dérivable du cache
        let _ = self.events.send(state);
    }

    /// Démarre la tâche récurrente de sweep, possédée par le cycle de vie
    /// du manager ; abortable indépendamment de la souscription MQTT.
    pub fn spawn_sweeper(
        manager: Arc<LivenessManager>,
        sweep_interval: std::time::Duration,
        dead_timeout: time::Duration,
    ) -> JoinHandle<()> {
        println!(
            "[liveness] starting sweeper (interval: {:?}, dead timeout: {dead_timeout})",
            sweep_interval
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                manager.sweep(OffsetDateTime::now_utc(), dead_timeout).await;
            }
        })
    }
}
