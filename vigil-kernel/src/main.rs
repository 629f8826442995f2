/**
 * VIGIL KERNEL - Point d'entrée principal du serveur Vigil
 *
 * RÔLE : Orchestration de tous les modules : config, cache, liveness,
 * MQTT, HTTP. Bootstrap du système complet avec gestion d'erreurs.
 *
 * ARCHITECTURE : Event-driven via MQTT + sweep périodique + API REST
 * + fan-out WebSocket des transitions alive/dead.
 */

mod cache;
mod config;
mod health;
mod http;
mod liveness;
mod metadata;
mod models;
mod mqtt;
mod state;

use crate::cache::StateCache;
use crate::config::load_config;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::liveness::LivenessManager;
use crate::metadata::ConfigMetadataRepository;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas

    let cfg = load_config().await;

    if let Some(parent) = std::path::Path::new(&cfg.data_file).parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            eprintln!("[kernel] warning: failed to create data dir: {e}");
        });
    }

    // cache d'état durable
    let cache = Arc::new(StateCache::new(&cfg.data_file));
    if let Err(e) = cache.load().await {
        eprintln!("[kernel] failed to load sensors cache: {e}");
    }

    // repository de métadonnées backé par la config
    let metadata = Arc::new(ConfigMetadataRepository::new(cfg.sensors.clone()));

    // health tracker
    let health_tracker = HealthTracker::new();

    // liveness manager : ingestion + sweep + notifications
    let manager = Arc::new(LivenessManager::new(cache.clone(), metadata));

    // MQTT alimente le manager
    let listener_task = mqtt::spawn_mqtt_listener(manager.clone(), cfg.clone(), health_tracker.clone());

    // sweep périodique des capteurs silencieux
    let sweeper_task = LivenessManager::spawn_sweeper(
        manager.clone(),
        std::time::Duration::from_millis(cfg.sweep_interval_ms),
        time::Duration::milliseconds(cfg.dead_timeout_ms as i64),
    );

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        cache,
        health_tracker,
        manager: manager.clone(),
    };

    // HTTP
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    println!("[kernel] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        println!("[kernel] shutting down");
    });
    if let Err(e) = server.await {
        eprintln!("[kernel] http server stopped: {e}");
    }

    // chaque tâche s'arrête indépendamment ; les écritures cache étant
    // atomiques, aucune mutation ne reste à moitié appliquée
    listener_task.abort();
    sweeper_task.abort();
}
