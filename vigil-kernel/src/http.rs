/**
 * API REST VIGIL - Surface HTTP du kernel
 *
 * RÔLE :
 * Expose le snapshot du cache capteurs et le flux temps réel des
 * transitions d'état. Interface principale entre dashboard/CLI et kernel.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes : /health, /system/health, /sensors, /sensors/{id}
 * - /events : upgrade WebSocket branché sur le canal broadcast du
 *   Liveness Manager ; chaque transition part en frame JSON vers tous
 *   les observateurs connectés (fan-out, pas de ciblage)
 * - Un client lent subit du lag (events les plus anciens perdus) mais ne
 *   ralentit jamais l'ingestion ni le sweep
 */

use crate::cache::StateCache;
use crate::health::HealthTracker;
use crate::liveness::LivenessManager;
use crate::models::SensorState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StateCache>,
    pub health_tracker: HealthTracker,
    pub manager: Arc<LivenessManager>,
}

#[derive(serde::Serialize)]
struct SensorView {
    id: String,
    name: String,
    cluster: String,
    description: Option<String>,
    active: bool,
    last_update: String,     // format RFC3339 pour l'API
    age_seconds: i64,        // silence en secondes
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<serde_json::Value>,
}

fn to_view(s: &SensorState) -> SensorView {
    let now = OffsetDateTime::now_utc();
    let age = now - s.last_update;
    SensorView {
        id: s.id.clone(),
        name: s.metadata.name.clone(),
        cluster: s.metadata.cluster.clone(),
        description: s.metadata.description.clone(),
        active: s.active,
        last_update: s.last_update.format(&Rfc3339).unwrap_or_default(),
        age_seconds: age.whole_seconds().max(0),
        config: s.config.clone(),
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/sensors", get(get_sensors))
        .route("/sensors/{id}", get(get_sensor))
        .route("/events", get(events_upgrade))
        .with_state(app_state)
}

// GET /sensors (liste)
async fn get_sensors(State(app): State<AppState>) -> Result<Json<Vec<SensorView>>, StatusCode> {
    match app.cache.get_all().await {
        Ok(sensors) => Ok(Json(sensors.iter().map(to_view).collect())),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

// GET /sensors/:id (détail)
async fn get_sensor(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SensorView>, StatusCode> {
    match app.cache.get_one(&id).await {
        Ok(Some(sensor)) => Ok(Json(to_view(&sensor))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

// GET /system/health (état du kernel)
async fn get_system_health(State(app): State<AppState>) -> Json<crate::health::KernelHealth> {
    let tracked = app.cache.len().await;
    Json(app.health_tracker.get_health(tracked))
}

// GET /events (upgrade WebSocket, flux des transitions)
async fn events_upgrade(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    let rx = app.manager.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}

async fn forward_events(mut socket: WebSocket, mut rx: broadcast::Receiver<SensorState>) {
    loop {
        match rx.recv().await {
            Ok(state) => {
                let payload = match serde_json::to_string(&state) {
                    Ok(payload) => payload,
                    Err(e) => {
                        eprintln!("[http] failed to serialize event: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    // client parti : on ferme ce forwarder, le broadcast continue
                    return;
                }
            }
            // client trop lent : les events les plus anciens sont perdus,
            // l'état complet reste disponible via GET /sensors
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                eprintln!("[http] events client lagged, {skipped} events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SensorMetadata;

    #[test]
    fn view_exposes_age_and_rfc3339_timestamp() {
        let state = SensorState {
            id: "s-1".into(),
            metadata: SensorMetadata {
                name: "temp".into(),
                cluster: "paris".into(),
                description: None,
            },
            active: true,
            last_update: OffsetDateTime::now_utc() - time::Duration::seconds(42),
            config: None,
        };

        let view = to_view(&state);
        assert_eq!(view.age_seconds, 42);
        assert!(view.last_update.contains('T'));
        assert!(view.active);
    }
}
