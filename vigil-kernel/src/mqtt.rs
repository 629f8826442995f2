use crate::config::{KernelConfig, MqttConf};
use crate::health::HealthTracker;
use crate::liveness::LivenessManager;
use rumqttc::{AsyncClient, Event, MqttOptions, QoS};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Souscrit au topic heartbeat et alimente le Liveness Manager.
/// Tâche indépendante du sweeper : chacune s'arrête sans l'autre.
pub fn spawn_mqtt_listener(
    manager: Arc<LivenessManager>,
    cfg: KernelConfig,
    health: HealthTracker,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mqtt_cfg = cfg
            .mqtt
            .clone()
            .unwrap_or_else(|| MqttConf { host: "localhost".into(), port: 1883 });

        // suffixe unique : deux kernels sur le même broker ne se volent pas la session
        let client_id = format!("vigil-kernel-{}", Uuid::new_v4());
        let mut opts = MqttOptions::new(client_id, &mqtt_cfg.host, mqtt_cfg.port);
        opts.set_keep_alive(std::time::Duration::from_secs(15));

        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        if let Err(e) = client.subscribe(&cfg.heartbeat_topic, QoS::AtLeastOnce).await {
            eprintln!("[mqtt] subscribe failed: {e:?}");
            return;
        }
        println!("[mqtt] subscribed to {}", cfg.heartbeat_topic);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(rumqttc::Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                }
                Ok(Event::Incoming(rumqttc::Incoming::Publish(p)))
                    if p.topic == cfg.heartbeat_topic =>
                {
                    manager.ingest(&p.payload).await;
                }
                Ok(Event::Incoming(rumqttc::Incoming::Disconnect)) => {
                    health.mark_mqtt_disconnected();
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("[mqtt] connection error: {e:?}");
                    health.increment_reconnects();
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    })
}
