/*!
Test Harness pour le kernel Vigil

Facilite l'écriture de tests autour de l'ingestion heartbeat avec:
- Setup automatique du mock MQTT
- Envoi de heartbeats bien formés ou volontairement cassés
- Assertions sur les messages échangés
*/

use crate::mqtt_stub::{MockMqttClient, VigilMessageBuilder};
use serde_json::Value;
use std::time::Duration;
use anyhow::Result;

pub const HEARTBEAT_TOPIC: &str = "vigil/sensors/heartbeat@v1";

/// Harness de test complet autour du bus Vigil
pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

impl TestHarness {
    /// Crée un nouveau harness de test
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            mqtt_client: MockMqttClient::new(),
            expectations: Vec::new(),
        }
    }

    /// Ajoute une expectation: on s'attend à recevoir N messages sur un topic
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    /// Simule l'envoi d'un heartbeat capteur bien formé
    pub async fn send_heartbeat(&self, id: &str, name: &str, cluster: &str) -> Result<()> {
        let payload = VigilMessageBuilder::heartbeat_v1(id, name, cluster);
        let payload_bytes = serde_json::to_vec(&payload)?;

        self.mqtt_client.simulate_incoming(HEARTBEAT_TOPIC, payload_bytes).await?;
        log::info!("💓 Sent heartbeat for sensor: {}", id);
        Ok(())
    }

    /// Simule l'envoi d'un heartbeat porteur de config
    pub async fn send_heartbeat_with_config(
        &self,
        id: &str,
        name: &str,
        cluster: &str,
        config: Value,
    ) -> Result<()> {
        let payload = VigilMessageBuilder::heartbeat_v1_with_config(id, name, cluster, config);
        let payload_bytes = serde_json::to_vec(&payload)?;

        self.mqtt_client.simulate_incoming(HEARTBEAT_TOPIC, payload_bytes).await?;
        log::info!("💓 Sent heartbeat with config for sensor: {}", id);
        Ok(())
    }

    /// Simule un payload brut arbitraire (heartbeats cassés compris)
    pub async fn send_raw(&self, payload: Vec<u8>) -> Result<()> {
        self.mqtt_client.simulate_incoming(HEARTBEAT_TOPIC, payload).await?;
        log::info!("📨 Sent raw payload on {}", HEARTBEAT_TOPIC);
        Ok(())
    }

    /// Attend et vérifie qu'un message a été publié sur un topic
    pub async fn wait_for_message(&self, topic: &str, timeout_ms: u64) -> Result<Option<Value>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
                log::info!("✅ Received expected message on {}", topic);
                return Ok(Some(msg));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        log::warn!("⏰ Timeout waiting for message on {}", topic);
        Ok(None)
    }

    /// Vérifie toutes les expectations configurées
    pub async fn verify_expectations(&self) -> Result<()> {
        log::info!("🔍 Verifying {} expectations...", self.expectations.len());

        for expectation in &self.expectations {
            let messages = self.mqtt_client.find_messages_by_topic(&expectation.topic);
            let actual_count = messages.len();

            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for topic '{}': expected {} messages, got {}",
                    expectation.topic, expectation.expected_count, actual_count
                );
            }

            log::info!("✅ Topic '{}': {} messages as expected",
                      expectation.topic, actual_count);
        }

        Ok(())
    }

    /// Assert qu'un champ a une valeur spécifique dans le dernier message
    pub fn assert_field_equals(&self, topic: &str, field_path: &str, expected: &Value) -> Result<()> {
        if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
            if let Some(actual) = self.get_nested_field(&msg, field_path) {
                if actual == expected {
                    return Ok(());
                } else {
                    anyhow::bail!("Field '{}' mismatch: expected {:?}, got {:?}",
                                 field_path, expected, actual);
                }
            }
        }

        anyhow::bail!("Field '{}' not found for comparison in {}", field_path, topic);
    }

    fn get_nested_field<'a>(&self, value: &'a Value, path: &str) -> Option<&'a Value> {
        let mut current = value;
        for part in path.split('.') {
            match current {
                Value::Object(obj) => {
                    current = obj.get(part)?;
                }
                _ => return None,
            }
        }
        Some(current)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::QoS;

    #[tokio::test]
    async fn harness_records_incoming_heartbeats() {
        let harness = TestHarness::new();
        let mut receiver = harness.mqtt_client.setup_receiver();

        harness.send_heartbeat("s-1", "temp", "paris").await.unwrap();

        let msg = receiver.recv().await.unwrap();
        assert_eq!(msg.topic, HEARTBEAT_TOPIC);
        let payload: Value = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(payload["cluster"], "paris");
    }

    #[tokio::test]
    async fn expectations_count_published_messages() {
        let mut harness = TestHarness::new();
        harness.expect_messages("vigil/out", 2);

        harness.mqtt_client.publish("vigil/out", QoS::AtLeastOnce, false, b"a".to_vec()).await.unwrap();
        harness.mqtt_client.publish("vigil/out", QoS::AtLeastOnce, false, b"b".to_vec()).await.unwrap();

        harness.verify_expectations().await.unwrap();
    }

    #[tokio::test]
    async fn assert_field_equals_navigates_nested_paths() {
        let harness = TestHarness::new();
        let payload = serde_json::json!({"metadata": {"cluster": "paris-dc"}});
        harness.mqtt_client
            .publish("vigil/out", QoS::AtLeastOnce, false, serde_json::to_vec(&payload).unwrap())
            .await
            .unwrap();

        harness
            .assert_field_equals("vigil/out", "metadata.cluster", &Value::String("paris-dc".into()))
            .unwrap();
    }
}
