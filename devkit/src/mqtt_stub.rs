/*!
Mock MQTT Client pour développement sans broker

Permet de développer et tester l'ingestion de heartbeats sans démarrer
un broker MQTT réel. Enregistre tous les messages publiés et permet de
simuler la réception.
*/

use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration d'un channel pour recevoir les messages simulés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Simule la publication d'un message (compatible avec AsyncClient)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        self.published_messages.lock().unwrap().push(message.clone());

        log::info!("📤 [MOCK] Published to {}: {} bytes", message.topic, message.payload.len());
        Ok(())
    }

    /// Simule l'abonnement à un topic (compatible avec AsyncClient)
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        self.subscriptions.lock().unwrap().push(topic.clone());
        log::info!("📥 [MOCK] Subscribed to {}", topic);
        Ok(())
    }

    /// Simule la réception d'un message (pour tests)
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };

        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender.send(message.clone()).map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }

        log::info!("📨 [MOCK] Simulated incoming: {}", message.topic);
        Ok(())
    }

    /// Récupère tous les messages publiés (pour assertions de tests)
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Récupère les abonnements (pour assertions de tests)
    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Trouve les messages publiés sur un topic donné
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse le dernier message d'un topic en JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    /// Reset tous les messages enregistrés
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper pour créer des payloads de test conformes aux topics Vigil
pub struct VigilMessageBuilder;

impl VigilMessageBuilder {
    /// Crée un heartbeat capteur v1 (shape minimale requise par le kernel)
    pub fn heartbeat_v1<S: Into<String>>(id: S, name: S, cluster: S) -> serde_json::Value {
        serde_json::json!({
            "id": id.into(),
            "name": name.into(),
            "cluster": cluster.into(),
            "ts": chrono::Utc::now().to_rfc3339()
        })
    }

    /// Heartbeat v1 porteur d'une config opaque
    pub fn heartbeat_v1_with_config<S: Into<String>>(
        id: S,
        name: S,
        cluster: S,
        config: serde_json::Value,
    ) -> serde_json::Value {
        let mut payload = Self::heartbeat_v1(id, name, cluster);
        payload["config"] = config;
        payload
    }

    /// Heartbeat volontairement incomplet (pour tester le rejet)
    pub fn heartbeat_v1_missing_cluster<S: Into<String>>(id: S, name: S) -> serde_json::Value {
        serde_json::json!({
            "id": id.into(),
            "name": name.into(),
            "ts": chrono::Utc::now().to_rfc3339()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio;

    #[tokio::test]
    async fn test_mock_client_publish_subscribe() {
        let client = MockMqttClient::new();

        // Test abonnement
        client.subscribe("vigil/sensors/heartbeat@v1", QoS::AtLeastOnce).await.unwrap();
        assert_eq!(client.get_subscriptions(), vec!["vigil/sensors/heartbeat@v1"]);

        // Test publication
        let payload = b"test message";
        client.publish("vigil/sensors/heartbeat@v1", QoS::AtLeastOnce, false, payload.to_vec()).await.unwrap();

        // Vérifier le message publié
        let messages = client.get_published_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "vigil/sensors/heartbeat@v1");
        assert_eq!(messages[0].payload, payload);
    }

    #[tokio::test]
    async fn test_json_message_parsing() {
        let client = MockMqttClient::new();

        let test_data = VigilMessageBuilder::heartbeat_v1("s-1", "temp", "paris");
        let payload = serde_json::to_vec(&test_data).unwrap();
        client.publish("json/topic", QoS::AtLeastOnce, false, payload).await.unwrap();

        // Parse du JSON
        let parsed: Option<serde_json::Value> = client.get_last_json_message("json/topic").unwrap();
        assert!(parsed.is_some());
        assert_eq!(parsed.unwrap()["id"], "s-1");
    }

    #[test]
    fn test_message_builders() {
        let heartbeat = VigilMessageBuilder::heartbeat_v1("s-1", "Rack 4 temp", "paris-dc");
        assert_eq!(heartbeat["id"], "s-1");
        assert_eq!(heartbeat["cluster"], "paris-dc");
        assert!(heartbeat.get("config").is_none());

        let with_config = VigilMessageBuilder::heartbeat_v1_with_config(
            "s-2", "hum", "lyon", serde_json::json!({"rate": 5}),
        );
        assert_eq!(with_config["config"]["rate"], 5);

        let broken = VigilMessageBuilder::heartbeat_v1_missing_cluster("s-3", "co2");
        assert!(broken.get("cluster").is_none());
    }
}
