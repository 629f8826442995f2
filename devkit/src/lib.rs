/*!
# Vigil DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement autour du kernel Vigil avec:
- Stubs MQTT pour tests sans broker
- Builders de payloads heartbeat conformes aux topics Vigil
- Harness de test avec assertions sur les messages échangés
*/

pub mod mqtt_stub;
pub mod test_utils;

pub use mqtt_stub::{MockMqttClient, VigilMessageBuilder};
pub use test_utils::TestHarness;
