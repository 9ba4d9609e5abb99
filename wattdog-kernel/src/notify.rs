/**
 * NOTIFICATION SINK - Sortie des événements de transition
 *
 * RÔLE :
 * Abstrait le canal de livraison des transitions (MQTT ici, le consommateur
 * en bout de chaîne fait le rendu chat/webhook). Best-effort : un échec de
 * livraison est signalé à l'appelant, c'est le scheduler qui désactive le
 * user fautif.
 *
 * COMMUNICATION MQTT :
 * Publie: wattdog/power/transition@v1 (payload = PowerTransition JSON)
 */

use rumqttc::{AsyncClient, QoS};

use crate::models::PowerTransition;

pub const TRANSITION_TOPIC: &str = "wattdog/power/transition@v1";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("payload encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish error: {0}")]
    Publish(#[from] rumqttc::ClientError),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Contrat du sink : une livraison par transition détectée.
pub trait Notifier {
    fn notify_transition(
        &self,
        transition: &PowerTransition,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

#[derive(Clone)]
pub struct MqttNotifier {
    client: AsyncClient,
}

impl MqttNotifier {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl Notifier for MqttNotifier {
    async fn notify_transition(&self, transition: &PowerTransition) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(transition)?;
        self.client
            .publish(TRANSITION_TOPIC, QoS::AtLeastOnce, false, payload)
            .await?;
        println!(
            "[notify] published transition {} (user {}, power {})",
            transition.event_id, transition.user_id, transition.power
        );
        Ok(())
    }
}
