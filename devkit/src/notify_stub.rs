/*!
Notifier d'enregistrement pour tests sans broker

Capture chaque transition livrée et permet d'injecter des refus de
livraison par user (pour vérifier la soupape de désactivation).
*/

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use wattdog_kernel::models::PowerTransition;
use wattdog_kernel::notify::{DeliveryError, Notifier};

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<PowerTransition>>>,
    rejected_users: Arc<Mutex<HashSet<u64>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toute livraison vers ce user échouera avec DeliveryError.
    pub fn reject_user(&self, user_id: u64) {
        self.rejected_users.lock().unwrap().insert(user_id);
    }

    /// Transitions livrées avec succès, dans l'ordre.
    pub fn deliveries(&self) -> Vec<PowerTransition> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    pub fn deliveries_for(&self, user_id: u64) -> Vec<PowerTransition> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify_transition(&self, transition: &PowerTransition) -> Result<(), DeliveryError> {
        if self.rejected_users.lock().unwrap().contains(&transition.user_id) {
            log::info!("[stub] rejecting delivery for user {}", transition.user_id);
            return Err(DeliveryError::Rejected(format!(
                "scripted rejection for user {}",
                transition.user_id
            )));
        }

        log::info!(
            "[stub] delivered transition for user {} -> {}",
            transition.user_id,
            transition.power
        );
        self.delivered.lock().unwrap().push(transition.clone());
        Ok(())
    }
}
