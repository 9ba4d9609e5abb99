/**
 * POWER-STATE SCHEDULER - Boucle de polling et diff d'état
 *
 * RÔLE :
 * Cœur du kernel. À cadence fixe, probe l'endpoint de chaque user actif,
 * compare avec l'état connu, et sur transition : publie exactement un
 * événement puis commit le nouvel état + une entrée d'historique.
 *
 * FONCTIONNEMENT :
 * - un seul timer partagé pour tous les users (pas de timer par user)
 * - traitement séquentiel, chaque user indépendant des autres
 * - toute erreur par-user est loggée et contenue : le tick continue,
 *   la task scheduler ne se termine jamais
 *
 * SÉMANTIQUE DES ÉCHECS :
 * - ProbeError        -> user sauté ce tick, état intact
 * - DeliveryError     -> état quand même persisté, puis user désactivé
 *                        (soupape contre les cibles qui échouent en boucle)
 * - RegistryError     -> transition non committée, re-détection au tick
 *                        suivant (at-least-once, event_id pour dédupe)
 */

use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::health::HealthTracker;
use crate::models::{PowerTransition, User};
use crate::notify::Notifier;
use crate::probe::{Probe, ProbeError};
use crate::registry::{RegistryError, SharedUserRegistry, UserRegistry};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Storage(#[from] RegistryError),
}

/// Issue du traitement d'un user sur un tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Cas dominant : probe == état connu, zéro write, zéro notification
    Unchanged,
    /// Transition détectée, notifiée et committée
    Changed,
    /// Transition committée mais livraison échouée ; user désactivé
    ChangedDeliveryFailed,
}

/// Bilan d'un tick, pour les logs et les compteurs health.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    pub probed: u32,
    pub transitions: u32,
    pub failures: u32,
}

/// Démarre la boucle de polling sur un timer partagé.
pub fn spawn_scheduler<P, N>(
    registry: SharedUserRegistry,
    probe: P,
    notifier: N,
    health: HealthTracker,
    interval: Duration,
) where
    P: Probe + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    println!("[scheduler] starting power polling (interval: {}s)", interval.as_secs());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = run_tick(&registry, &probe, &notifier).await;
            health.record_tick(&summary);

            if summary.transitions > 0 || summary.failures > 0 {
                println!(
                    "[scheduler] tick done: {} probed, {} transitions, {} failures",
                    summary.probed, summary.transitions, summary.failures
                );
            }
        }
    });
}

/// Un tick complet : tous les users actifs, erreurs contenues par user.
pub async fn run_tick<P, N>(registry: &UserRegistry, probe: &P, notifier: &N) -> TickSummary
where
    P: Probe + Sync,
    N: Notifier + Sync,
{
    let mut summary = TickSummary::default();

    for user in registry.list_active_users().await {
        summary.probed += 1;
        match check_user(registry, probe, notifier, &user).await {
            Ok(CheckOutcome::Unchanged) => {}
            Ok(CheckOutcome::Changed) => summary.transitions += 1,
            Ok(CheckOutcome::ChangedDeliveryFailed) => {
                summary.transitions += 1;
                summary.failures += 1;
            }
            Err(e) => {
                summary.failures += 1;
                eprintln!("[scheduler] user {} check failed: {}", user.user_id, e);
            }
        }
    }

    summary
}

/// Machine à deux états par user : probe -> diff -> (notifier puis commit).
/// La persistance a lieu même si la livraison échoue, sinon l'état stocké
/// divergerait définitivement de la réalité.
async fn check_user<P, N>(
    registry: &UserRegistry,
    probe: &P,
    notifier: &N,
    user: &User,
) -> Result<CheckOutcome, CheckError>
where
    P: Probe + Sync,
    N: Notifier + Sync,
{
    let next = probe.probe(&user.address).await?;
    if next == user.power {
        return Ok(CheckOutcome::Unchanged);
    }

    let detected_at = OffsetDateTime::now_utc();
    let transition = PowerTransition {
        event_id: Uuid::new_v4(),
        user_id: user.user_id,
        power: next,
        since: user.updated_at,
        detected_at,
    };

    let delivery = notifier.notify_transition(&transition).await;

    registry.update_power(user.user_id, next, detected_at).await?;

    match delivery {
        Ok(()) => Ok(CheckOutcome::Changed),
        Err(e) => {
            eprintln!(
                "[scheduler] delivery failed for user {}, deactivating: {}",
                user.user_id, e
            );
            registry.set_active(user.user_id, false).await?;
            Ok(CheckOutcome::ChangedDeliveryFailed)
        }
    }
}
