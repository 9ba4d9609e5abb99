//! Tests d'intégration du scheduler via le devkit (probe scriptée +
//! notifier d'enregistrement, registre sur répertoire temporaire).

use std::time::Duration;

use wattdog_devkit::SchedulerHarness;
use wattdog_kernel::models::Power;

// Laisse l'horloge avancer entre onboarding et tick, pour pouvoir
// asserter updated_at strictement croissant
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

#[tokio::test]
async fn no_change_tick_is_idempotent() {
    let h = SchedulerHarness::new().unwrap();
    let before = h.onboard(1, "10.0.0.1", Power::On).await.unwrap();
    h.probe.always("10.0.0.1", Power::On);

    let summary = h.tick().await;

    assert_eq!(summary.probed, 1);
    assert_eq!(summary.transitions, 0);
    assert_eq!(h.notifier.delivery_count(), 0);

    // Zéro write : état et historique inchangés
    let after = h.user(1).await.unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.history.len(), 1);
}

#[tokio::test]
async fn transition_emits_exactly_one_notification_and_history_entry() {
    let h = SchedulerHarness::new().unwrap();
    let before = h.onboard(42, "10.0.0.5", Power::Off).await.unwrap();
    h.probe.always("10.0.0.5", Power::On);
    settle().await;

    // Tick 1 : Off -> On
    let summary = h.tick().await;
    assert_eq!(summary.transitions, 1);

    let deliveries = h.notifier.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].user_id, 42);
    assert_eq!(deliveries[0].power, Power::On);
    // `since` porte l'updated_at précédent (durée de l'ancien état)
    assert_eq!(deliveries[0].since, before.updated_at);
    assert!(deliveries[0].detected_at > before.updated_at);

    let after = h.user(42).await.unwrap();
    assert_eq!(after.power, Power::On);
    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.history.len(), 2);
    assert_eq!(after.history.last().unwrap().power, Power::On);

    // Tick 2 immédiat, pas de vrai changement : zéro notification, zéro write
    let summary = h.tick().await;
    assert_eq!(summary.transitions, 0);
    assert_eq!(h.notifier.delivery_count(), 1);
    let unchanged = h.user(42).await.unwrap();
    assert_eq!(unchanged.updated_at, after.updated_at);
    assert_eq!(unchanged.history.len(), 2);
}

#[tokio::test]
async fn deactivated_users_are_never_probed() {
    let h = SchedulerHarness::new().unwrap();
    h.onboard(1, "10.0.0.1", Power::On).await.unwrap();
    h.onboard(2, "10.0.0.2", Power::On).await.unwrap();
    h.registry.set_active(2, false).await.unwrap();

    h.probe.always("10.0.0.1", Power::On);
    // 10.0.0.2 volontairement non scripté : une probe ferait échouer le test

    let summary = h.tick().await;

    assert_eq!(summary.probed, 1);
    assert_eq!(summary.failures, 0);
    assert_eq!(h.probe.probe_count("10.0.0.2"), 0);

    let skipped = h.user(2).await.unwrap();
    assert_eq!(skipped.history.len(), 1);
}

#[tokio::test]
async fn probe_failure_does_not_block_other_users() {
    let h = SchedulerHarness::new().unwrap();
    h.onboard(1, "10.0.0.1", Power::On).await.unwrap();
    h.onboard(2, "10.0.0.2", Power::On).await.unwrap();
    h.onboard(3, "10.0.0.3", Power::On).await.unwrap();

    h.probe.push_failure("10.0.0.1", "icmp subsystem down");
    h.probe.always("10.0.0.1", Power::On);
    h.probe.always("10.0.0.2", Power::Off);
    h.probe.always("10.0.0.3", Power::On);

    let summary = h.tick().await;

    // Le user 1 est sauté, les users 2 et 3 sont traités normalement
    assert_eq!(summary.probed, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.transitions, 1);

    let failed = h.user(1).await.unwrap();
    assert_eq!(failed.power, Power::On);
    assert_eq!(failed.history.len(), 1);

    let transitioned = h.user(2).await.unwrap();
    assert_eq!(transitioned.power, Power::Off);
    assert_eq!(transitioned.history.len(), 2);
    assert_eq!(h.notifier.deliveries_for(2).len(), 1);

    // Et l'échec est ponctuel : le tick suivant retraite le user 1
    let summary = h.tick().await;
    assert_eq!(summary.failures, 0);
}

#[tokio::test]
async fn delivery_failure_persists_state_then_deactivates_user() {
    let h = SchedulerHarness::new().unwrap();
    h.onboard(7, "192.168.1.1", Power::Off).await.unwrap();
    h.probe.always("192.168.1.1", Power::On);
    h.notifier.reject_user(7);

    let summary = h.tick().await;
    assert_eq!(summary.transitions, 1);
    assert_eq!(summary.failures, 1);

    // L'état est quand même committé (sinon désync permanente avec la réalité)
    let user = h.user(7).await.unwrap();
    assert_eq!(user.power, Power::On);
    assert_eq!(user.history.len(), 2);

    // Soupape : le user fautif est désactivé et n'est plus probé
    assert!(!user.is_active);
    let summary = h.tick().await;
    assert_eq!(summary.probed, 0);
    assert_eq!(h.probe.probe_count("192.168.1.1"), 1);
}

#[tokio::test]
async fn history_grows_monotonically_and_tail_matches_power() {
    let h = SchedulerHarness::new().unwrap();
    h.onboard(9, "10.1.1.1", Power::On).await.unwrap();

    let sequence = [
        Power::On,  // inchangé
        Power::Off, // transition
        Power::Off, // inchangé
        Power::On,  // transition
        Power::Off, // transition
    ];
    for power in sequence {
        h.probe.push_reply("10.1.1.1", power);
    }

    let mut last_len = 1;
    for _ in 0..sequence.len() {
        settle().await;
        h.tick().await;

        let user = h.user(9).await.unwrap();
        assert!(user.history.len() >= last_len, "history must only grow");
        assert_eq!(user.history.last().unwrap().power, user.power);
        last_len = user.history.len();
    }

    let user = h.user(9).await.unwrap();
    assert_eq!(user.power, Power::Off);
    assert_eq!(user.history.len(), 4); // seed + 3 transitions
    assert_eq!(h.notifier.delivery_count(), 3);
}

#[tokio::test]
async fn first_tick_after_onboarding_is_not_special_cased() {
    let h = SchedulerHarness::new().unwrap();
    // Onboardé Off (probe initiale pendant une coupure), le courant revient
    // avant le tout premier tick : transition normale attendue
    let before = h.onboard(5, "10.2.2.2", Power::Off).await.unwrap();
    h.probe.always("10.2.2.2", Power::On);
    settle().await;

    h.tick().await;

    let deliveries = h.notifier.deliveries_for(5);
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].since, before.updated_at);
}
