/**
 * WATTDOG KERNEL - Point d'entrée principal du daemon
 *
 * RÔLE : Orchestration de tous les modules : config, registre users, MQTT,
 * scheduler de probes, health, API REST. Bootstrap complet avec gestion
 * d'erreurs et logging.
 *
 * ARCHITECTURE : un timer partagé pour le polling + events MQTT sortants
 * + API REST pour l'onboarding et l'administration.
 */

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use wattdog_kernel::config::{load_config, KernelConfig};
use wattdog_kernel::health::HealthTracker;
use wattdog_kernel::http::{self, AppState};
use wattdog_kernel::mqtt;
use wattdog_kernel::notify::MqttNotifier;
use wattdog_kernel::probe::PingProbe;
use wattdog_kernel::registry::{SharedUserRegistry, UserRegistry};
use wattdog_kernel::scheduler;

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas

    let cfg: KernelConfig = load_config().await;

    // registre users avec persistance JSON
    if let Some(parent) = Path::new(&cfg.storage.data_file).parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            eprintln!("[kernel] warning: failed to create data dir: {}", e);
        });
    }

    let registry: SharedUserRegistry = Arc::new(UserRegistry::new(&cfg.storage.data_file));
    if let Err(e) = registry.load_users().await {
        eprintln!("[kernel] failed to load users: {}", e);
    }

    // health tracker
    let health_tracker = HealthTracker::new();

    // client MQTT partagé pour le notifier et le health publisher
    let (mqtt_client, eventloop) = match mqtt::create_mqtt_client(&cfg) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("[kernel] failed to create MQTT client: {}", e);
            std::process::exit(1);
        }
    };
    mqtt::spawn_mqtt_eventloop(eventloop, health_tracker.clone());

    // publication auto du health
    health_tracker.spawn_health_publisher(mqtt_client.clone(), registry.clone());

    // scheduler : probe -> diff -> notify -> persist
    let probe = PingProbe::new(&cfg.probe);
    let notifier = MqttNotifier::new(mqtt_client.clone());
    scheduler::spawn_scheduler(
        registry.clone(),
        probe.clone(),
        notifier,
        health_tracker.clone(),
        Duration::from_secs(cfg.scheduler.interval_seconds),
    );

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        registry,
        health_tracker,
        probe,
    };

    // HTTP
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    println!("[kernel] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
