use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use rumqttc::{AsyncClient, QoS};
use tokio::task;

use crate::registry::SharedUserRegistry;
use crate::scheduler::TickSummary;

pub const HEALTH_TOPIC: &str = "wattdog/kernel/health@v1";

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub users_tracked: u32,
    pub users_active: u32,
    pub ticks_completed: u64,
    pub transitions_detected: u64,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    ticks: Arc<AtomicU64>,
    transitions: Arc<AtomicU64>,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<parking_lot::Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: Arc::new(AtomicU64::new(0)),
            transitions: Arc::new(AtomicU64::new(0)),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(parking_lot::Mutex::new("connecting".to_string())),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn record_tick(&self, summary: &TickSummary) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.transitions.fetch_add(summary.transitions as u64, Ordering::Relaxed);
    }

    pub async fn get_health(&self, registry: &SharedUserRegistry) -> KernelHealth {
        let users = registry.list_users().await;
        let active = users.values().filter(|u| u.is_active).count() as u32;

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            users_tracked: users.len() as u32,
            users_active: active,
            ticks_completed: self.ticks.load(Ordering::Relaxed),
            transitions_detected: self.transitions.load(Ordering::Relaxed),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }

    /// Démarre la publication auto du health kernel (toutes les 30s).
    pub fn spawn_health_publisher(&self, client: AsyncClient, registry: SharedUserRegistry) {
        let health_tracker = self.clone();

        task::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            loop {
                interval.tick().await;
                let health = health_tracker.get_health(&registry).await;
                if let Ok(payload) = serde_json::to_string(&health) {
                    if let Err(e) = client.publish(HEALTH_TOPIC, QoS::AtLeastOnce, false, payload).await {
                        eprintln!("[health] failed to publish: {:?}", e);
                    } else {
                        println!(
                            "[health] published kernel health (uptime: {}s, users: {})",
                            health.uptime_seconds, health.users_tracked
                        );
                    }
                }
            }
        });
    }
}
