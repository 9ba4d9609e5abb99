use anyhow::{bail, Result};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Incoming, MqttOptions};
use std::time::Duration;
use tokio::task;

use crate::config::{KernelConfig, MqttConf};
use crate::health::HealthTracker;

/// Construit le client MQTT partagé (notifier + health publisher).
pub fn create_mqtt_client(cfg: &KernelConfig) -> Result<(AsyncClient, EventLoop)> {
    let mqtt_cfg = cfg
        .mqtt
        .clone()
        .unwrap_or_else(|| MqttConf { host: "localhost".into(), port: 1883 });

    if mqtt_cfg.host.trim().is_empty() {
        bail!("mqtt host must not be empty");
    }

    let mut opts = MqttOptions::new("wattdog-kernel", &mqtt_cfg.host, mqtt_cfg.port);
    opts.set_keep_alive(Duration::from_secs(15));

    Ok(AsyncClient::new(opts, 10))
}

/// Fait tourner l'eventloop rumqttc et alimente le health tracker.
/// Sans cette task, les publish du client ne partent jamais.
pub fn spawn_mqtt_eventloop(mut eventloop: EventLoop, health: HealthTracker) {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    println!("[mqtt] connected to broker");
                    health.mark_mqtt_connected();
                }
                Ok(_) => {} // autres événements MQTT ignorés
                Err(e @ ConnectionError::ConnectionRefused(_)) => {
                    eprintln!("[mqtt] broker refused connection: {:?}", e);
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(e) => {
                    eprintln!("[mqtt] error: {:?}", e);
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
