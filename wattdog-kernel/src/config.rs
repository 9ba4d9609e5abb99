use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelConfig {
    #[serde(default)]
    pub scheduler: SchedulerConf,
    #[serde(default)]
    pub probe: ProbeConf,
    #[serde(default)]
    pub storage: StorageConf,
    pub mqtt: Option<MqttConf>,
    #[serde(default)]
    pub http: HttpConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConf {
    /// Cadence du polling ; paramètre de config pur, pas une constante de correction
    pub interval_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeConf {
    pub timeout_seconds: u64,
    /// Template optionnel, ex: "ping -c 1 -W {timeout} {address}"
    pub command: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConf {
    pub data_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub port: u16,
}

impl Default for SchedulerConf {
    fn default() -> Self {
        Self { interval_seconds: 120 }
    }
}

impl Default for ProbeConf {
    fn default() -> Self {
        Self { timeout_seconds: 5, command: None }
    }
}

impl Default for StorageConf {
    fn default() -> Self {
        Self { data_file: "./data/users.json".into() }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConf::default(),
            probe: ProbeConf::default(),
            storage: StorageConf::default(),
            mqtt: Some(MqttConf { host: "localhost".into(), port: 1883 }),
            http: HttpConf::default(),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("WATTDOG_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() { return KernelConfig::default(); }
        parse_config(&txt).unwrap_or_else(|e| {
            eprintln!("[kernel] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        eprintln!("[kernel] pas de kernel.yaml, usage config par défaut");
        KernelConfig::default()
    }
}

pub fn parse_config(txt: &str) -> Result<KernelConfig, serde_yaml::Error> {
    serde_yaml::from_str(txt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.scheduler.interval_seconds, 120);
        assert_eq!(cfg.probe.timeout_seconds, 5);
        assert!(cfg.probe.command.is_none());
        assert_eq!(cfg.storage.data_file, "./data/users.json");
        assert_eq!(cfg.mqtt.unwrap().port, 1883);
        assert_eq!(cfg.http.port, 8080);
    }

    #[test]
    fn test_parse_partial_yaml_keeps_defaults() {
        let cfg = parse_config("scheduler:\n  interval_seconds: 30\n").unwrap();
        assert_eq!(cfg.scheduler.interval_seconds, 30);
        assert_eq!(cfg.probe.timeout_seconds, 5);
        assert!(cfg.mqtt.is_none());
    }

    #[test]
    fn test_parse_full_yaml() {
        let txt = r#"
scheduler:
  interval_seconds: 60
probe:
  timeout_seconds: 2
  command: "ping -c 1 -W {timeout} {address}"
storage:
  data_file: /tmp/users.json
mqtt:
  host: broker.lan
  port: 1884
http:
  port: 9090
"#;
        let cfg = parse_config(txt).unwrap();
        assert_eq!(cfg.scheduler.interval_seconds, 60);
        assert_eq!(cfg.probe.command.as_deref(), Some("ping -c 1 -W {timeout} {address}"));
        assert_eq!(cfg.mqtt.unwrap().host, "broker.lan");
        assert_eq!(cfg.http.port, 9090);
    }
}
