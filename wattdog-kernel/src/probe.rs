/**
 * REACHABILITY PROBE - Détection binaire on/off d'un endpoint réseau
 *
 * RÔLE :
 * Détermine si l'endpoint d'un user répond, en lançant le binaire `ping`
 * système (un seul echo, timeout court). L'injoignabilité ordinaire
 * (timeout, host unreachable) est un ÉTAT (`off`), jamais une erreur.
 *
 * FONCTIONNEMENT :
 * - exit 0 du ping -> Power::On
 * - exit non-zéro ou timeout externe -> Power::Off
 * - ProbeError réservé à l'exceptionnel : adresse malformée, template
 *   de commande invalide, échec de lancement du process
 *
 * Pas de retry ici : une probe par user par tick, c'est le scheduler
 * qui décide de la cadence.
 */

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ProbeConf;
use crate::models::Power;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("malformed address: {0}")]
    InvalidAddress(String),
    #[error("invalid probe command template: {0}")]
    BadTemplate(String),
    #[error("failed to launch probe: {0}")]
    Launch(#[from] std::io::Error),
}

/// Contrat de la probe : probe(address) -> Power, erreur seulement si exceptionnel.
pub trait Probe {
    fn probe(&self, address: &str) -> impl std::future::Future<Output = Result<Power, ProbeError>> + Send;
}

/// Probe ICMP via le binaire `ping` système.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
    command: Option<String>,
}

impl PingProbe {
    pub fn new(cfg: &ProbeConf) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.timeout_seconds),
            command: cfg.command.clone(),
        }
    }

    /// Construit l'argv de la probe. Par défaut `ping -c 1 -W <secs> <addr>`,
    /// sinon le template config avec {address} et {timeout} substitués.
    fn command_line(&self, address: &str) -> Result<Vec<String>, ProbeError> {
        let secs = self.timeout.as_secs().max(1).to_string();
        match &self.command {
            Some(template) => {
                let rendered = template
                    .replace("{address}", address)
                    .replace("{timeout}", &secs);
                let argv = shell_words::split(&rendered)
                    .map_err(|e| ProbeError::BadTemplate(e.to_string()))?;
                if argv.is_empty() {
                    return Err(ProbeError::BadTemplate("empty command".into()));
                }
                Ok(argv)
            }
            None => Ok(vec![
                "ping".into(),
                "-c".into(),
                "1".into(),
                "-W".into(),
                secs,
                address.into(),
            ]),
        }
    }
}

impl Probe for PingProbe {
    async fn probe(&self, address: &str) -> Result<Power, ProbeError> {
        // Garde-fou : on ne passe jamais autre chose qu'un littéral IPv4 au process
        address
            .parse::<Ipv4Addr>()
            .map_err(|_| ProbeError::InvalidAddress(address.to_string()))?;

        let argv = self.command_line(address)?;
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Le -W du ping borne déjà l'attente ; le timeout externe couvre
        // les probes custom qui n'en ont pas
        let grace = self.timeout + Duration::from_secs(1);
        let status = match timeout(grace, cmd.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(ProbeError::Launch(e)),
            Err(_) => return Ok(Power::Off),
        };

        Ok(if status.success() { Power::On } else { Power::Off })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_with(command: Option<&str>) -> PingProbe {
        PingProbe::new(&ProbeConf {
            timeout_seconds: 3,
            command: command.map(String::from),
        })
    }

    #[test]
    fn test_default_command_line() {
        let argv = probe_with(None).command_line("10.0.0.5").unwrap();
        assert_eq!(argv, vec!["ping", "-c", "1", "-W", "3", "10.0.0.5"]);
    }

    #[test]
    fn test_custom_command_template() {
        let argv = probe_with(Some("fping -t {timeout} {address}"))
            .command_line("192.168.1.1")
            .unwrap();
        assert_eq!(argv, vec!["fping", "-t", "3", "192.168.1.1"]);
    }

    #[test]
    fn test_empty_template_rejected() {
        let err = probe_with(Some("   ")).command_line("10.0.0.5").unwrap_err();
        assert!(matches!(err, ProbeError::BadTemplate(_)));
    }

    #[tokio::test]
    async fn test_malformed_address_is_an_error() {
        let err = probe_with(None).probe("not-an-ip").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_failing_probe_command_maps_to_off() {
        // `false` se termine immédiatement avec un exit code non-zéro
        let power = probe_with(Some("false {address}")).probe("127.0.0.1").await.unwrap();
        assert_eq!(power, Power::Off);
    }

    #[tokio::test]
    async fn test_succeeding_probe_command_maps_to_on() {
        let power = probe_with(Some("true {address}")).probe("127.0.0.1").await.unwrap();
        assert_eq!(power, Power::On);
    }

    #[tokio::test]
    async fn test_unlaunchable_probe_is_an_error() {
        let err = probe_with(Some("wattdog-no-such-binary {address}"))
            .probe("127.0.0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Launch(_)));
    }
}
