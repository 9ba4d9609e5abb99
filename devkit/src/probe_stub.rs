/*!
Probe scriptée pour tests sans réseau

Remplace la probe ICMP réelle. Chaque adresse a une file de réponses
scriptées et/ou une réponse par défaut ; toutes les probes effectuées sont
enregistrées pour les assertions (ex: "les users inactifs ne sont jamais
probés").
*/

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use wattdog_kernel::models::Power;
use wattdog_kernel::probe::{Probe, ProbeError};

#[derive(Debug, Clone)]
enum ScriptedReply {
    Power(Power),
    Failure(String),
}

/// Probe mock qui rejoue des réponses préparées.
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    queues: Arc<Mutex<HashMap<String, VecDeque<ScriptedReply>>>>,
    defaults: Arc<Mutex<HashMap<String, Power>>>,
    probed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Réponse par défaut pour une adresse (utilisée quand la file est vide).
    pub fn always(&self, address: &str, power: Power) {
        self.defaults.lock().unwrap().insert(address.to_string(), power);
    }

    /// Empile une réponse one-shot pour une adresse.
    pub fn push_reply(&self, address: &str, power: Power) {
        self.queues
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push_back(ScriptedReply::Power(power));
    }

    /// Empile un échec de probe (ProbeError côté scheduler).
    pub fn push_failure(&self, address: &str, reason: &str) {
        self.queues
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push_back(ScriptedReply::Failure(reason.to_string()));
    }

    /// Toutes les adresses probées, dans l'ordre (pour assertions).
    pub fn probed_addresses(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }

    pub fn probe_count(&self, address: &str) -> usize {
        self.probed.lock().unwrap().iter().filter(|a| *a == address).count()
    }
}

impl Probe for ScriptedProbe {
    async fn probe(&self, address: &str) -> Result<Power, ProbeError> {
        self.probed.lock().unwrap().push(address.to_string());

        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(|queue| queue.pop_front());

        let reply = match scripted {
            Some(reply) => reply,
            None => match self.defaults.lock().unwrap().get(address) {
                Some(power) => ScriptedReply::Power(*power),
                // Adresse non scriptée = bug du test, on le signale comme
                // un échec de probe plutôt que d'inventer un état
                None => ScriptedReply::Failure(format!("no scripted reply for {address}")),
            },
        };

        match reply {
            ScriptedReply::Power(power) => {
                log::info!("[stub] probe {} -> {}", address, power);
                Ok(power)
            }
            ScriptedReply::Failure(reason) => {
                log::info!("[stub] probe {} -> failure: {}", address, reason);
                Err(ProbeError::Launch(std::io::Error::other(reason)))
            }
        }
    }
}
