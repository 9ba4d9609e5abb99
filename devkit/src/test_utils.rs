/*!
Harness de test pour le scheduler Wattdog

Assemble un registre sur répertoire temporaire, une probe scriptée et un
notifier d'enregistrement, et expose un `tick()` qui exécute exactement un
cycle de polling.
*/

use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use wattdog_kernel::models::{Power, User};
use wattdog_kernel::registry::{SharedUserRegistry, UserRegistry};
use wattdog_kernel::scheduler::{self, TickSummary};

use crate::notify_stub::RecordingNotifier;
use crate::probe_stub::ScriptedProbe;

pub struct SchedulerHarness {
    pub registry: SharedUserRegistry,
    pub probe: ScriptedProbe,
    pub notifier: RecordingNotifier,
    // Garde le répertoire de données vivant pendant le test
    _data_dir: TempDir,
}

impl SchedulerHarness {
    pub fn new() -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        let data_dir = tempfile::tempdir()?;
        let registry = Arc::new(UserRegistry::new(data_dir.path().join("users.json")));

        Ok(Self {
            registry,
            probe: ScriptedProbe::new(),
            notifier: RecordingNotifier::new(),
            _data_dir: data_dir,
        })
    }

    /// Onboarde un user avec un état initial donné (équivalent du flow
    /// d'enregistrement, sans probe réelle).
    pub async fn onboard(&self, user_id: u64, address: &str, power: Power) -> Result<User> {
        let user = self.registry.register_user(user_id, address.to_string(), power).await?;
        log::info!("[harness] onboarded user {} at {}", user_id, address);
        Ok(user)
    }

    /// Exécute exactement un tick du scheduler.
    pub async fn tick(&self) -> TickSummary {
        scheduler::run_tick(&self.registry, &self.probe, &self.notifier).await
    }

    pub async fn user(&self, user_id: u64) -> Option<User> {
        self.registry.get_user(user_id).await
    }
}
