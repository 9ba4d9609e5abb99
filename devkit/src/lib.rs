/*!
# Wattdog DevKit - Stubs et Utilitaires de Test

Bibliothèque facilitant les tests du scheduler sans réseau ni broker:
- Probe scriptée (réponses par adresse, injection d'échecs)
- Notifier d'enregistrement (assertions sur les transitions livrées)
- Harness assemblant registre temporaire + stubs
*/

pub mod notify_stub;
pub mod probe_stub;
pub mod test_utils;

pub use notify_stub::RecordingNotifier;
pub use probe_stub::ScriptedProbe;
pub use test_utils::SchedulerHarness;
