/*!
Wattdog kernel - daemon de surveillance d'alimentation électrique.

Probe périodiquement l'endpoint réseau de chaque user enregistré, diff
l'état on/off observé contre l'état connu, publie un événement MQTT par
transition et persiste l'historique. Exposé en lib pour le devkit et les
tests d'intégration.
*/

pub mod config;
pub mod health;
pub mod http;
pub mod models;
pub mod mqtt;
pub mod notify;
pub mod probe;
pub mod registry;
pub mod scheduler;
