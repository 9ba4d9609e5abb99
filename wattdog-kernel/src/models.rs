use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// État d'alimentation observé pour un endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    Off,
    On,
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Power::Off => write!(f, "off"),
            Power::On => write!(f, "on"),
        }
    }
}

/// Une observation horodatée, entrée de l'historique append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub created_at: OffsetDateTime,
    pub power: Power,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    /// Adresse IPv4 de l'endpoint pingé (routeur domestique en général)
    pub address: String,
    /// Les users inactifs ne sont jamais probés par le scheduler
    pub is_active: bool,
    /// Dernier état connu ; updated_at = moment du dernier changement
    pub power: Power,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    /// Jamais vide, sa dernière entrée reflète toujours `power`
    pub history: Vec<Observation>,
}

/// Événement publié à chaque transition détectée.
/// `since` = updated_at précédent, pour calculer la durée de l'ancien état.
/// `event_id` sert de clé de déduplication côté consommateur (at-least-once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerTransition {
    pub event_id: Uuid,
    pub user_id: u64,
    pub power: Power,
    pub since: OffsetDateTime,
    pub detected_at: OffsetDateTime,
}

pub type UsersMap = HashMap<u64, User>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Power::On).unwrap(), "\"on\"");
        assert_eq!(serde_json::to_string(&Power::Off).unwrap(), "\"off\"");
        assert_eq!(serde_json::from_str::<Power>("\"off\"").unwrap(), Power::Off);
    }

    #[test]
    fn test_power_display() {
        assert_eq!(Power::On.to_string(), "on");
        assert_eq!(Power::Off.to_string(), "off");
    }
}
