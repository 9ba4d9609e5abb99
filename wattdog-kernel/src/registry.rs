/**
 * USER REGISTRY - Annuaire des users surveillés avec persistance JSON
 *
 * RÔLE :
 * Source de vérité sur les users : endpoint à pinger, état connu,
 * historique des observations, flag actif/inactif.
 *
 * FONCTIONNEMENT :
 * - Map en mémoire sous RwLock = snapshot cohérent pour les lecteurs
 *   (jamais d'écriture partielle visible)
 * - Chaque mutation réécrit le fichier JSON (./data/users.json)
 * - power + updated_at + history mutés ensemble, sous le même write lock
 *
 * Le scheduler est le seul écrivain de `power` ; l'onboarding et le flow
 * change-address n'écrivent jamais le même user en concurrence.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::models::{Observation, Power, User, UsersMap};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unknown user {0}")]
    UnknownUser(u64),
    #[error("user {0} already registered")]
    AlreadyRegistered(u64),
}

pub struct UserRegistry {
    users: Arc<RwLock<UsersMap>>,
    data_file: PathBuf,
}

pub type SharedUserRegistry = Arc<UserRegistry>;

impl UserRegistry {
    pub fn new<P: Into<PathBuf>>(data_file: P) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            data_file: data_file.into(),
        }
    }

    /// Charge le snapshot depuis le disque. Fichier absent = démarrage à vide.
    pub async fn load_users(&self) -> Result<usize, RegistryError> {
        if !Path::new(&self.data_file).exists() {
            println!("[users] no existing users file, starting fresh");
            return Ok(0);
        }

        let content = tokio::fs::read_to_string(&self.data_file).await?;
        let users: UsersMap = serde_json::from_str(&content)?;

        let mut map = self.users.write().await;
        let count = users.len();
        *map = users;

        println!("[users] loaded {} users from {}", count, self.data_file.display());
        Ok(count)
    }

    /// Réécrit le snapshot JSON complet.
    async fn save_users(&self) -> Result<(), RegistryError> {
        let map = self.users.read().await;
        let content = serde_json::to_string_pretty(&*map)?;
        tokio::fs::write(&self.data_file, content).await?;
        Ok(())
    }

    /// Onboarding : crée le user avec le résultat de la probe initiale,
    /// l'historique démarre avec cette première observation.
    pub async fn register_user(
        &self,
        user_id: u64,
        address: String,
        power: Power,
    ) -> Result<User, RegistryError> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            user_id,
            address,
            is_active: true,
            power,
            created_at: now,
            updated_at: now,
            history: vec![Observation { created_at: now, power }],
        };

        {
            let mut map = self.users.write().await;
            if map.contains_key(&user_id) {
                return Err(RegistryError::AlreadyRegistered(user_id));
            }
            map.insert(user_id, user.clone());
        }

        self.save_users().await?;
        println!("[users] registered user {} ({})", user_id, user.address);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: u64) -> Option<User> {
        self.users.read().await.get(&user_id).cloned()
    }

    pub async fn list_users(&self) -> UsersMap {
        self.users.read().await.clone()
    }

    /// Read-all du scheduler : uniquement les users actifs.
    pub async fn list_active_users(&self) -> Vec<User> {
        self.users
            .read()
            .await
            .values()
            .filter(|u| u.is_active)
            .cloned()
            .collect()
    }

    /// Commit d'une transition : power + updated_at + entrée d'historique,
    /// d'un seul tenant sous le write lock, puis snapshot disque.
    pub async fn update_power(
        &self,
        user_id: u64,
        power: Power,
        at: OffsetDateTime,
    ) -> Result<(), RegistryError> {
        {
            let mut map = self.users.write().await;
            let user = map.get_mut(&user_id).ok_or(RegistryError::UnknownUser(user_id))?;
            user.power = power;
            user.updated_at = at;
            user.history.push(Observation { created_at: at, power });
        }

        self.save_users().await?;
        println!("[users] user {} power -> {}", user_id, power);
        Ok(())
    }

    /// Flow change-address : swap de l'endpoint, l'état se resynchronise
    /// au tick suivant.
    pub async fn change_address(&self, user_id: u64, address: String) -> Result<(), RegistryError> {
        {
            let mut map = self.users.write().await;
            let user = map.get_mut(&user_id).ok_or(RegistryError::UnknownUser(user_id))?;
            user.address = address;
        }

        self.save_users().await?;
        println!("[users] user {} address changed", user_id);
        Ok(())
    }

    /// Soft delete / réactivation. Jamais de hard delete.
    pub async fn set_active(&self, user_id: u64, active: bool) -> Result<(), RegistryError> {
        {
            let mut map = self.users.write().await;
            let user = map.get_mut(&user_id).ok_or(RegistryError::UnknownUser(user_id))?;
            user.is_active = active;
        }

        self.save_users().await?;
        println!(
            "[users] user {} {}",
            user_id,
            if active { "activated" } else { "deactivated" }
        );
        Ok(())
    }
}
