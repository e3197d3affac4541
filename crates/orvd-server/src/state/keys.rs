//! Key material for every principal group.

use anyhow::Result;
use dashmap::DashMap;
use orvd_core::crypto::{self, CryptoError, KeyPair, PublicKey};
use orvd_core::models::KeyGroup;
use orvd_core::wire::MessageBuilder;
use tracing::{debug, info};

use crate::persistence::{keys, Database};

/// Server keypair plus keypairs generated for mission senders, with public
/// keys of vehicles and senders resolved from the store.
pub struct KeyStore {
    server: KeyPair,
    loaded: DashMap<KeyGroup, KeyPair>,
    key_bits: usize,
    db: Database,
}

impl KeyStore {
    pub fn new(server: KeyPair, key_bits: usize, db: Database) -> Self {
        Self {
            server,
            loaded: DashMap::new(),
            key_bits,
            db,
        }
    }

    /// Generate the server keypair off the async runtime.
    pub async fn generate(key_bits: usize, db: Database) -> Result<Self> {
        let server = tokio::task::spawn_blocking(move || KeyPair::generate(key_bits)).await??;
        info!("Generated {}-bit server keypair", key_bits);
        Ok(Self::new(server, key_bits, db))
    }

    pub fn server_public(&self) -> &PublicKey {
        self.server.public()
    }

    /// Sign with the private key of `group`.
    pub fn sign(&self, message: &str, group: &KeyGroup) -> Result<String, CryptoError> {
        match group {
            KeyGroup::Server => Ok(self.server.sign_hex(message)),
            other => self
                .loaded
                .get(other)
                .map(|pair| pair.sign_hex(message))
                .ok_or_else(|| CryptoError::MissingPrivateKey(other.to_string())),
        }
    }

    /// `message#signature` under the server key.
    pub fn sign_reply(&self, message: &str) -> String {
        orvd_core::wire::sign_message(message, &self.server)
    }

    async fn public_key(&self, group: &KeyGroup) -> Result<Option<PublicKey>> {
        match group {
            KeyGroup::Server => Ok(Some(self.server.public().clone())),
            KeyGroup::Vehicle(id) => keys::get_vehicle_key(self.db.pool(), id).await,
            KeyGroup::MissionSender(id) => {
                let loaded = self.loaded.get(group).map(|pair| pair.public().clone());
                match loaded {
                    Some(public) => Ok(Some(public)),
                    None => keys::get_sender_key(self.db.pool(), id).await,
                }
            }
        }
    }

    /// Check a hex signature over `message`. Any failure is a mismatch.
    pub async fn verify(&self, message: &str, signature_hex: &str, group: &KeyGroup) -> bool {
        let Ok(signature) = crypto::parse_hex(signature_hex) else {
            debug!("Malformed signature for {}", group);
            return false;
        };
        match self.public_key(group).await {
            Ok(Some(key)) => key.verify(message, &signature),
            Ok(None) => {
                debug!("No public key for {}", group);
                false
            }
            Err(e) => {
                tracing::error!("Key lookup for {} failed: {}", group, e);
                false
            }
        }
    }

    /// `$Key: {n} {e}` with the server public key.
    pub fn server_key_reply(&self) -> String {
        let public = self.server.public();
        MessageBuilder::new()
            .segment("Key:", format!("{} {}", public.n_hex(), public.e_hex()))
            .build()
    }

    /// Pin a vehicle key on first contact and answer with the server key.
    pub async fn exchange_vehicle_key(&self, vehicle_id: &str, n: &str, e: &str) -> Result<String> {
        let key = PublicKey::from_hex(n, e)?;
        if keys::insert_vehicle_key_if_absent(self.db.pool(), vehicle_id, &key).await? {
            info!("Pinned key for vehicle {}", vehicle_id);
        } else {
            debug!("Vehicle {} already has a pinned key", vehicle_id);
        }
        Ok(self.server_key_reply())
    }

    /// Create (once per process) a keypair for a mission sender and publish its public half.
    pub async fn exchange_sender_key(&self, sender_id: &str) -> Result<String> {
        let group = KeyGroup::mission_sender(sender_id);
        let existing = self.loaded.get(&group).map(|pair| pair.public().clone());
        let public = match existing {
            Some(public) => public,
            None => {
                let bits = self.key_bits;
                let pair = tokio::task::spawn_blocking(move || KeyPair::generate(bits)).await??;
                // A concurrent exchange may have won the race; keep its pair.
                self.loaded.entry(group).or_insert(pair).public().clone()
            }
        };
        keys::upsert_sender_key(self.db.pool(), sender_id, &public).await?;
        Ok(self.server_key_reply())
    }
}
