//! In-memory credential list backed by a persistence collaborator.
//!
//! Every mutation writes the full list through the collaborator. A failed
//! write is logged and the in-memory change is kept.

use crate::otp::base32;
use crate::otp::persist::CredentialPersistence;
use crate::otp::types::*;

/// Ordered credential list, oldest first.
pub struct CredentialStore {
    credentials: Vec<Credential>,
    persistence: Box<dyn CredentialPersistence>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("credentials", &self.credentials.len())
            .finish()
    }
}

impl CredentialStore {
    /// Load the list from the collaborator. Entries that break the store's
    /// invariants (undecodable secret, blank name, repeated id) are dropped.
    pub fn load(persistence: Box<dyn CredentialPersistence>) -> Result<Self, OtpError> {
        let loaded = persistence.get()?;
        let total = loaded.len();
        let mut credentials: Vec<Credential> = Vec::with_capacity(total);
        for cred in loaded {
            if cred.name.trim().is_empty() || base32::decode(&cred.secret).is_err() {
                log::warn!("Dropping stored credential {} with invalid data", cred.id);
                continue;
            }
            if credentials.iter().any(|c| c.id == cred.id) {
                log::warn!("Dropping stored credential with repeated id {}", cred.id);
                continue;
            }
            credentials.push(cred);
        }
        log::info!("Loaded {} of {} stored credentials", credentials.len(), total);
        Ok(Self {
            credentials,
            persistence,
        })
    }

    /// All credentials in insertion order.
    pub fn list(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn get(&self, id: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Whether a credential with this (normalised) secret is already stored.
    pub fn contains_secret(&self, secret: &str) -> bool {
        let wanted = base32::normalize(secret);
        self.credentials.iter().any(|c| c.secret == wanted)
    }

    /// Validate and append a new credential.
    pub fn add(&mut self, name: &str, secret: &str, issuer: &str) -> Result<Credential, OtpError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OtpError::new(OtpErrorKind::InvalidName, "Account name is required"));
        }
        let secret = base32::normalize(secret);
        if !base32::is_valid(&secret) {
            let mut err = OtpError::new(OtpErrorKind::InvalidSecret, "A valid Base32 secret is required");
            if let Err(e) = base32::decode(&secret) {
                err = err.with_detail(e.message);
            }
            return Err(err);
        }

        let credential = Credential::new(name, secret, issuer.trim());
        self.credentials.push(credential.clone());
        log::info!("Added credential {} ({})", credential.id, credential.display_name());
        self.persist();
        Ok(credential)
    }

    /// Remove a credential. Returns `false` if nothing matched.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(pos) = self.credentials.iter().position(|c| c.id == id) else {
            log::debug!("Delete of unknown credential {} ignored", id);
            return false;
        };
        let removed = self.credentials.remove(pos);
        log::info!("Deleted credential {} ({})", removed.id, removed.display_name());
        self.persist();
        true
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.set(&self.credentials) {
            log::warn!("Credential list not persisted: {}", e);
        }
    }
}
