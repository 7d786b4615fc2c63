use crate::secrets::string::SecretString;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Where credentials come from
#[derive(Clone)]
enum CredentialSource {
    /// Process environment (after `.env` has been loaded)
    Environment,

    /// A fixed set of values, used by tests and embedders
    Fixed(Arc<HashMap<String, SecretString>>),
}

/// Credential lookup for provider adapters.
///
/// Each adapter names the variable holding its key. A missing or empty
/// variable is reported as `EngineError::Config`, which adapters turn into a
/// configuration failure so the router moves on to the next provider. Found
/// values are cached in memory.
#[derive(Clone)]
pub struct CredentialStore {
    source: CredentialSource,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl CredentialStore {
    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        Self {
            source: CredentialSource::Environment,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Use a fixed set of credentials
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), SecretString::new(v.into())))
            .collect();
        Self {
            source: CredentialSource::Fixed(Arc::new(values)),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A store with no credentials at all
    pub fn empty() -> Self {
        Self::from_pairs(Vec::<(String, String)>::new())
    }

    /// Retrieves a credential. It checks the memory cache first.
    pub fn get_secret(&self, name: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(secret) = cache.get(name) {
                return Ok(secret.clone());
            }
        }

        let secret = self
            .lookup(name)
            .ok_or_else(|| EngineError::Config(format!("Missing credential: {}", name)))?;

        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(name.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// Returns true when the credential is present and non-empty
    pub fn has_secret(&self, name: &str) -> bool {
        self.get_secret(name).is_ok()
    }

    fn lookup(&self, name: &str) -> Option<SecretString> {
        let raw = match &self.source {
            CredentialSource::Environment => std::env::var(name).ok(),
            CredentialSource::Fixed(values) => {
                values.get(name).map(|s| s.unsecure().to_string())
            }
        }?;

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(SecretString::new(trimmed))
        }
    }
}
