use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

pub trait ApiKeyStore: Send + Sync {
    fn save_key(&self, api_key: &str) -> Result<(), InfraError>;
    fn load_key(&self) -> Result<Option<String>, InfraError>;
    fn delete_key(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringApiKeyStore {
    service_name: String,
    account_name: String,
}

impl KeyringApiKeyStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringApiKeyStore {
    fn default() -> Self {
        Self::new("dayboard.table-store", "default")
    }
}

impl ApiKeyStore for KeyringApiKeyStore {
    fn save_key(&self, api_key: &str) -> Result<(), InfraError> {
        let api_key = normalize_key(api_key)?;
        self.entry()?
            .set_password(&api_key)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_key(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value).filter(|value| !value.trim().is_empty())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_key(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    key: Mutex<Option<String>>,
}

impl ApiKeyStore for InMemoryApiKeyStore {
    fn save_key(&self, api_key: &str) -> Result<(), InfraError> {
        let api_key = normalize_key(api_key)?;
        let mut guard = self
            .key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(api_key);
        Ok(())
    }

    fn load_key(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_key(&self) -> Result<(), InfraError> {
        let mut guard = self
            .key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

fn normalize_key(api_key: &str) -> Result<String, InfraError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(InfraError::Credential("api key must not be empty".to_string()));
    }
    Ok(api_key.to_string())
}
