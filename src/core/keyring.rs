use keyring::Entry;
use std::error::Error;
use std::fmt;
use std::sync::{Mutex, PoisonError};

const KEYRING_SERVICE: &str = "llmdesk";
const DEFAULT_ACCOUNT: &str = "api-key";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyring access failed: {}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Where the backend API key lives between runs.
pub trait CredentialStore: Send + Sync {
    fn get_api_key(&self) -> Result<Option<String>, KeyringAccessError>;
    fn set_api_key(&self, api_key: &str) -> Result<(), KeyringAccessError>;
    /// Returns whether a key was present.
    fn clear_api_key(&self) -> Result<bool, KeyringAccessError>;
}

/// API key stored in the OS keyring. With the keyring disabled every read is
/// empty and every write is a no-op.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    account: String,
    use_keyring: bool,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::new_with_keyring(true)
    }

    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
            use_keyring,
        }
    }

    fn entry(&self) -> Result<Entry, KeyringAccessError> {
        Ok(Entry::new(KEYRING_SERVICE, &self.account)?)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get_api_key(&self) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }

        match self.entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_api_key(&self, api_key: &str) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }

        Ok(self.entry()?.set_password(api_key)?)
    }

    fn clear_api_key(&self) -> Result<bool, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(false);
        }

        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    api_key: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_api_key(&self) -> Result<Option<String>, KeyringAccessError> {
        Ok(self
            .api_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set_api_key(&self, api_key: &str) -> Result<(), KeyringAccessError> {
        *self.api_key.lock().unwrap_or_else(PoisonError::into_inner) = Some(api_key.to_string());
        Ok(())
    }

    fn clear_api_key(&self) -> Result<bool, KeyringAccessError> {
        Ok(self
            .api_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }
}
