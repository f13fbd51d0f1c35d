use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "bufood";

/// Environment variable that takes precedence over the keychain
pub const TOKEN_ENV: &str = "BUFOOD_TOKEN";

/// Access tokens in the OS keychain, one entry per account.
pub struct TokenStore;

impl TokenStore {
    /// Store an access token in the OS keychain
    pub fn store(account: &str, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(token)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    /// Retrieve the access token for an account from the OS keychain
    pub fn get(account: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve token from keychain")
    }

    /// Delete the stored token for an account
    pub fn delete(account: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete token from keychain")?;
        Ok(())
    }

    /// Token to use for requests: `BUFOOD_TOKEN` if set, otherwise the
    /// keychain entry for `account`. Guests get `None`.
    pub fn resolve(account: Option<&str>) -> Option<String> {
        if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
            return Some(token);
        }
        account.and_then(|a| Self::get(a).ok())
    }
}
