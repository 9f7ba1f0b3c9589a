//! Account management - loading/creating the local device identity

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tally_core::{AuthorId, UserId};

/// Identity of this device and of the sandbox user it created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Username/nickname
    pub username: String,
    /// Author id stamped on every local operation
    pub device_id: AuthorId,
    /// Local user created on first run
    pub user_id: UserId,
}

pub struct AccountManager {
    path: PathBuf,
    account: Option<Account>,
}

impl AccountManager {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            account: None,
        }
    }

    pub fn username(&self) -> &str {
        self.account
            .as_ref()
            .map(|account| account.username.as_str())
            .unwrap_or("unknown")
    }

    pub fn load_or_create(&mut self) -> Result<Account> {
        let account = if self.path.exists() {
            self.load()?
        } else {
            self.create()?
        };
        self.account = Some(account.clone());
        Ok(account)
    }

    fn load(&self) -> Result<Account> {
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read account file: {}", self.path.display()))?;

        let account: Account =
            serde_json::from_slice(&data).context("Failed to parse account file")?;

        println!("✓ Loaded account: {}", account.username);
        Ok(account)
    }

    fn create(&self) -> Result<Account> {
        println!("Creating new account...");

        // Get username from filename
        let username = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("user")
            .to_string();

        let account = Account {
            username,
            device_id: AuthorId::generate(),
            user_id: UserId::generate(),
        };

        let json = serde_json::to_string_pretty(&account)?;

        // Create parent directory if needed
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write account file: {}", self.path.display()))?;

        println!("✓ Created new account: {}", account.username);
        println!("✓ Saved to: {}", self.path.display());

        Ok(account)
    }
}
