//! Ledger entities: users, wallets, portfolios.
//!
//! Balance non-negativity is enforced at every mutation, not just at the
//! operation boundary. The only way to change a wallet is `deposit` /
//! `withdraw`, both of which validate before touching the balance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::currency::CurrencyCode;
use crate::errors::CoreError;

pub type UserId = u64;

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    pub registration_date: DateTime<Utc>,
}

fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_password(password: &str, salt: &str) -> String {
    hex::encode(Sha256::digest(format!("{password}{salt}")))
}

impl User {
    /// Creates a user with a fresh random salt. Username must be non-empty
    /// after trimming; password must be at least 4 characters.
    pub fn new(user_id: UserId, username: &str, password: &str) -> Result<Self, CoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::InvalidArgument(
                "username must not be empty".to_string(),
            ));
        }
        if password.len() < 4 {
            return Err(CoreError::InvalidArgument(
                "password must be at least 4 characters".to_string(),
            ));
        }
        let salt = generate_salt();
        Ok(User {
            user_id,
            username: username.to_string(),
            hashed_password: hash_password(password, &salt),
            salt,
            registration_date: Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password, &self.salt) == self.hashed_password
    }
}

/// A holding in one currency. Balance is never negative.
#[derive(Debug, Clone)]
pub struct Wallet {
    code: CurrencyCode,
    balance: f64,
}

impl Wallet {
    pub fn new(code: CurrencyCode, balance: f64) -> Result<Self, CoreError> {
        if balance < 0.0 || !balance.is_finite() {
            return Err(CoreError::InvalidArgument(format!(
                "balance must be a non-negative number, got {balance}"
            )));
        }
        Ok(Wallet { code, balance })
    }

    pub fn code(&self) -> &CurrencyCode {
        &self.code
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn deposit(&mut self, amount: f64) -> Result<(), CoreError> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(CoreError::InvalidArgument(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }
        self.balance += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<(), CoreError> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(CoreError::InvalidArgument(format!(
                "withdrawal amount must be positive, got {amount}"
            )));
        }
        if amount > self.balance {
            return Err(CoreError::InsufficientFunds {
                available: self.balance,
                required: amount,
                code: self.code.as_str().to_string(),
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

/// All wallets of one user. At most one wallet per currency code; wallets are
/// created lazily on first credit and never removed, even at zero balance.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub user_id: UserId,
    // BTreeMap keeps display and serialization order stable.
    wallets: BTreeMap<String, Wallet>,
}

impl Portfolio {
    pub fn new(user_id: UserId) -> Self {
        Portfolio {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn wallet(&self, code: &CurrencyCode) -> Option<&Wallet> {
        self.wallets.get(code.as_str())
    }

    pub fn wallet_mut(&mut self, code: &CurrencyCode) -> Option<&mut Wallet> {
        self.wallets.get_mut(code.as_str())
    }

    /// Returns the wallet for `code`, creating an empty one if absent.
    pub fn wallet_or_create(&mut self, code: &CurrencyCode) -> &mut Wallet {
        self.wallets
            .entry(code.as_str().to_string())
            .or_insert_with(|| Wallet {
                code: code.clone(),
                balance: 0.0,
            })
    }

    pub fn insert_wallet(&mut self, wallet: Wallet) {
        self.wallets.insert(wallet.code.as_str().to_string(), wallet);
    }
}
