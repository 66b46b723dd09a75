//! Durable storage for users, portfolios, and the CLI session.
//!
//! Each file is loaded wholesale at the start of an operation and written
//! back atomically only after the operation succeeds. A failed precondition
//! never writes anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::currency::CurrencyCode;
use crate::errors::CoreError;
use crate::models::{Portfolio, User, UserId, Wallet};
use crate::store::{read_json_or, write_json_atomic};

pub const USERS_FILE: &str = "users.json";
pub const PORTFOLIOS_FILE: &str = "portfolios.json";
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    user_id: UserId,
    username: String,
    hashed_password: String,
    salt: String,
    registration_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WalletRecord {
    balance: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortfolioRecord {
    user_id: UserId,
    wallets: HashMap<String, WalletRecord>,
}

/// Who is currently logged in. Persisted so one-shot CLI invocations share a
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub logged_in_at: DateTime<Utc>,
}

pub struct Repo {
    users_path: PathBuf,
    portfolios_path: PathBuf,
    session_path: PathBuf,
}

impl Repo {
    pub fn new(data_dir: &Path) -> Self {
        Repo {
            users_path: data_dir.join(USERS_FILE),
            portfolios_path: data_dir.join(PORTFOLIOS_FILE),
            session_path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn load_users(&self) -> Result<Vec<User>, CoreError> {
        let records: Vec<UserRecord> = read_json_or(&self.users_path, Vec::new)?;
        Ok(records
            .into_iter()
            .map(|r| User {
                user_id: r.user_id,
                username: r.username,
                hashed_password: r.hashed_password,
                salt: r.salt,
                registration_date: r.registration_date,
            })
            .collect())
    }

    pub fn save_users(&self, users: &[User]) -> Result<(), CoreError> {
        let records: Vec<UserRecord> = users
            .iter()
            .map(|u| UserRecord {
                user_id: u.user_id,
                username: u.username.clone(),
                hashed_password: u.hashed_password.clone(),
                salt: u.salt.clone(),
                registration_date: u.registration_date,
            })
            .collect();
        write_json_atomic(&self.users_path, &records)
    }

    pub fn load_portfolios(&self) -> Result<HashMap<UserId, Portfolio>, CoreError> {
        let records: Vec<PortfolioRecord> = read_json_or(&self.portfolios_path, Vec::new)?;
        let mut portfolios = HashMap::new();
        for record in records {
            let mut portfolio = Portfolio::new(record.user_id);
            for (code, wallet) in record.wallets {
                let code = CurrencyCode::new(&code)?;
                portfolio.insert_wallet(Wallet::new(code, wallet.balance)?);
            }
            portfolios.insert(record.user_id, portfolio);
        }
        debug!(count = portfolios.len(), "loaded portfolios");
        Ok(portfolios)
    }

    pub fn save_portfolios(
        &self,
        portfolios: &HashMap<UserId, Portfolio>,
    ) -> Result<(), CoreError> {
        let mut records: Vec<PortfolioRecord> = portfolios
            .values()
            .map(|p| PortfolioRecord {
                user_id: p.user_id,
                wallets: p
                    .wallets()
                    .map(|w| {
                        (
                            w.code().as_str().to_string(),
                            WalletRecord {
                                balance: w.balance(),
                            },
                        )
                    })
                    .collect(),
            })
            .collect();
        // Stable file order across saves
        records.sort_by_key(|r| r.user_id);
        write_json_atomic(&self.portfolios_path, &records)
    }

    pub fn current_session(&self) -> Result<Option<Session>, CoreError> {
        read_json_or(&self.session_path, || None)
    }

    pub fn set_session(&self, session: &Session) -> Result<(), CoreError> {
        write_json_atomic(&self.session_path, &Some(session.clone()))
    }

    pub fn clear_session(&self) -> Result<(), CoreError> {
        write_json_atomic(&self.session_path, &None::<Session>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn users_round_trip() {
        let dir = tempdir().unwrap();
        let repo = Repo::new(dir.path());

        let user = User::new(1, "alice", "hunter2").unwrap();
        repo.save_users(std::slice::from_ref(&user)).unwrap();

        let loaded = repo.load_users().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].username, "alice");
        assert!(loaded[0].verify_password("hunter2"));
    }

    #[test]
    fn portfolios_round_trip_preserves_balances() {
        let dir = tempdir().unwrap();
        let repo = Repo::new(dir.path());

        let mut portfolio = Portfolio::new(7);
        let usd = CurrencyCode::new("USD").unwrap();
        portfolio.insert_wallet(Wallet::new(usd.clone(), 1000.0).unwrap());

        let mut portfolios = HashMap::new();
        portfolios.insert(7, portfolio);
        repo.save_portfolios(&portfolios).unwrap();

        let loaded = repo.load_portfolios().unwrap();
        assert_eq!(loaded[&7].wallet(&usd).unwrap().balance(), 1000.0);
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempdir().unwrap();
        let repo = Repo::new(dir.path());
        assert!(repo.load_users().unwrap().is_empty());
        assert!(repo.load_portfolios().unwrap().is_empty());
        assert!(repo.current_session().unwrap().is_none());
    }

    #[test]
    fn session_set_and_clear() {
        let dir = tempdir().unwrap();
        let repo = Repo::new(dir.path());

        let session = Session {
            user_id: 1,
            username: "alice".to_string(),
            logged_in_at: Utc::now(),
        };
        repo.set_session(&session).unwrap();
        assert_eq!(repo.current_session().unwrap().unwrap().username, "alice");

        repo.clear_session().unwrap();
        assert!(repo.current_session().unwrap().is_none());
    }
}
