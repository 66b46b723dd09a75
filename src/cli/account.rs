use anyhow::Result;
use console::style;

use super::{open_repo, require_session};
use crate::config::AppConfig;
use crate::ledger::Ledger;

pub fn register(config: &AppConfig, username: &str, password: &str) -> Result<()> {
    let repo = open_repo(config)?;
    let mut ledger = Ledger::open(&repo)?;
    let user = ledger.register(username, password)?;

    println!(
        "User '{}' registered (id={}). Log in with: valutahub login --username {} --password ****",
        user.username, user.user_id, user.username
    );
    Ok(())
}

pub fn login(config: &AppConfig, username: &str, password: &str) -> Result<()> {
    let repo = open_repo(config)?;
    let ledger = Ledger::open(&repo)?;
    let session = ledger.login(username, password)?;
    repo.set_session(&session)?;

    println!("Logged in as '{}'", style(&session.username).bold());
    Ok(())
}

pub fn logout(config: &AppConfig) -> Result<()> {
    let repo = open_repo(config)?;
    match require_session(&repo) {
        Ok(session) => {
            repo.clear_session()?;
            tracing::info!(action = "LOGOUT", user = %session.username, result = "OK");
            println!("Logged out '{}'", session.username);
        }
        Err(_) => println!("No active session."),
    }
    Ok(())
}
