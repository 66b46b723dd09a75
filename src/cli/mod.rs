//! Thin command handlers: parse-free I/O around the core operations.

pub mod account;
pub mod portfolio;
pub mod rates;
pub mod setup;
pub mod trade;
pub mod ui;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::repo::{Repo, Session};

pub(crate) fn open_repo(config: &AppConfig) -> Result<Repo> {
    Ok(Repo::new(&config.data_dir()?))
}

pub(crate) fn require_session(repo: &Repo) -> Result<Session> {
    repo.current_session()?
        .context("You are not logged in. Run 'valutahub login --username <name> --password <password>' first")
}
