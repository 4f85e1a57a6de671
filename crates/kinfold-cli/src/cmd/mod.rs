//! Command handlers for `kf`, plus the project lookup they share.

pub mod completions;
pub mod init;
pub mod kin;
pub mod person;
pub mod relation;
pub mod tie;
pub mod tie_type;

use crate::output::{CliError, OutputMode, render_error};
use crate::validate::ValidationError;
use anyhow::Result;
use kinfold_core::config::{self, PROJECT_DIR, ProjectConfig};
use kinfold_core::db::{self, query};
use kinfold_core::error::ErrorCode;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An opened family tree: project config and store connection.
pub struct Project {
    pub config: ProjectConfig,
    pub conn: Connection,
}

/// Find the directory holding `.kinfold/` by walking up from `start`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Locate and open the family tree above `start`.
///
/// Every failure is rendered in `output` mode before it is returned.
pub fn open_project(start: &Path, output: OutputMode) -> Result<Project> {
    let Some(root) = find_project_root(start) else {
        return Err(fail(
            output,
            &CliError::coded(
                ErrorCode::NotInitialized,
                format!("no {PROJECT_DIR}/ found in {} or its parents", start.display()),
            ),
        ));
    };

    let config = config::load_project_config(&root).map_err(|e| {
        fail(
            output,
            &CliError::coded(ErrorCode::ConfigParseError, format!("{e:#}")),
        )
    })?;

    let path = root.join(PROJECT_DIR).join(db::STORE_FILE);
    let conn = match query::try_open_store(&path, config.store.busy_timeout()) {
        Ok(Some(conn)) => conn,
        Ok(None) => {
            return Err(fail(
                output,
                &CliError::coded(
                    ErrorCode::NotInitialized,
                    format!("store {} is missing", path.display()),
                ),
            ));
        }
        Err(e) => {
            return Err(fail(
                output,
                &CliError::coded(ErrorCode::CorruptStore, format!("{e:#}")),
            ));
        }
    };
    debug!(root = %root.display(), "opened project");

    Ok(Project { config, conn })
}

/// Render `error` and turn it into the `anyhow` error `main` returns.
pub fn fail(output: OutputMode, error: &CliError) -> anyhow::Error {
    if let Err(e) = render_error(output, error) {
        tracing::warn!(error = %e, "failed to render error");
    }
    anyhow::anyhow!("{}", error.message)
}

/// Unwrap a validation result, rendering the failure first.
pub fn checked<T>(output: OutputMode, result: Result<T, ValidationError>) -> Result<T> {
    result.map_err(|e| fail(output, &e.to_cli_error()))
}

/// Render a query-layer error with its code and hand it back unchanged.
pub fn report(output: OutputMode, err: anyhow::Error) -> anyhow::Error {
    if let Err(e) = render_error(output, &CliError::from_anyhow(&err)) {
        tracing::warn!(error = %e, "failed to render error");
    }
    err
}
