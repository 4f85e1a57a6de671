//! `kf init`: create the `.kinfold/` directory, config and store.

use crate::output::{OutputMode, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use kinfold_core::config::PROJECT_DIR;
use kinfold_core::db::{self, migrations};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `config.toml` even if `.kinfold/` already exists. The store
    /// and its records are kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[people]\n\
    sort = \"first_name\"\n\
    ascending = true\n\
    \n\
    [store]\n\
    busy_timeout_ms = 5000\n";

const GITIGNORE: &str = "kinfold.db-wal\nkinfold.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    project_dir: String,
    store: String,
    schema_version: u32,
}

/// Execute `kf init`. Creates:
///
/// ```text
/// .kinfold/
///   config.toml   (default project config)
///   kinfold.db    (SQLite store, migrated and seeded)
///   .gitignore    (WAL side files)
/// ```
///
/// # Errors
///
/// Returns an error if `.kinfold/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project_dir = project_root.join(PROJECT_DIR);

    if project_dir.exists() && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `kf init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config_path = project_dir.join("config.toml");
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = project_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let store_path = project_dir.join(db::STORE_FILE);
    let conn = db::open_store(&store_path)?;
    let schema_version = migrations::current_schema_version(&conn)
        .context("read schema version after init")?;
    info!(path = %store_path.display(), schema_version, "initialized family tree");

    let result = InitOutput {
        project_dir: project_dir.display().to_string(),
        store: store_path.display().to_string(),
        schema_version,
    };

    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "initialized\t{}\tschema_v{}", r.project_dir, r.schema_version),
        |r, w| {
            writeln!(w, "✓ Initialized {PROJECT_DIR}/ family tree.")?;
            writeln!(w)?;
            writeln!(w, "  Store:  {}", r.store)?;
            writeln!(w, "  Config: {PROJECT_DIR}/config.toml")?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  Add people:")?;
            writeln!(w, "    kf person add --first Ada --last Byron")?;
            writeln!(w, "  Connect them:")?;
            writeln!(w, "    kf tie add --a <child> --b <parent> --c <other-parent>")
        },
    )
}
