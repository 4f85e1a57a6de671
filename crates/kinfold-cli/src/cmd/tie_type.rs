//! `kf tie-type`: manage free-form tie qualifiers.

use crate::cmd::{checked, fail, open_project, report};
use crate::output::{CliError, OutputMode, pretty_section, render_mode, render_success};
use crate::validate;
use anyhow::Result;
use clap::{Args, Subcommand};
use kinfold_core::db::query;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct TieTypeArgs {
    #[command(subcommand)]
    pub command: TieTypeCommand,
}

#[derive(Subcommand, Debug)]
pub enum TieTypeCommand {
    /// Register a tie type such as `married`.
    Add(TieTypeNameArg),
    List,
    /// Remove a tie type no tie uses.
    Rm(TieTypeNameArg),
}

#[derive(Args, Debug)]
pub struct TieTypeNameArg {
    pub name: String,
}

pub fn run_tie_type(args: &TieTypeArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    match &args.command {
        TieTypeCommand::Add(add) => {
            checked(output, validate::validate_relation_name("tie_type", &add.name))?;
            let project = open_project(project_root, output)?;
            let tie_type =
                query::insert_tie_type(&project.conn, &add.name).map_err(|e| report(output, e))?;
            info!(tie_type = %tie_type.name, "added tie type");
            render_mode(
                output,
                &tie_type,
                |t, w| writeln!(w, "{}", t.name),
                |t, w| writeln!(w, "✓ Added tie type {}", t.name),
            )
        }
        TieTypeCommand::List => {
            let project = open_project(project_root, output)?;
            let types = query::list_tie_types(&project.conn).map_err(|e| report(output, e))?;
            render_mode(
                output,
                &types,
                |ts, w| {
                    for t in ts {
                        writeln!(w, "{}", t.name)?;
                    }
                    Ok(())
                },
                |ts, w| {
                    if ts.is_empty() {
                        return writeln!(w, "No tie types registered.");
                    }
                    pretty_section(w, &format!("Tie types ({})", ts.len()))?;
                    for t in ts {
                        writeln!(w, "  {}", t.name)?;
                    }
                    Ok(())
                },
            )
        }
        TieTypeCommand::Rm(rm) => {
            let project = open_project(project_root, output)?;
            if !query::delete_tie_type(&project.conn, &rm.name).map_err(|e| report(output, e))? {
                return Err(fail(
                    output,
                    &CliError::with_details(
                        format!("tie type '{}' not found", rm.name),
                        "use `kf tie-type list` to see registered types",
                        "tie_type_not_found",
                    ),
                ));
            }
            info!(tie_type = %rm.name, "removed tie type");
            let name = &rm.name;
            render_success(output, &format!("Removed tie type {name}"))
        }
    }
}
