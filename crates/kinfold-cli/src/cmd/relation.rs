//! `kf relation`: manage named tie relations and their kinds.

use crate::cmd::{checked, fail, open_project, report};
use crate::output::{CliError, OutputMode, pretty_section, render_mode, render_success};
use crate::validate;
use anyhow::Result;
use clap::{Args, Subcommand};
use kinfold_core::db::query;
use kinfold_core::error::ErrorCode;
use kinfold_core::model::tie::TieRelation;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct RelationArgs {
    #[command(subcommand)]
    pub command: RelationCommand,
}

#[derive(Subcommand, Debug)]
pub enum RelationCommand {
    /// Register a relation.
    Add(RelationAddArgs),
    /// List relations with their kinds.
    List,
    /// Remove a relation no tie uses.
    Rm(RelationNameArg),
}

#[derive(Args, Debug)]
pub struct RelationAddArgs {
    /// Relation name, e.g. `step_parent`.
    pub name: String,

    /// How ties with this relation are read: parent_child or partnership.
    #[arg(long)]
    pub kind: String,
}

#[derive(Args, Debug)]
pub struct RelationNameArg {
    pub name: String,
}

pub fn run_relation(args: &RelationArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    match &args.command {
        RelationCommand::Add(add) => run_add(add, output, project_root),
        RelationCommand::List => run_list(output, project_root),
        RelationCommand::Rm(rm) => run_rm(rm, output, project_root),
    }
}

fn write_relation_text(w: &mut dyn Write, relation: &TieRelation) -> std::io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}",
        relation.name,
        relation.kind,
        if relation.removeable { "custom" } else { "built-in" }
    )
}

fn run_add(args: &RelationAddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    checked(output, validate::validate_relation_name("relation", &args.name))?;
    let kind = checked(output, validate::validate_kind(&args.kind))?;

    let project = open_project(project_root, output)?;
    let relation =
        query::insert_relation(&project.conn, &args.name, kind, true).map_err(|e| report(output, e))?;
    info!(relation = %relation.name, kind = %relation.kind, "added tie relation");

    render_mode(
        output,
        &relation,
        |r, w| write_relation_text(w, r),
        |r, w| writeln!(w, "✓ Added relation {} ({})", r.name, r.kind),
    )
}

fn run_list(output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    let relations = query::list_relations(&project.conn).map_err(|e| report(output, e))?;

    render_mode(
        output,
        &relations,
        |rs, w| {
            for relation in rs {
                write_relation_text(w, relation)?;
            }
            Ok(())
        },
        |rs, w| {
            pretty_section(w, &format!("Relations ({})", rs.len()))?;
            for relation in rs {
                let marker = if relation.removeable { "" } else { "  (built-in)" };
                writeln!(w, "  {:<16} {}{marker}", relation.name, relation.kind)?;
            }
            Ok(())
        },
    )
}

fn run_rm(args: &RelationNameArg, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    if !query::delete_relation(&project.conn, &args.name).map_err(|e| report(output, e))? {
        return Err(fail(
            output,
            &CliError::coded(
                ErrorCode::RelationNotFound,
                format!("tie relation '{}' not found", args.name),
            ),
        ));
    }
    info!(relation = %args.name, "removed tie relation");

    let name = &args.name;
    render_success(output, &format!("Removed relation {name}"))
}
