//! `kf tie`: record, list, retype and remove ties between people.

use crate::cmd::{checked, fail, open_project, report};
use crate::output::{CliError, OutputMode, pretty_section, render_mode, render_success};
use crate::validate;
use anyhow::Result;
use clap::{Args, Subcommand};
use kinfold_core::db::query;
use kinfold_core::error::ErrorCode;
use kinfold_core::model::person::PersonId;
use kinfold_core::model::tie::{NewTie, RELATION_PARENT, Tie, TieLink};
use kinfold_core::TieFilter;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct TieArgs {
    #[command(subcommand)]
    pub command: TieCommand,
}

#[derive(Subcommand, Debug)]
pub enum TieCommand {
    /// Record a tie.
    Add(TieAddArgs),
    /// List ties, optionally only those naming one person.
    List(TieListArgs),
    /// Change a tie's relation or type.
    Update(TieUpdateArgs),
    /// Remove a tie.
    Rm(TieIdArg),
}

#[derive(Args, Debug)]
pub struct TieAddArgs {
    /// Child (parent-child relations) or first partner.
    #[arg(long = "a")]
    pub person_a: String,

    /// Parent (parent-child relations) or second partner.
    #[arg(long = "b")]
    pub person_b: String,

    /// Other parent. Parent-child relations only.
    #[arg(long = "c")]
    pub person_c: Option<String>,

    /// Relation name. Its kind decides how the row is read.
    #[arg(long, default_value = RELATION_PARENT)]
    pub relation: String,

    /// Optional qualifier from `kf tie-type list`.
    #[arg(long = "type")]
    pub tie_type: Option<String>,
}

#[derive(Args, Debug)]
pub struct TieListArgs {
    /// Only ties naming this person in any position.
    #[arg(long)]
    pub person: Option<String>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,
}

#[derive(Args, Debug)]
pub struct TieUpdateArgs {
    /// Tie id.
    pub id: i64,

    /// New relation name. Must have the same kind shape as the row.
    #[arg(long)]
    pub relation: Option<String>,

    /// New qualifier.
    #[arg(long = "type", conflicts_with = "clear_type")]
    pub tie_type: Option<String>,

    /// Remove the qualifier.
    #[arg(long)]
    pub clear_type: bool,
}

#[derive(Args, Debug)]
pub struct TieIdArg {
    /// Tie id.
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct TieList {
    ties: Vec<Tie>,
    count: usize,
}

pub fn run_tie(args: &TieArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    match &args.command {
        TieCommand::Add(add) => run_add(add, output, project_root),
        TieCommand::List(list) => run_list(list, output, project_root),
        TieCommand::Update(update) => run_update(update, output, project_root),
        TieCommand::Rm(rm) => run_rm(rm, output, project_root),
    }
}

fn person_id(raw: &str, output: OutputMode) -> Result<PersonId> {
    checked(output, validate::validate_person_id(raw))?;
    Ok(PersonId::from(raw))
}

fn tie_not_found(output: OutputMode, id: i64) -> anyhow::Error {
    fail(
        output,
        &CliError::coded(ErrorCode::TieNotFound, format!("tie {id} not found")),
    )
}

fn describe(tie: &Tie) -> String {
    let qualifier = tie
        .tie_type
        .as_deref()
        .map_or_else(String::new, |t| format!(" [{t}]"));
    match &tie.link {
        TieLink::ParentChild {
            child,
            parent,
            other_parent: Some(other),
        } => format!("{child} is a child of {parent} and {other} ({}){qualifier}", tie.relation),
        TieLink::ParentChild {
            child,
            parent,
            other_parent: None,
        } => format!("{child} is a child of {parent} ({}){qualifier}", tie.relation),
        TieLink::Partnership { partner, other } => {
            format!("{partner} and {other} are partners ({}){qualifier}", tie.relation)
        }
    }
}

fn write_tie_text(w: &mut dyn Write, tie: &Tie) -> std::io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}",
        tie.id,
        tie.relation,
        tie.link.person_a(),
        tie.link.person_b(),
        tie.link.person_c().map_or("-", PersonId::as_str),
        tie.tie_type.as_deref().unwrap_or("-"),
    )
}

fn run_add(args: &TieAddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let new = NewTie {
        person_a: person_id(&args.person_a, output)?,
        person_b: person_id(&args.person_b, output)?,
        person_c: args
            .person_c
            .as_deref()
            .map(|raw| person_id(raw, output))
            .transpose()?,
        relation: args.relation.clone(),
        tie_type: args.tie_type.clone(),
    };

    let project = open_project(project_root, output)?;
    let tie = query::insert_tie(&project.conn, &new).map_err(|e| report(output, e))?;
    info!(tie_id = tie.id, relation = %tie.relation, "added tie");

    render_mode(
        output,
        &tie,
        |t, w| write_tie_text(w, t),
        |t, w| writeln!(w, "✓ Tie {}: {}", t.id, describe(t)),
    )
}

fn run_list(args: &TieListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let person = args
        .person
        .as_deref()
        .map(|raw| person_id(raw, output))
        .transpose()?;
    let project = open_project(project_root, output)?;

    if let Some(id) = &person {
        if !query::person_exists(&project.conn, id).map_err(|e| report(output, e))? {
            return Err(fail(
                output,
                &CliError::coded(ErrorCode::PersonNotFound, format!("person '{id}' not found")),
            ));
        }
    }

    let ties = match person {
        Some(id) => query::list_ties(&project.conn, &TieFilter::Involving(id))
            .map_err(|e| report(output, e))?
            .into_iter()
            .skip(args.offset.map_or(0, |o| o as usize))
            .take(args.limit.map_or(usize::MAX, |l| l as usize))
            .collect(),
        None => query::list_all_ties(&project.conn, args.limit, args.offset)
            .map_err(|e| report(output, e))?,
    };
    let list = TieList {
        count: ties.len(),
        ties,
    };

    render_mode(
        output,
        &list,
        |l, w| {
            for tie in &l.ties {
                write_tie_text(w, tie)?;
            }
            Ok(())
        },
        |l, w| {
            if l.ties.is_empty() {
                return writeln!(w, "No ties recorded.");
            }
            pretty_section(w, &format!("Ties ({})", l.count))?;
            for tie in &l.ties {
                writeln!(w, "  {:>5}  {}", tie.id, describe(tie))?;
            }
            Ok(())
        },
    )
}

fn run_update(args: &TieUpdateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let tie_type = if args.clear_type {
        Some(None)
    } else {
        args.tie_type.as_deref().map(Some)
    };
    let project = open_project(project_root, output)?;

    let Some(tie) =
        query::update_tie(&project.conn, args.id, args.relation.as_deref(), tie_type)
            .map_err(|e| report(output, e))?
    else {
        return Err(tie_not_found(output, args.id));
    };
    info!(tie_id = tie.id, "updated tie");

    render_mode(
        output,
        &tie,
        |t, w| write_tie_text(w, t),
        |t, w| writeln!(w, "✓ Tie {}: {}", t.id, describe(t)),
    )
}

fn run_rm(args: &TieIdArg, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    if !query::delete_tie(&project.conn, args.id).map_err(|e| report(output, e))? {
        return Err(tie_not_found(output, args.id));
    }
    info!(tie_id = args.id, "removed tie");

    render_success(output, &format!("Removed tie {}", args.id))
}
