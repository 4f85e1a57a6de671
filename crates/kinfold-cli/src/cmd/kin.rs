//! `kf parents|siblings|partners|children`: derived kinship views.
//!
//! Each command checks that the subject exists, then asks the resolver for
//! one view. Unresolved ids in a view are printed as warnings in human modes
//! and kept in the JSON.

use crate::cmd::{checked, fail, open_project, report};
use crate::output::{
    CliError, OutputMode, pretty_person_line, pretty_section, render_mode, text_person_line,
};
use crate::validate;
use anyhow::Result;
use clap::Args;
use kinfold_core::db::query;
use kinfold_core::error::{ErrorCode, ResolveError};
use kinfold_core::graph::kinship::{Children, Parents, Partners, SiblingSet};
use kinfold_core::model::person::{Person, PersonId};
use kinfold_core::Resolver;
use rusqlite::Connection;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct KinArgs {
    /// Person id.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct SiblingsArgs {
    /// Person id.
    pub id: String,

    /// Siblings from ties naming only this parent, or this parent and
    /// `--other`. Without it, every parent pair of the person is listed.
    #[arg(long)]
    pub parent: Option<String>,

    /// Second parent of the pair. Requires `--parent`.
    #[arg(long, requires = "parent")]
    pub other: Option<String>,
}

/// A view together with the person it was computed for.
#[derive(Debug, Serialize)]
struct KinView<T: Serialize> {
    person: Person,
    #[serde(flatten)]
    view: T,
}

#[derive(Debug, Serialize)]
struct SiblingSets {
    sets: Vec<SiblingSet>,
}

fn person_id(raw: &str, output: OutputMode) -> Result<PersonId> {
    checked(output, validate::validate_person_id(raw))?;
    Ok(PersonId::from(raw))
}

fn resolve_failed(output: OutputMode, err: &ResolveError) -> anyhow::Error {
    fail(output, &CliError::from(err))
}

/// Load `raw` or render `PersonNotFound`.
fn load_person(conn: &Connection, raw: &str, output: OutputMode) -> Result<Person> {
    let id = person_id(raw, output)?;
    query::get_person(conn, &id)
        .map_err(|e| report(output, e))?
        .ok_or_else(|| {
            fail(
                output,
                &CliError::coded(ErrorCode::PersonNotFound, format!("person '{id}' not found")),
            )
        })
}

fn write_unresolved(w: &mut dyn Write, unresolved: &[PersonId]) -> std::io::Result<()> {
    for id in unresolved {
        writeln!(w, "warning: tie references missing person '{id}'")?;
    }
    Ok(())
}

pub fn run_parents(args: &KinArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    let person = load_person(&project.conn, &args.id, output)?;
    let parents = Resolver::new(&project.conn)
        .parents(&person.id)
        .map_err(|e| resolve_failed(output, &e))?;

    render_mode(
        output,
        &KinView {
            person,
            view: parents,
        },
        |v, w| {
            for parent in v.view.parent_b.iter().chain(&v.view.parent_c) {
                text_person_line(w, parent)?;
            }
            Ok(())
        },
        |v, w| render_parents_pretty(&v.person, &v.view, w),
    )
}

fn render_parents_pretty(person: &Person, parents: &Parents, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Parents of {}", person.display_name()))?;
    if parents.is_empty() {
        writeln!(w, "  none recorded")?;
    }
    for parent in parents.parent_b.iter().chain(&parents.parent_c) {
        pretty_person_line(w, parent)?;
    }
    write_unresolved(w, &parents.unresolved)
}

pub fn run_siblings(args: &SiblingsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    let person = load_person(&project.conn, &args.id, output)?;
    let resolver = Resolver::new(&project.conn);

    let sets = match &args.parent {
        Some(parent) => {
            let parent = load_person(&project.conn, parent, output)?;
            let other = args
                .other
                .as_deref()
                .map(|raw| load_person(&project.conn, raw, output))
                .transpose()?;
            let siblings = resolver
                .siblings(&person.id, &parent, other.as_ref())
                .map_err(|e| resolve_failed(output, &e))?;
            vec![SiblingSet {
                parent,
                other_parent: other,
                siblings,
            }]
        }
        None => resolver
            .siblings_of(&person.id)
            .map_err(|e| resolve_failed(output, &e))?,
    };

    render_mode(
        output,
        &KinView {
            person,
            view: SiblingSets { sets },
        },
        |v, w| {
            for set in &v.view.sets {
                for sibling in &set.siblings {
                    text_person_line(w, sibling)?;
                }
            }
            Ok(())
        },
        |v, w| {
            if v.view.sets.is_empty() {
                pretty_section(w, &format!("Siblings of {}", v.person.display_name()))?;
                return writeln!(w, "  no parents recorded");
            }
            for (i, set) in v.view.sets.iter().enumerate() {
                if i > 0 {
                    writeln!(w)?;
                }
                let through = match &set.other_parent {
                    Some(other) => {
                        format!("{} and {}", set.parent.display_name(), other.display_name())
                    }
                    None => set.parent.display_name(),
                };
                pretty_section(w, &format!("Siblings through {through}"))?;
                if set.siblings.is_empty() {
                    writeln!(w, "  none recorded")?;
                }
                for sibling in &set.siblings {
                    pretty_person_line(w, sibling)?;
                }
            }
            Ok(())
        },
    )
}

pub fn run_partners(args: &KinArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    let person = load_person(&project.conn, &args.id, output)?;
    let partners = Resolver::new(&project.conn)
        .partners(&person.id)
        .map_err(|e| resolve_failed(output, &e))?;

    render_mode(
        output,
        &KinView {
            person,
            view: partners,
        },
        |v, w| {
            for partner in &v.view.partner {
                text_person_line(w, partner)?;
            }
            Ok(())
        },
        |v, w| render_partners_pretty(&v.person, &v.view, w),
    )
}

fn render_partners_pretty(
    person: &Person,
    partners: &Partners,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    pretty_section(w, &format!("Partners of {}", person.display_name()))?;
    if partners.is_empty() {
        writeln!(w, "  none recorded")?;
    }
    for partner in &partners.partner {
        pretty_person_line(w, partner)?;
    }
    write_unresolved(w, &partners.unresolved)
}

pub fn run_children(args: &KinArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;
    let person = load_person(&project.conn, &args.id, output)?;
    let children = Resolver::new(&project.conn)
        .children(&person.id)
        .map_err(|e| resolve_failed(output, &e))?;

    render_mode(
        output,
        &KinView {
            person,
            view: children,
        },
        |v, w| {
            for entry in &v.view.partners {
                for child in &entry.children {
                    writeln!(
                        w,
                        "{}\t{}\t{}",
                        entry.partner.id,
                        child.id,
                        child.display_name()
                    )?;
                }
            }
            Ok(())
        },
        |v, w| render_children_pretty(&v.person, &v.view, w),
    )
}

fn render_children_pretty(
    person: &Person,
    children: &Children,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    if children.partners.is_empty() {
        pretty_section(w, &format!("Children of {}", person.display_name()))?;
        return writeln!(w, "  no partners recorded");
    }
    for (i, entry) in children.partners.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        pretty_section(
            w,
            &format!(
                "Children of {} with {}",
                person.display_name(),
                entry.partner.display_name()
            ),
        )?;
        if !entry.complete {
            writeln!(w, "  warning: children with this partner could not be loaded")?;
        } else if entry.children.is_empty() {
            writeln!(w, "  none recorded")?;
        }
        for child in &entry.children {
            pretty_person_line(w, child)?;
        }
    }
    Ok(())
}
