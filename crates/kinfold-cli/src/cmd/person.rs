//! `kf person`: add, show, list, update and remove people.

use crate::cmd::{checked, fail, open_project, report};
use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_person_line, pretty_rule, pretty_section,
    render_mode, render_success, text_person_line,
};
use crate::validate;
use anyhow::Result;
use clap::{Args, Subcommand};
use kinfold_core::db::query::{self, PersonFilter, PersonSort};
use kinfold_core::error::ErrorCode;
use kinfold_core::graph::kinship::{Parents, Partners};
use kinfold_core::model::person::{NewPerson, Person, PersonId, PersonUpdate};
use kinfold_core::Resolver;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
pub struct PersonArgs {
    #[command(subcommand)]
    pub command: PersonCommand,
}

#[derive(Subcommand, Debug)]
pub enum PersonCommand {
    /// Add a person.
    Add(PersonAddArgs),
    /// Show one person with their parents and partners.
    Show(PersonIdArg),
    /// List people.
    List(PersonListArgs),
    /// Change fields on a person.
    Update(PersonUpdateArgs),
    /// Remove a person that no tie references.
    Rm(PersonIdArg),
}

/// Name and contact fields shared by `add` and `update`.
#[derive(Args, Debug)]
pub struct PersonFields {
    /// Middle name(s).
    #[arg(long)]
    pub middle: Option<String>,

    /// Maiden name.
    #[arg(long)]
    pub maiden: Option<String>,

    /// Nickname or alias.
    #[arg(long)]
    pub alias: Option<String>,

    /// Sex: male, female or other.
    #[arg(long)]
    pub sex: Option<String>,

    /// Birth date (YYYY-MM-DD).
    #[arg(long)]
    pub born: Option<String>,

    /// Death date (YYYY-MM-DD).
    #[arg(long)]
    pub died: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Args, Debug)]
pub struct PersonAddArgs {
    /// First name.
    #[arg(long = "first")]
    pub first_name: String,

    /// Last name.
    #[arg(long = "last")]
    pub last_name: String,

    /// Explicit person id. Generated from the names when omitted.
    #[arg(long)]
    pub id: Option<String>,

    #[command(flatten)]
    pub fields: PersonFields,
}

#[derive(Args, Debug)]
pub struct PersonIdArg {
    /// Person id.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct PersonListArgs {
    /// Case-insensitive match against names and alias.
    #[arg(long, short)]
    pub search: Option<String>,

    /// Sort column: first_name, last_name, born, created. Defaults to the
    /// project config.
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending.
    #[arg(long)]
    pub desc: bool,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,
}

#[derive(Args, Debug)]
pub struct PersonUpdateArgs {
    /// Person id.
    pub id: String,

    #[arg(long = "first")]
    pub first_name: Option<String>,

    #[arg(long = "last")]
    pub last_name: Option<String>,

    #[command(flatten)]
    pub fields: PersonFields,
}

#[derive(Debug, Serialize)]
struct PersonDetail {
    person: Person,
    parents: Parents,
    partners: Partners,
}

#[derive(Debug, Serialize)]
struct PersonList {
    people: Vec<Person>,
    count: usize,
}

pub fn run_person(args: &PersonArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    match &args.command {
        PersonCommand::Add(add) => run_add(add, output, project_root),
        PersonCommand::Show(show) => run_show(show, output, project_root),
        PersonCommand::List(list) => run_list(list, output, project_root),
        PersonCommand::Update(update) => run_update(update, output, project_root),
        PersonCommand::Rm(rm) => run_rm(rm, output, project_root),
    }
}

/// Validated optional fields, in [`PersonUpdate`] shape.
fn parse_fields(fields: &PersonFields, output: OutputMode) -> Result<PersonUpdate> {
    for (field, value) in [
        ("middle_name", &fields.middle),
        ("maiden_name", &fields.maiden),
        ("alias", &fields.alias),
    ] {
        if let Some(value) = value {
            checked(output, validate::validate_name(field, value))?;
        }
    }
    if let Some(email) = &fields.email {
        checked(output, validate::validate_email(email))?;
    }
    if let Some(phone) = &fields.phone {
        checked(output, validate::validate_phone(phone))?;
    }

    let sex = fields
        .sex
        .as_deref()
        .map(|s| checked(output, validate::validate_sex(s)))
        .transpose()?;
    let born = fields
        .born
        .as_deref()
        .map(|s| checked(output, validate::validate_date("born", s)))
        .transpose()?;
    let died = fields
        .died
        .as_deref()
        .map(|s| checked(output, validate::validate_date("died", s)))
        .transpose()?;

    Ok(PersonUpdate {
        first_name: None,
        middle_name: fields.middle.clone(),
        last_name: None,
        maiden_name: fields.maiden.clone(),
        alias: fields.alias.clone(),
        sex,
        born,
        died,
        email: fields.email.clone(),
        phone_number: fields.phone.clone(),
    })
}

fn person_id(raw: &str, output: OutputMode) -> Result<PersonId> {
    checked(output, validate::validate_person_id(raw))?;
    Ok(PersonId::from(raw))
}

fn not_found(output: OutputMode, id: &PersonId) -> anyhow::Error {
    fail(
        output,
        &CliError::coded(ErrorCode::PersonNotFound, format!("person '{id}' not found")),
    )
}

fn run_add(args: &PersonAddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    checked(output, validate::validate_name("first_name", &args.first_name))?;
    checked(output, validate::validate_name("last_name", &args.last_name))?;
    let id = args
        .id
        .as_deref()
        .map(|raw| person_id(raw, output))
        .transpose()?;
    let fields = parse_fields(&args.fields, output)?;
    checked(output, validate::validate_lifespan(fields.born, fields.died))?;

    let project = open_project(project_root, output)?;
    let new = NewPerson {
        id,
        first_name: args.first_name.clone(),
        middle_name: fields.middle_name,
        last_name: args.last_name.clone(),
        maiden_name: fields.maiden_name,
        alias: fields.alias,
        sex: fields.sex.unwrap_or_default(),
        born: fields.born,
        died: fields.died,
        email: fields.email,
        phone_number: fields.phone_number,
    };
    let person = query::insert_person(&project.conn, &new).map_err(|e| report(output, e))?;
    info!(id = %person.id, "added person");

    render_mode(
        output,
        &person,
        |p, w| writeln!(w, "{}", p.id),
        |p, w| writeln!(w, "✓ Added {} ({})", p.display_name(), p.id),
    )
}

fn run_show(args: &PersonIdArg, output: OutputMode, project_root: &Path) -> Result<()> {
    let id = person_id(&args.id, output)?;
    let project = open_project(project_root, output)?;

    let Some(person) = query::get_person(&project.conn, &id).map_err(|e| report(output, e))?
    else {
        return Err(not_found(output, &id));
    };

    let resolver = Resolver::new(&project.conn);
    let parents = resolver
        .parents(&id)
        .map_err(|e| fail(output, &CliError::from(&e)))?;
    let partners = resolver
        .partners(&id)
        .map_err(|e| fail(output, &CliError::from(&e)))?;

    let detail = PersonDetail {
        person,
        parents,
        partners,
    };
    render_mode(output, &detail, render_detail_text, render_detail_pretty)
}

fn render_detail_pretty(detail: &PersonDetail, w: &mut dyn Write) -> std::io::Result<()> {
    let p = &detail.person;
    pretty_section(w, &format!("Person {}", p.id))?;
    writeln!(w, "{}", p.display_name())?;
    pretty_rule(w)?;
    pretty_kv(w, "sex", p.sex.as_str())?;
    if let Some(born) = p.born {
        pretty_kv(w, "born", born.to_string())?;
    }
    if let Some(died) = p.died {
        pretty_kv(w, "died", died.to_string())?;
    }
    if let Some(ref email) = p.email {
        pretty_kv(w, "email", email)?;
    }
    if let Some(ref phone) = p.phone_number {
        pretty_kv(w, "phone", phone)?;
    }

    let parents: Vec<&Person> = detail
        .parents
        .parent_b
        .iter()
        .chain(&detail.parents.parent_c)
        .collect();
    if !parents.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Parents")?;
        for parent in parents {
            pretty_person_line(w, parent)?;
        }
    }
    if !detail.partners.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Partners")?;
        for partner in &detail.partners.partner {
            pretty_person_line(w, partner)?;
        }
    }
    Ok(())
}

fn render_detail_text(detail: &PersonDetail, w: &mut dyn Write) -> std::io::Result<()> {
    let p = &detail.person;
    writeln!(w, "id:          {}", p.id)?;
    writeln!(w, "name:        {}", p.display_name())?;
    writeln!(w, "sex:         {}", p.sex)?;
    if let Some(born) = p.born {
        writeln!(w, "born:        {born}")?;
    }
    if let Some(died) = p.died {
        writeln!(w, "died:        {died}")?;
    }
    if let Some(ref email) = p.email {
        writeln!(w, "email:       {email}")?;
    }
    if let Some(ref phone) = p.phone_number {
        writeln!(w, "phone:       {phone}")?;
    }
    for parent in detail.parents.parent_b.iter().chain(&detail.parents.parent_c) {
        writeln!(w, "parent:      {}", parent.id)?;
    }
    for partner in &detail.partners.partner {
        writeln!(w, "partner:     {}", partner.id)?;
    }
    Ok(())
}

fn run_list(args: &PersonListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = open_project(project_root, output)?;

    let sort_raw = args.sort.as_deref().unwrap_or(&project.config.people.sort);
    let sort: PersonSort = sort_raw.parse().map_err(|e: anyhow::Error| {
        fail(
            output,
            &CliError::with_details(e.to_string(), "pass --sort first_name", "invalid_sort"),
        )
    })?;
    let filter = PersonFilter {
        search: args.search.clone(),
        sort,
        ascending: project.config.people.ascending && !args.desc,
        limit: args.limit,
        offset: args.offset,
    };

    let people = query::list_people(&project.conn, &filter).map_err(|e| report(output, e))?;
    let list = PersonList {
        count: people.len(),
        people,
    };

    render_mode(
        output,
        &list,
        |l, w| {
            for person in &l.people {
                text_person_line(w, person)?;
            }
            Ok(())
        },
        |l, w| {
            if l.people.is_empty() {
                return writeln!(w, "No people recorded.");
            }
            pretty_section(w, &format!("People ({})", l.count))?;
            for person in &l.people {
                pretty_person_line(w, person)?;
            }
            Ok(())
        },
    )
}

fn run_update(args: &PersonUpdateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let id = person_id(&args.id, output)?;
    if let Some(first) = &args.first_name {
        checked(output, validate::validate_name("first_name", first))?;
    }
    if let Some(last) = &args.last_name {
        checked(output, validate::validate_name("last_name", last))?;
    }
    let update = PersonUpdate {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        ..parse_fields(&args.fields, output)?
    };

    let project = open_project(project_root, output)?;
    let Some(current) = query::get_person(&project.conn, &id).map_err(|e| report(output, e))?
    else {
        return Err(not_found(output, &id));
    };
    checked(
        output,
        validate::validate_lifespan(
            update.born.or(current.born),
            update.died.or(current.died),
        ),
    )?;

    let Some(person) =
        query::update_person(&project.conn, &id, &update).map_err(|e| report(output, e))?
    else {
        return Err(not_found(output, &id));
    };
    info!(id = %person.id, "updated person");

    render_mode(
        output,
        &person,
        |p, w| writeln!(w, "{}", p.id),
        |p, w| writeln!(w, "✓ Updated {} ({})", p.display_name(), p.id),
    )
}

fn run_rm(args: &PersonIdArg, output: OutputMode, project_root: &Path) -> Result<()> {
    let id = person_id(&args.id, output)?;
    let project = open_project(project_root, output)?;

    if !query::delete_person(&project.conn, &id).map_err(|e| report(output, e))? {
        return Err(not_found(output, &id));
    }
    info!(id = %id, "removed person");

    render_success(output, &format!("Removed person {id}"))
}
