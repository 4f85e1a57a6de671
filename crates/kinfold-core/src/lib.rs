//! kinfold-core library.
//!
//! # Conventions
//!
//! - **Errors**: query helpers return `anyhow::Result`; the store seam and the
//!   resolver use the typed errors in [`error`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod model;
pub mod store;

pub use error::{ErrorCode, ResolveError, StoreError};
pub use graph::kinship::Resolver;
pub use model::person::{Person, PersonId, Sex};
pub use model::tie::{NewTie, Tie, TieKind, TieLink};
pub use store::{TieFilter, TieStore};
