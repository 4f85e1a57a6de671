//! Graph-level views over the tie table.
//!
//! ## Submodules
//!
//! - [`kinship`] parents, siblings, partners and children derived from
//!   tie rows through a [`TieStore`](crate::store::TieStore).

pub mod kinship;
