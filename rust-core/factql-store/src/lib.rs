// SPDX-License-Identifier: PMPL-1.0-or-later
//! FactQL Store
//!
//! Typed, in-memory fact collections for FactQL.
//! Record types are declared through explicit schema descriptors; facts are
//! kept in insertion-ordered sets with optional sorted indexes over field
//! paths, maintained consistently on every insert and removal.

pub mod error;
pub mod fact;
pub mod factbase;
pub mod factmap;
pub mod factset;
pub mod index;
pub mod op;
pub mod path;
pub mod schema;
pub mod value;

pub use error::StoreError;
pub use fact::{Fact, FactBuilder};
pub use factbase::FactBase;
pub use factmap::FactMap;
pub use factset::FactSet;
pub use index::FactIndex;
pub use op::CompareOp;
pub use path::{Path, Root};
pub use schema::{FieldDef, FieldKind, RecordType, RecordTypeBuilder};
pub use value::Value;
