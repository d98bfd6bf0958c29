//! # tinydb-core
//!
//! The storage-and-serialization core of an embedded, single-file
//! document database: a BSON value model and wire codec, a host ⇄ BSON
//! conversion layer, an entity adapter registry with an optional
//! reflection fallback, and a schema catalog with DDL/code-gen emitters.
//!
//! This crate draws no page, WAL, or query-engine boundary of its own —
//! those live one layer up, against the [`sink::ByteSink`] and
//! [`catalog::collection::Collection`]/[`catalog::collection::DatabaseEngine`]
//! traits this crate calls out to (§6 of the design notes).

#![allow(clippy::too_many_arguments)]

pub mod adapter;
pub mod bson;
pub mod catalog;
pub mod convert;
pub mod emit;
mod error;
pub mod sink;

pub use error::{Error, Result};
