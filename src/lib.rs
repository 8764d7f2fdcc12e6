//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Native Rust implementation of YANG schema and data trees.
//!
//! The library parses YANG modules (in YANG or YIN syntax) into an
//! in-memory schema graph, resolves all deferred references (typedefs,
//! identities, leafrefs, groupings, augments, features), and builds and
//! validates instance data trees parsed from XML.
//!
//! ## Design Goals
//! * Model the schema and data trees with plain Rust ownership: the
//!   context owns the schema graph, data trees borrow the context
//! * Detect API misuse problems at compile time through lifetimes
//! * Automatic resource management
//! * Deterministic, reproducible diagnostics
//!
//! ## Quick start
//! Create a [`context::Context`], load modules with
//! [`context::Context::load_module`] or
//! [`context::Context::parse_module_str`], then parse instance data
//! with [`data::DataTree::parse_string`].

mod error;

pub mod context;
pub mod data;
pub mod schema;

pub(crate) mod dict;
pub(crate) mod ident;
pub(crate) mod iter;
pub(crate) mod parser;
pub(crate) mod printer;
pub(crate) mod resolver;
pub(crate) mod validation;
pub(crate) mod value;

pub use crate::error::{Error, ErrorCode, Result};
