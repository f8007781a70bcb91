//! # evlog-core
//!
//! Core types and store boundary traits for evlog.
//!
//! This crate provides the foundational types shared across all evlog crates:
//! - Configuration entities (monitored entities, groups, memberships)
//! - The immutable log record and its JSON payload
//! - A store-neutral value and record-instance model
//! - Relation traversal plans and raw result trees
//! - The `Store`, `Transaction`, and `ModelExtension` traits that separate the
//!   audit engine from the backing relational store
//! - Cross-cutting error types

pub mod affected;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;
pub mod tables;
pub mod value;
