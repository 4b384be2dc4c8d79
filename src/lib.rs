//! reeldb — a concurrent TCP server for a YAML-framed movie catalog,
//! backed by an embedded relational store.
//!
//! See `DESIGN.md` for how each module below is grounded in the crate
//! this one was adapted from.

pub mod builder;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod model;
pub mod net;
pub mod parser;
pub mod pool;
pub mod queue;
