//! Tether Core
//!
//! Core library for an infrastructure management tool that treats side
//! effects as values, with a reconciliation primitive for list members of
//! remote objects that can only be read and replaced as a whole.

pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod lock;
pub mod membership;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
