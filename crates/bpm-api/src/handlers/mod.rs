//! HTTP handlers.
//!
//! Every family shares the generic handlers in [`resources`]; the router
//! instantiates them per resource type.

pub mod health;
pub mod resources;
