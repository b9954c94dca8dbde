//! Idea-to-contribution publishing pipeline.
//!
//! Community members publish ideas, claim them, and complete them. Claiming
//! and completing each land as a single commit and pull request in a GitHub
//! content repository.

pub mod config;
pub mod errors;
pub mod hosting;
pub mod logging;
pub mod ratelimit;
pub mod store;
pub mod workflow;
