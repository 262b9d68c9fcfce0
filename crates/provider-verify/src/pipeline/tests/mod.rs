//! Scenario tests for the orchestration core, driven through the public
//! scheduler and router surfaces.

pub(crate) mod common;
mod routing;
