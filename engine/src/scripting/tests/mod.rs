//! Scenario tests for script set resolution and execution ordering

mod runner_tests;
pub(crate) mod support;
