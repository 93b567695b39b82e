//! Integration tests driving the public API against the paper exchange

mod common;
mod e2e_test;
mod execution_test;
mod resilience_test;
