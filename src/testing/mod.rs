//! # Testing & Assertions
//!
//! Declarative HTTP contract checks: a [`case::TestCase`] describes one
//! request and the status codes and JSON shape its response must have, the
//! [`runner::Runner`] executes cases serially against a live service, and
//! [`report::RunReport`] aggregates outcomes.
//!
//! Outcomes distinguish contract violations (a response that breaks an
//! expectation) from infrastructure failures (no usable response) and from
//! skips (a prerequisite such as login did not succeed).

pub mod assertion;
pub mod case;
pub mod report;
pub mod runner;
