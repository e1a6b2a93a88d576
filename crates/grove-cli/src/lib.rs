// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Library half of the `grove` console programs.
//!
//! The binary wires real adapters; tests drive the same walkthroughs against
//! scripted services.
#![forbid(unsafe_code)]

pub mod cases;
pub mod runner;
pub mod setup;

pub use cases::{Expect, QueryCase};
pub use runner::run_cases;
