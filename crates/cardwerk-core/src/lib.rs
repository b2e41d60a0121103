// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cardwerk: core types, error definitions, session state, and the
// front/back pairing matcher shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod pairing;
pub mod session;
pub mod types;

pub use config::CardwerkConfig;
pub use error::CardwerkError;
pub use session::Session;
pub use types::*;
