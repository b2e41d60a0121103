// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardwerk-export: Background image worker, export orchestration, output
// sinks (folder or ZIP), and validation of finished export bundles.

pub mod manifest;
pub mod naming;
pub mod orchestrator;
pub mod sink;
pub mod validate;
pub mod worker;

pub use orchestrator::{ExportOptions, ExportPair, ExportReport, FailedPair, run_export};
pub use sink::{ArchiveSink, DirectorySink, ExportSink};
pub use validate::{ValidationReport, validate_exports};
pub use worker::{ImageEngine, ImageWorker, WorkerRequest, WorkerResponse};
