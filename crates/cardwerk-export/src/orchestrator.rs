// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export orchestrator: resolves each pair against the session, renders it
// on the worker, and writes the images (and manifest) to a sink while
// reporting progress.

use std::collections::HashSet;
use std::path::PathBuf;

use cardwerk_core::config::ExportDefaults;
use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::pairing::Pairing;
use cardwerk_core::session::{DetectionKey, Session};
use cardwerk_core::{
    ExportStage, OutputFormat, PairManifest, PairRequest, ProgressEvent, Quality, SidePayload,
    images_per_pair,
};
use tracing::{error, info, instrument, warn};

use crate::manifest::{self, MANIFEST_FILE};
use crate::naming::{pair_folder, sanitize_folder_path, unique_name};
use crate::sink::ExportSink;
use crate::worker::ImageWorker;

/// Per-run rendering options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    pub format: OutputFormat,
    pub quality: Quality,
    pub include_warped: bool,
    pub write_manifest: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_defaults(&ExportDefaults::default())
    }
}

impl ExportOptions {
    pub fn from_defaults(defaults: &ExportDefaults) -> Self {
        Self {
            format: defaults.format,
            quality: Quality::from_ui(defaults.quality),
            include_warped: defaults.include_warped,
            write_manifest: defaults.write_manifest,
        }
    }
}

/// One named pair to export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPair {
    pub pairing: Pairing,
    pub card_name: String,
    pub set_name: String,
    /// Explicit folder; defaults to `set/card`.
    pub folder_path: Option<String>,
}

impl ExportPair {
    pub fn new(pairing: Pairing, card_name: impl Into<String>, set_name: impl Into<String>) -> Self {
        Self {
            pairing,
            card_name: card_name.into(),
            set_name: set_name.into(),
            folder_path: None,
        }
    }

    fn base_folder(&self) -> String {
        match &self.folder_path {
            Some(path) => sanitize_folder_path(path),
            None => pair_folder(&self.set_name, &self.card_name),
        }
    }

    /// Work units this pair contributes to the progress total.
    pub fn units(&self, options: &ExportOptions) -> u64 {
        images_per_pair(options.include_warped, self.pairing.back.is_some())
            + u64::from(options.write_manifest)
    }
}

/// A pair that could not be exported, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPair {
    pub pair_id: String,
    pub card_name: String,
    pub reason: String,
}

/// What an export run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    /// Relative paths, in write order.
    pub files_written: Vec<String>,
    pub failed_pairs: Vec<FailedPair>,
    pub archive_path: Option<PathBuf>,
}

/// Distinct folder per pair, in pair order; repeats get `_1`, `_2`, ...
pub fn plan_folders(pairs: &[ExportPair]) -> Vec<String> {
    let mut used = HashSet::new();
    pairs
        .iter()
        .map(|pair| {
            let folder = unique_name(&used, &pair.base_folder());
            used.insert(folder.clone());
            folder
        })
        .collect()
}

/// Total work units of a run: images per pair plus one per manifest.
pub fn total_units(pairs: &[ExportPair], options: &ExportOptions) -> u64 {
    pairs.iter().map(|p| p.units(options)).sum()
}

fn side_payload(session: &Session, key: &DetectionKey) -> Result<SidePayload> {
    let info = session.require_working_image(&key.file_id)?;
    let card = session.resolve_key(key)?;
    let original = info.to_original(card);
    Ok(SidePayload::from_card(
        info.original_blob.clone(),
        Some(info.file_name.clone()),
        &original,
    ))
}

/// Resolve a pairing into a renderer request in original-image coordinates.
pub fn build_pair_request(
    session: &Session,
    pairing: &Pairing,
    options: &ExportOptions,
) -> Result<PairRequest> {
    let front = side_payload(session, &pairing.front)?;
    let back = pairing
        .back
        .as_ref()
        .map(|key| side_payload(session, key))
        .transpose()?;
    Ok(PairRequest {
        pair_id: pairing.pair_id.clone(),
        format: options.format,
        quality: options.quality,
        include_warped: options.include_warped,
        front,
        back,
    })
}

/// Monotonic progress counter feeding the caller's callback.
struct Progress<F: FnMut(ProgressEvent)> {
    completed: u64,
    total: u64,
    emit: F,
}

impl<F: FnMut(ProgressEvent)> Progress<F> {
    fn send(&mut self, stage: ExportStage, message: String, pair: Option<(&str, usize)>) {
        (self.emit)(ProgressEvent {
            stage,
            completed: self.completed,
            total: self.total,
            message,
            pair_id: pair.map(|(id, _)| id.to_string()),
            pair_index: pair.map(|(_, index)| index),
        });
    }

    fn advance_to(&mut self, target: u64) {
        self.completed = self.completed.max(target.min(self.total));
    }
}

/// Export every pair, in order, to `sink`.
///
/// Failures scoped to one pair (unresolvable detection, missing working
/// image, render failure, worker timeout) are recorded in the report and the
/// run continues. Collisions, revoked folder access and archive/IO errors
/// abort the run; files already written stay where they are.
#[instrument(
    skip_all,
    fields(pairs = pairs.len(), sink = %sink.describe(), format = ?options.format)
)]
pub async fn run_export<F>(
    worker: &mut ImageWorker,
    session: &Session,
    pairs: &[ExportPair],
    options: &ExportOptions,
    sink: &mut dyn ExportSink,
    on_progress: F,
) -> Result<ExportReport>
where
    F: FnMut(ProgressEvent),
{
    let mut progress = Progress {
        completed: 0,
        total: total_units(pairs, options),
        emit: on_progress,
    };
    let mut report = ExportReport::default();
    let folders = plan_folders(pairs);

    progress.send(
        ExportStage::Initializing,
        format!("Preparing {} pair(s) for {}", pairs.len(), sink.describe()),
        None,
    );
    info!(total = progress.total, "export started");

    for (index, (pair, folder)) in pairs.iter().zip(&folders).enumerate() {
        let pair_id = pair.pairing.pair_id.as_str();
        let done_after = progress.completed + pair.units(options);

        progress.send(
            ExportStage::Processing,
            format!("Rendering {}", pair.card_name),
            Some((pair_id, index)),
        );

        match export_pair(worker, session, pair, folder, options, sink, &mut progress, index).await {
            Ok(mut written) => report.files_written.append(&mut written),
            Err(err) if err.aborts_run() => {
                error!(pair = pair_id, error = %err, "export aborted");
                return Err(err);
            }
            Err(err) => {
                warn!(pair = pair_id, error = %err, "pair skipped");
                report.failed_pairs.push(FailedPair {
                    pair_id: pair_id.to_string(),
                    card_name: pair.card_name.clone(),
                    reason: err.to_string(),
                });
            }
        }

        progress.advance_to(done_after);
    }

    report.archive_path = sink.finish()?;
    progress.advance_to(progress.total);
    progress.send(
        ExportStage::Finalizing,
        format!(
            "Exported {} file(s); {} pair(s) failed",
            report.files_written.len(),
            report.failed_pairs.len()
        ),
        None,
    );
    info!(
        files = report.files_written.len(),
        failed = report.failed_pairs.len(),
        "export finished"
    );
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn export_pair<F: FnMut(ProgressEvent)>(
    worker: &mut ImageWorker,
    session: &Session,
    pair: &ExportPair,
    folder: &str,
    options: &ExportOptions,
    sink: &mut dyn ExportSink,
    progress: &mut Progress<F>,
    index: usize,
) -> Result<Vec<String>> {
    let pair_id = pair.pairing.pair_id.as_str();
    let request = build_pair_request(session, &pair.pairing, options)?;
    let front_manifest = request.front.manifest();
    let back_manifest = request.back.as_ref().map(SidePayload::manifest);

    let rendered = worker.process_pair(request).await?;
    if rendered.pair_id != pair_id {
        return Err(CardwerkError::ExportFailure {
            pair: pair_id.to_string(),
            detail: format!("renderer answered for {}", rendered.pair_id),
        });
    }

    let mut written = Vec::with_capacity(rendered.images.len() + 1);
    let names: Vec<String> = rendered.images.iter().map(|i| i.name.clone()).collect();
    for image in &rendered.images {
        let path = format!("{folder}/{}", image.name);
        sink.write(&path, &image.bytes)?;
        progress.completed += 1;
        progress.send(ExportStage::Writing, format!("Wrote {path}"), Some((pair_id, index)));
        written.push(path);
    }

    if options.write_manifest {
        let manifest = PairManifest {
            pair_id: pair_id.to_string(),
            card_name: pair.card_name.clone(),
            set_name: pair.set_name.clone(),
            folder_path: folder.to_string(),
            files: names,
            front: front_manifest,
            back: back_manifest,
        };
        let path = format!("{folder}/{MANIFEST_FILE}");
        sink.write(&path, &manifest::to_bytes(&manifest)?)?;
        progress.completed += 1;
        progress.send(ExportStage::Writing, format!("Wrote {path}"), Some((pair_id, index)));
        written.push(path);
    }
    Ok(written)
}
