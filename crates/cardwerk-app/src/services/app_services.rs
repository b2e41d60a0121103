// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: owns the configuration, the image worker and the
// session, and exposes the pipeline steps the commands run in sequence.

use std::path::Path;

use cardwerk_core::error::Result;
use cardwerk_core::human_errors::humanize_error;
use cardwerk_core::pairing::{
    Pairing, PairingMode, PairingPlan, ManualAssignment, auto_pair, nearest_neighbour_pair,
};
use cardwerk_core::{CardwerkConfig, DetectedCard, FileId, ProgressEvent, Session};
use cardwerk_export::{ExportOptions, ExportPair, ExportReport, ExportSink, ImageWorker, run_export};
use cardwerk_vision::InputFile;
use tracing::{info, warn};

/// Everything one command invocation needs.
pub struct AppServices {
    config: CardwerkConfig,
    worker: ImageWorker,
    session: Session,
}

impl AppServices {
    /// Load settings and start the image worker. Must run inside a Tokio
    /// runtime.
    pub fn init(config_path: Option<&Path>) -> Result<Self> {
        let config = CardwerkConfig::load_or_default(config_path)?;
        Ok(Self::with_config(config))
    }

    /// Start the image worker for an already loaded configuration.
    pub fn with_config(config: CardwerkConfig) -> Self {
        let worker = ImageWorker::from_config(&config);
        info!("app services initialised");
        Self {
            config,
            worker,
            session: Session::new(),
        }
    }

    pub fn config(&self) -> &CardwerkConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Decode a photo, detect its cards, and record both under `file_id`.
    pub async fn load_photo(&mut self, path: &Path, file_id: &str) -> Result<FileId> {
        let file = InputFile::read(path)?;
        let name = file.name.clone();
        let decoded = self.worker.decode(file).await?;
        let cards = self.worker.detect(&name, decoded.working.clone()).await?;

        let file_id = FileId::from(file_id);
        info!(file = %name, file_id = %file_id, cards = cards.len(), "photo loaded");
        self.session
            .insert_working_image(file_id.clone(), decoded.into_working_info());
        self.session.set_detections(&file_id, cards);
        Ok(file_id)
    }

    /// Load the back photo, or skip it when it cannot be decoded or scanned.
    ///
    /// A skipped back leaves every front to export single-sided. Errors that
    /// abort a run (missing file, storage) still propagate.
    pub async fn load_back(&mut self, path: &Path) -> Result<Option<FileId>> {
        match self.load_photo(path, "back").await {
            Ok(file_id) => Ok(Some(file_id)),
            Err(err) if !err.aborts_run() => {
                let human = humanize_error(&err);
                warn!(
                    path = %path.display(),
                    error = %err,
                    suggestion = %human.suggestion,
                    "{}; exporting fronts without backs",
                    human.message
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Detections for a loaded file, rescaled to original-image pixels.
    pub fn original_detections(&self, file_id: &FileId) -> Result<Vec<DetectedCard>> {
        let info = self.session.require_working_image(file_id)?;
        Ok(self
            .session
            .detections(file_id)
            .unwrap_or_default()
            .iter()
            .map(|card| info.to_original(card))
            .collect())
    }

    pub async fn export<F>(
        &mut self,
        pairs: &[ExportPair],
        options: &ExportOptions,
        sink: &mut dyn ExportSink,
        on_progress: F,
    ) -> Result<ExportReport>
    where
        F: FnMut(ProgressEvent),
    {
        run_export(&mut self.worker, &self.session, pairs, options, sink, on_progress).await
    }
}

/// Pairings for the loaded photos.
///
/// Equal card counts pair automatically, reversing the backs when that
/// matches better. Otherwise each back goes to its nearest free front and the
/// remaining fronts export without a back.
pub fn suggest_pairings(session: &Session, front: &FileId, back: Option<&FileId>) -> Vec<Pairing> {
    let fronts = session.candidates(front);
    let Some(back) = back else {
        return ManualAssignment::from_candidates(&fronts).pairings();
    };
    let backs = session.candidates(back);

    let plan = PairingPlan::compute(&fronts, &backs);
    match plan.mode {
        PairingMode::Auto(order) => auto_pair(&fronts, &backs, order)
            .unwrap_or_else(|| nearest_neighbour_pair(&fronts, &backs).pairings()),
        PairingMode::Manual => {
            warn!(
                fronts = fronts.len(),
                backs = backs.len(),
                "card counts differ; using nearest-neighbour pairing"
            );
            nearest_neighbour_pair(&fronts, &backs).pairings()
        }
    }
}
