// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Cardwerk.

use thiserror::Error;

/// Top-level error type for all Cardwerk operations.
#[derive(Debug, Error)]
pub enum CardwerkError {
    // -- Decode errors --
    #[error("unsupported image format for {file}: {detail}")]
    UnsupportedFormat { file: String, detail: String },

    #[error("failed to decode {file} (the file may be corrupted): {detail}")]
    DecodeFailure { file: String, detail: String },

    #[error("could not create a drawing surface for {file}: {detail}")]
    ContextCreationFailure { file: String, detail: String },

    // -- Detection errors --
    #[error("card detection failed for {file}: {detail}")]
    DetectionFailure { file: String, detail: String },

    // -- Session / pairing errors --
    #[error("working image for {0} is not available (decode has not completed)")]
    MissingWorkingImage(String),

    #[error("detection {detection} in {file} no longer resolves")]
    UnresolvedDetection { file: String, detection: String },

    // -- Export errors --
    #[error("export target already exists: {0}")]
    NameCollision(String),

    #[error("access to export folder {0} was revoked")]
    PermissionRevoked(String),

    #[error("export of pair {pair} failed: {detail}")]
    ExportFailure { pair: String, detail: String },

    #[error("archive error: {0}")]
    Archive(String),

    // -- Worker errors --
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("image worker unavailable: {0}")]
    WorkerUnavailable(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CardwerkError {
    /// Whether this error must stop an entire export run rather than only
    /// the pair, side, or file it arose from.
    ///
    /// Partial exports after a collision or a lost folder would be
    /// misleading, so those abort everything. Files already written are left
    /// in place.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            Self::NameCollision(_) | Self::PermissionRevoked(_) | Self::Archive(_) | Self::Io(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardwerkError>;
