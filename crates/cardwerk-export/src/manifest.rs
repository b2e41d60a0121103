// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-pair MANIFEST.json.

use cardwerk_core::PairManifest;
use cardwerk_core::error::Result;

/// File name of the manifest inside each pair folder.
pub const MANIFEST_FILE: &str = "MANIFEST.json";

/// Pretty JSON for a manifest. The same bytes go to directories and
/// archives.
pub fn to_bytes(manifest: &PairManifest) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(manifest)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn from_bytes(bytes: &[u8]) -> Result<PairManifest> {
    Ok(serde_json::from_slice(bytes)?)
}
