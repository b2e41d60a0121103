// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export-bundle validation: checks that every pair folder carries the
// expected image set, that manifests agree with the folder contents, and
// that a directory export and a ZIP export of the same run match.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use cardwerk_core::error::{CardwerkError, Result};
use cardwerk_core::{PairManifest, Quadrant, Side};
use tracing::{debug, info, instrument};
use zip::ZipArchive;

use crate::manifest::{self, MANIFEST_FILE};

/// Outcome of a validation run. An empty `issues` list means it passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub folders_checked: usize,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Image names and manifest bytes per folder.
#[derive(Debug, Default, PartialEq)]
struct Bundle {
    images: BTreeMap<String, Vec<String>>,
    manifests: BTreeMap<String, Vec<u8>>,
}

impl Bundle {
    fn add(&mut self, relative: &str, read: impl FnOnce() -> Result<Vec<u8>>) -> Result<()> {
        let (folder, name) = match relative.rsplit_once('/') {
            Some((folder, name)) => (folder.trim_matches('/').to_string(), name),
            None => (".".to_string(), relative),
        };
        let folder = if folder.is_empty() { ".".to_string() } else { folder };
        if is_image(name) {
            self.images.entry(folder).or_default().push(name.to_string());
        } else if name == MANIFEST_FILE {
            self.manifests.insert(folder, read()?);
        }
        Ok(())
    }

    fn sort(&mut self) {
        for names in self.images.values_mut() {
            names.sort();
        }
    }

    fn manifest(&self, folder: &str) -> Result<Option<PairManifest>> {
        self.manifests
            .get(folder)
            .map(|bytes| manifest::from_bytes(bytes))
            .transpose()
    }
}

fn is_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".jpg", ".jpeg", ".png"].iter().any(|ext| lower.ends_with(ext))
}

fn stem_and_ext(name: &str) -> (&str, String) {
    match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext.to_ascii_lowercase()),
        None => (name, String::new()),
    }
}

fn expected_stems(side: Side) -> BTreeSet<String> {
    std::iter::once(format!("{}_LISTING", side.prefix()))
        .chain(
            Quadrant::ALL
                .iter()
                .map(|q| format!("{}_{}", side.prefix(), q.suffix())),
        )
        .collect()
}

fn not_found(what: &str, path: &Path) -> CardwerkError {
    CardwerkError::Io(std::io::Error::new(
        ErrorKind::NotFound,
        format!("{what} {} does not exist", path.display()),
    ))
}

fn collect_directory(root: &Path) -> Result<Bundle> {
    if !root.is_dir() {
        return Err(not_found("directory export", root));
    }
    let mut bundle = Bundle::default();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            bundle.add(&relative.join("/"), || Ok(std::fs::read(&path)?))?;
        }
    }
    bundle.sort();
    Ok(bundle)
}

fn collect_zip(path: &Path) -> Result<Bundle> {
    if !path.is_file() {
        return Err(not_found("ZIP export", path));
    }
    let mut archive = ZipArchive::new(File::open(path)?)
        .map_err(|err| CardwerkError::Archive(format!("{}: {err}", path.display())))?;
    let names: Vec<String> = archive
        .file_names()
        .filter(|n| !n.ends_with('/'))
        .map(str::to_string)
        .collect();

    let mut bundle = Bundle::default();
    for name in names {
        bundle.add(&name, || {
            let mut entry = archive
                .by_name(&name)
                .map_err(|err| CardwerkError::Archive(format!("{name}: {err}")))?;
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            Ok(bytes)
        })?;
    }
    bundle.sort();
    Ok(bundle)
}

/// Issues for one pair folder.
fn check_folder(
    folder: &str,
    images: &[String],
    expect_warped: bool,
    manifest: Option<&PairManifest>,
) -> Vec<String> {
    let mut issues = Vec::new();
    let mut extension: Option<String> = None;
    let mut fronts = BTreeSet::new();
    let mut backs = BTreeSet::new();

    for name in images {
        let (stem, ext) = stem_and_ext(name);
        match &extension {
            None => extension = Some(ext),
            Some(first) if *first != ext => {
                issues.push(format!("{folder}: mixed extensions .{first} vs .{ext}"));
            }
            Some(_) => {}
        }
        if stem.starts_with("FRONT_") {
            fronts.insert(stem.to_string());
        } else if stem.starts_with("BACK_") {
            backs.insert(stem.to_string());
        } else {
            issues.push(format!("{folder}: unexpected file name {name}"));
        }
    }

    let mut expected_front = expected_stems(Side::Front);
    if expect_warped {
        expected_front.insert("FRONT_WARPED".to_string());
    }
    let single = manifest.is_some_and(|m| m.back.is_none());
    let expected_back = if single {
        BTreeSet::new()
    } else {
        expected_stems(Side::Back)
    };

    let missing_front: Vec<&String> = expected_front.difference(&fronts).collect();
    if !missing_front.is_empty() {
        issues.push(format!("{folder}: missing front crops {missing_front:?}"));
    }
    let missing_back: Vec<&String> = expected_back.difference(&backs).collect();
    if !missing_back.is_empty() {
        issues.push(format!("{folder}: missing back crops {missing_back:?}"));
    }

    let expected_total = expected_front.len() + expected_back.len();
    if images.len() != expected_total {
        issues.push(format!(
            "{folder}: expected {expected_total} images (front={}, back={}) but found {}",
            expected_front.len(),
            expected_back.len(),
            images.len()
        ));
    }

    if let Some(manifest) = manifest {
        let mut listed = manifest.files.clone();
        listed.sort();
        if !listed.is_empty() && listed != images {
            issues.push(format!("{folder}: {MANIFEST_FILE} files entry does not match folder contents"));
        }
    }
    if extension.is_none() {
        issues.push(format!("{folder}: no image files located"));
    }
    issues
}

fn check_bundle(bundle: &Bundle, expect_warped: bool, issues: &mut Vec<String>) -> Result<usize> {
    for (folder, images) in &bundle.images {
        let manifest = bundle.manifest(folder)?;
        issues.extend(check_folder(folder, images, expect_warped, manifest.as_ref()));
    }
    Ok(bundle.images.len())
}

/// Validate a directory export, a ZIP export, or both.
///
/// Missing paths and unreadable archives or manifests are errors; everything
/// else is reported as an issue.
#[instrument(skip_all, fields(dir = ?directory, zip = ?zip_path, expect_warped = expect_warped))]
pub fn validate_exports(
    directory: Option<&Path>,
    zip_path: Option<&Path>,
    expect_warped: bool,
) -> Result<ValidationReport> {
    if directory.is_none() && zip_path.is_none() {
        return Err(CardwerkError::InvalidConfig(
            "at least one of a directory export or a ZIP export is required".into(),
        ));
    }

    let dir_bundle = directory.map(collect_directory).transpose()?;
    let zip_bundle = zip_path.map(collect_zip).transpose()?;
    let mut report = ValidationReport::default();

    match (&dir_bundle, &zip_bundle) {
        (Some(dir), Some(zip)) => {
            report.folders_checked = check_bundle(dir, expect_warped, &mut report.issues)?;
            if dir.images != zip.images {
                report
                    .issues
                    .push("directory export does not match ZIP export contents".into());
            }
            for (folder, bytes) in &dir.manifests {
                if zip.manifests.get(folder) != Some(bytes) {
                    report
                        .issues
                        .push(format!("{folder}: {MANIFEST_FILE} differs between directory and ZIP"));
                }
            }
        }
        (Some(bundle), None) | (None, Some(bundle)) => {
            report.folders_checked = check_bundle(bundle, expect_warped, &mut report.issues)?;
        }
        (None, None) => {}
    }

    debug!(issues = ?report.issues, "validation details");
    info!(
        folders = report.folders_checked,
        issues = report.issues.len(),
        "export validation finished"
    );
    Ok(report)
}
