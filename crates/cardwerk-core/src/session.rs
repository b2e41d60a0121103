// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session context: per-file working images, detections, manual outlines,
// and the detection-reference lookup rule. Passed explicitly to each step;
// there is no ambient global store.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{CardwerkError, Result};
use crate::types::{DetectedCard, FileId, WorkingImageInfo};

const AUTO_INFIX: &str = "-card-";
const MANUAL_INFIX: &str = "-manual-";

/// Parsed form of a detection reference string.
///
/// Auto detections are `"{fileId}-card-{index}"`; manually drawn outlines are
/// `"{fileId}-manual-{manualId}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DetectionRef {
    Auto(usize),
    Manual(String),
}

impl DetectionRef {
    /// Render the reference string for `file_id`.
    pub fn to_id(&self, file_id: &FileId) -> String {
        match self {
            Self::Auto(index) => format!("{file_id}{AUTO_INFIX}{index}"),
            Self::Manual(id) => format!("{file_id}{MANUAL_INFIX}{id}"),
        }
    }

    /// Parse a reference string that must belong to `file_id`. Any other
    /// shape yields `None`.
    pub fn parse(file_id: &FileId, id: &str) -> Option<Self> {
        let rest = id.strip_prefix(file_id.as_str())?;
        if let Some(index) = rest.strip_prefix(AUTO_INFIX) {
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            return index.parse().ok().map(Self::Auto);
        }
        match rest.strip_prefix(MANUAL_INFIX) {
            Some(manual) if !manual.is_empty() => Some(Self::Manual(manual.to_string())),
            _ => None,
        }
    }
}

/// `(fileId, detectionId)`: the identity of a detection in a pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetectionKey {
    pub file_id: FileId,
    pub detection_id: String,
}

impl DetectionKey {
    pub fn new(file_id: FileId, detection_id: impl Into<String>) -> Self {
        Self {
            file_id,
            detection_id: detection_id.into(),
        }
    }

    pub fn auto(file_id: &FileId, index: usize) -> Self {
        Self::new(file_id.clone(), DetectionRef::Auto(index).to_id(file_id))
    }

    pub fn manual(file_id: &FileId, manual_id: &str) -> Self {
        Self::new(
            file_id.clone(),
            DetectionRef::Manual(manual_id.to_string()).to_id(file_id),
        )
    }
}

/// A card outline drawn by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualDetection {
    pub id: String,
    pub card: DetectedCard,
}

/// An active detection offered to the pairing step.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: DetectionKey,
    pub card: DetectedCard,
}

#[derive(Debug, Clone, Default)]
struct FileState {
    working: Option<WorkingImageInfo>,
    detections: Option<Vec<DetectedCard>>,
    manual: Vec<ManualDetection>,
    deactivated: BTreeSet<usize>,
}

/// All per-file state for one wizard session.
///
/// Each piece is written only by the step that owns it (decode, detection,
/// manual adjustment) and read by the later ones.
#[derive(Debug, Default)]
pub struct Session {
    files: BTreeMap<FileId, FileState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Working images -------------------------------------------------------

    /// Store the working image for a file. Replacing a file invalidates
    /// everything derived from the previous image.
    pub fn insert_working_image(&mut self, file_id: FileId, info: WorkingImageInfo) {
        debug!(file_id = %file_id, file = %info.file_name, "working image stored");
        self.files.insert(
            file_id,
            FileState {
                working: Some(info),
                ..FileState::default()
            },
        );
    }

    pub fn working_image(&self, file_id: &FileId) -> Option<&WorkingImageInfo> {
        self.files.get(file_id)?.working.as_ref()
    }

    /// Like [`Session::working_image`] but reports `MissingWorkingImage`.
    pub fn require_working_image(&self, file_id: &FileId) -> Result<&WorkingImageInfo> {
        self.working_image(file_id)
            .ok_or_else(|| CardwerkError::MissingWorkingImage(file_id.to_string()))
    }

    // -- Detections -----------------------------------------------------------

    /// Replace the auto detections for a file. Deactivations refer to
    /// indices of the old list and are cleared.
    pub fn set_detections(&mut self, file_id: &FileId, cards: Vec<DetectedCard>) {
        let state = self.files.entry(file_id.clone()).or_default();
        debug!(file_id = %file_id, count = cards.len(), "detections stored");
        state.detections = Some(cards);
        state.deactivated.clear();
    }

    pub fn detections(&self, file_id: &FileId) -> Option<&[DetectedCard]> {
        self.files.get(file_id)?.detections.as_deref()
    }

    /// Exclude an auto detection from pairing.
    pub fn deactivate(&mut self, file_id: &FileId, index: usize) {
        self.files
            .entry(file_id.clone())
            .or_default()
            .deactivated
            .insert(index);
    }

    pub fn reactivate(&mut self, file_id: &FileId, index: usize) {
        if let Some(state) = self.files.get_mut(file_id) {
            state.deactivated.remove(&index);
        }
    }

    pub fn is_active(&self, file_id: &FileId, index: usize) -> bool {
        self.files
            .get(file_id)
            .is_none_or(|state| !state.deactivated.contains(&index))
    }

    // -- Manual adjustments ---------------------------------------------------

    /// Add (or replace, by id) a manually drawn outline.
    pub fn add_manual(&mut self, file_id: &FileId, detection: ManualDetection) {
        let state = self.files.entry(file_id.clone()).or_default();
        match state.manual.iter_mut().find(|m| m.id == detection.id) {
            Some(existing) => *existing = detection,
            None => state.manual.push(detection),
        }
    }

    /// Remove a manual outline. Returns whether one was removed.
    pub fn remove_manual(&mut self, file_id: &FileId, manual_id: &str) -> bool {
        let Some(state) = self.files.get_mut(file_id) else {
            return false;
        };
        let before = state.manual.len();
        state.manual.retain(|m| m.id != manual_id);
        state.manual.len() != before
    }

    pub fn manual_detections(&self, file_id: &FileId) -> &[ManualDetection] {
        self.files
            .get(file_id)
            .map(|state| state.manual.as_slice())
            .unwrap_or(&[])
    }

    // -- Lifecycle ------------------------------------------------------------

    pub fn clear_file(&mut self, file_id: &FileId) {
        self.files.remove(file_id);
    }

    pub fn reset(&mut self) {
        self.files.clear();
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &FileId> {
        self.files.keys()
    }

    // -- Resolution -----------------------------------------------------------

    /// Resolve a detection reference.
    ///
    /// Auto references index the file's detection list; manual references
    /// are looked up by id in the file's manual list. Missing ids, absent
    /// lists, out-of-range indices, and unknown shapes all resolve to `None`.
    pub fn resolve(
        &self,
        file_id: Option<&FileId>,
        detection_id: Option<&str>,
    ) -> Option<&DetectedCard> {
        let file_id = file_id?;
        let reference = DetectionRef::parse(file_id, detection_id?)?;
        let state = self.files.get(file_id)?;
        match reference {
            DetectionRef::Auto(index) => state.detections.as_ref()?.get(index),
            DetectionRef::Manual(id) => state
                .manual
                .iter()
                .find(|m| m.id == id)
                .map(|m| &m.card),
        }
    }

    /// Resolve a key, reporting `UnresolvedDetection` when it no longer
    /// points anywhere.
    pub fn resolve_key(&self, key: &DetectionKey) -> Result<&DetectedCard> {
        self.resolve(Some(&key.file_id), Some(&key.detection_id))
            .ok_or_else(|| CardwerkError::UnresolvedDetection {
                file: key.file_id.to_string(),
                detection: key.detection_id.clone(),
            })
    }

    /// Active auto detections plus manual outlines, ordered left to right.
    pub fn candidates(&self, file_id: &FileId) -> Vec<Candidate> {
        let Some(state) = self.files.get(file_id) else {
            return Vec::new();
        };

        let auto = state
            .detections
            .iter()
            .flatten()
            .enumerate()
            .filter(|(index, _)| !state.deactivated.contains(index))
            .map(|(index, card)| Candidate {
                key: DetectionKey::auto(file_id, index),
                card: card.clone(),
            });
        let manual = state.manual.iter().map(|m| Candidate {
            key: DetectionKey::manual(file_id, &m.id),
            card: m.card.clone(),
        });

        let mut candidates: Vec<Candidate> = auto.chain(manual).collect();
        candidates.sort_by(|a, b| a.card.center_norm.x.total_cmp(&b.card.center_norm.x));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn card_at(x: i32) -> DetectedCard {
        DetectedCard::from_rect(BoundingBox::new(x, 10, 100, 140), 1000, 500)
    }

    fn session_with_cards() -> (Session, FileId) {
        let mut session = Session::new();
        let front = FileId::from("front");
        session.set_detections(&front, vec![card_at(100), card_at(500)]);
        session.add_manual(
            &front,
            ManualDetection {
                id: "m1".into(),
                card: card_at(300),
            },
        );
        (session, front)
    }

    #[test]
    fn parses_auto_and_manual_references() {
        let file = FileId::from("front");
        assert_eq!(
            DetectionRef::parse(&file, "front-card-2"),
            Some(DetectionRef::Auto(2))
        );
        assert_eq!(
            DetectionRef::parse(&file, "front-manual-abc"),
            Some(DetectionRef::Manual("abc".into()))
        );
        assert_eq!(DetectionRef::parse(&file, "back-card-2"), None);
        assert_eq!(DetectionRef::parse(&file, "front-card-"), None);
        assert_eq!(DetectionRef::parse(&file, "front-card-x"), None);
        assert_eq!(DetectionRef::parse(&file, "front-other-1"), None);
    }

    #[test]
    fn reference_strings_round_trip() {
        let file = FileId::from("f-1");
        let reference = DetectionRef::Manual("x".into());
        assert_eq!(
            DetectionRef::parse(&file, &reference.to_id(&file)),
            Some(reference)
        );
    }

    #[test]
    fn resolves_through_the_same_rule() {
        let (session, front) = session_with_cards();
        assert_eq!(
            session.resolve(Some(&front), Some("front-card-1")),
            Some(&card_at(500))
        );
        assert_eq!(
            session.resolve(Some(&front), Some("front-manual-m1")),
            Some(&card_at(300))
        );
        assert!(session.resolve(Some(&front), Some("front-card-7")).is_none());
        assert!(session.resolve(Some(&front), Some("front-manual-zz")).is_none());
        assert!(session.resolve(None, Some("front-card-0")).is_none());
        assert!(session.resolve(Some(&front), None).is_none());
        assert!(session
            .resolve(Some(&FileId::from("back")), Some("back-card-0"))
            .is_none());
    }

    #[test]
    fn resolve_key_reports_unresolved() {
        let (session, front) = session_with_cards();
        let err = session
            .resolve_key(&DetectionKey::auto(&front, 9))
            .unwrap_err();
        assert!(matches!(err, CardwerkError::UnresolvedDetection { .. }));
    }

    #[test]
    fn candidates_skip_deactivated_and_sort_by_x() {
        let (mut session, front) = session_with_cards();
        session.deactivate(&front, 1);

        let ids: Vec<String> = session
            .candidates(&front)
            .into_iter()
            .map(|c| c.key.detection_id)
            .collect();
        assert_eq!(ids, vec!["front-card-0", "front-manual-m1"]);

        session.reactivate(&front, 1);
        assert_eq!(session.candidates(&front).len(), 3);
    }

    #[test]
    fn replacing_the_working_image_invalidates_detections() {
        let (mut session, front) = session_with_cards();
        let info = WorkingImageInfo::new("front.jpg", vec![], (10, 10), vec![], (10, 10));
        session.insert_working_image(front.clone(), info);
        assert!(session.detections(&front).is_none());
        assert!(session.manual_detections(&front).is_empty());
        assert!(session.require_working_image(&front).is_ok());
    }

    #[test]
    fn missing_working_image_is_reported() {
        let session = Session::new();
        assert!(matches!(
            session.require_working_image(&FileId::from("front")),
            Err(CardwerkError::MissingWorkingImage(_))
        ));
    }

    #[test]
    fn manual_outlines_replace_by_id_and_remove() {
        let (mut session, front) = session_with_cards();
        session.add_manual(
            &front,
            ManualDetection {
                id: "m1".into(),
                card: card_at(700),
            },
        );
        assert_eq!(session.manual_detections(&front).len(), 1);
        assert!(session.remove_manual(&front, "m1"));
        assert!(!session.remove_manual(&front, "m1"));
    }
}
