// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Front/back pairing matcher.
//
// When both photos contain the same number of cards, the backs are matched
// to the fronts either in the same left-to-right order or reversed (the back
// photo is often taken flipped), whichever minimises the summed centroid
// distance. Otherwise pairing falls back to sparse manual assignment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::session::{Candidate, DetectionKey};
use crate::types::Point;

/// Summed centroid distances for the two candidate orderings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairingDistances {
    /// `front[i]` ↔ `back[i]`.
    pub forward: f64,
    /// `front[i]` ↔ `back[n - 1 - i]`.
    pub reversed: f64,
}

/// Order in which the back detections should be zipped with the fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackOrder {
    Forward,
    Reversed,
}

impl PairingDistances {
    /// Reverse only when strictly better; exact ties keep forward order.
    pub fn recommended_order(&self) -> BackOrder {
        if self.reversed < self.forward {
            BackOrder::Reversed
        } else {
            BackOrder::Forward
        }
    }

    /// Whether automatic pairing is possible (equal, non-zero counts).
    pub fn is_auto_pairable(&self) -> bool {
        self.forward.is_finite()
    }
}

/// Compute both ordering distances from normalised centres.
///
/// Both are `+inf` unless the lists have equal, non-zero length.
pub fn centroid_distances(front: &[Point], back: &[Point]) -> PairingDistances {
    if front.is_empty() || front.len() != back.len() {
        return PairingDistances {
            forward: f64::INFINITY,
            reversed: f64::INFINITY,
        };
    }
    let forward = front.iter().zip(back).map(|(f, b)| f.distance(b)).sum();
    let reversed = front
        .iter()
        .zip(back.iter().rev())
        .map(|(f, b)| f.distance(b))
        .sum();
    PairingDistances { forward, reversed }
}

fn centers(candidates: &[Candidate]) -> Vec<Point> {
    candidates.iter().map(|c| c.card.center_norm).collect()
}

/// Whether a pair has a back detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Matched,
    Pending,
}

/// Association of a front detection with at most one back detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Pairing {
    pub pair_id: String,
    pub front: DetectionKey,
    pub back: Option<DetectionKey>,
}

impl Pairing {
    pub fn status(&self) -> PairStatus {
        if self.back.is_some() {
            PairStatus::Matched
        } else {
            PairStatus::Pending
        }
    }
}

fn pair_id(index: usize) -> String {
    format!("pair-{}", index + 1)
}

/// How the pairing step should proceed for a pair of candidate lists.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingMode {
    Auto(BackOrder),
    Manual,
}

/// Outcome of comparing the front and back candidate lists.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingPlan {
    pub distances: PairingDistances,
    pub mode: PairingMode,
}

impl PairingPlan {
    /// Decide between automatic and manual pairing.
    pub fn compute(front: &[Candidate], back: &[Candidate]) -> Self {
        let distances = centroid_distances(&centers(front), &centers(back));
        let mode = if distances.is_auto_pairable() {
            PairingMode::Auto(distances.recommended_order())
        } else {
            PairingMode::Manual
        };
        debug!(
            fronts = front.len(),
            backs = back.len(),
            forward = distances.forward,
            reversed = distances.reversed,
            ?mode,
            "pairing plan computed"
        );
        Self { distances, mode }
    }
}

/// Zip fronts with backs in the given order. `None` when the counts differ.
pub fn auto_pair(front: &[Candidate], back: &[Candidate], order: BackOrder) -> Option<Vec<Pairing>> {
    if front.len() != back.len() {
        return None;
    }
    if order == BackOrder::Reversed {
        info!("reversed back order detected; adjusting match order");
    }
    let backs: Vec<&Candidate> = match order {
        BackOrder::Forward => back.iter().collect(),
        BackOrder::Reversed => back.iter().rev().collect(),
    };
    Some(
        front
            .iter()
            .zip(backs)
            .enumerate()
            .map(|(i, (f, b))| Pairing {
                pair_id: pair_id(i),
                front: f.key.clone(),
                back: Some(b.key.clone()),
            })
            .collect(),
    )
}

/// Why a manual assignment was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignError {
    #[error("front detection {0} is not part of this pairing")]
    UnknownFront(String),

    #[error("back detection is already assigned to {0}")]
    BackTaken(String),
}

/// Sparse drag-and-drop assignment of backs to fronts.
///
/// Each front holds at most one back; a back held by one front is
/// unavailable to the others until it is unassigned.
#[derive(Debug, Clone, Default)]
pub struct ManualAssignment {
    fronts: Vec<DetectionKey>,
    backs: BTreeMap<usize, DetectionKey>,
}

impl ManualAssignment {
    pub fn new(fronts: Vec<DetectionKey>) -> Self {
        Self {
            fronts,
            backs: BTreeMap::new(),
        }
    }

    /// Start from a list of front candidates.
    pub fn from_candidates(front: &[Candidate]) -> Self {
        Self::new(front.iter().map(|c| c.key.clone()).collect())
    }

    fn front_index(&self, front: &DetectionKey) -> Option<usize> {
        self.fronts.iter().position(|f| f == front)
    }

    /// Assign `back` to `front`, replacing any back that front held.
    pub fn assign(&mut self, front: &DetectionKey, back: DetectionKey) -> Result<(), AssignError> {
        let index = self
            .front_index(front)
            .ok_or_else(|| AssignError::UnknownFront(front.detection_id.clone()))?;
        if let Some((&holder, _)) = self.backs.iter().find(|(i, b)| **b == back && **i != index) {
            return Err(AssignError::BackTaken(
                self.fronts[holder].detection_id.clone(),
            ));
        }
        self.backs.insert(index, back);
        Ok(())
    }

    /// Remove the back held by `front`, returning it.
    pub fn unassign(&mut self, front: &DetectionKey) -> Option<DetectionKey> {
        let index = self.front_index(front)?;
        self.backs.remove(&index)
    }

    pub fn back_for(&self, front: &DetectionKey) -> Option<&DetectionKey> {
        self.backs.get(&self.front_index(front)?)
    }

    pub fn is_available(&self, back: &DetectionKey) -> bool {
        !self.backs.values().any(|b| b == back)
    }

    /// One pairing per front, in front order; unassigned fronts are pending.
    pub fn pairings(&self) -> Vec<Pairing> {
        self.fronts
            .iter()
            .enumerate()
            .map(|(i, front)| Pairing {
                pair_id: pair_id(i),
                front: front.clone(),
                back: self.backs.get(&i).cloned(),
            })
            .collect()
    }
}

/// Initial suggestion for manual mode: each back, in order, goes to the
/// nearest front that has no back yet. Backs left over once every front is
/// taken stay unassigned.
pub fn nearest_neighbour_pair(front: &[Candidate], back: &[Candidate]) -> ManualAssignment {
    let mut assignment = ManualAssignment::from_candidates(front);
    let mut used = vec![false; front.len()];

    for b in back {
        let nearest = front
            .iter()
            .enumerate()
            .filter(|(i, _)| !used[*i])
            .map(|(i, f)| (i, f.card.center_norm.distance(&b.card.center_norm)))
            .min_by(|x, y| x.1.total_cmp(&y.1));
        let Some((index, _)) = nearest else {
            break;
        };
        match assignment.assign(&front[index].key, b.key.clone()) {
            Ok(()) => used[index] = true,
            Err(err) => debug!(
                back = %b.key.detection_id,
                error = %err,
                "nearest-neighbour suggestion skipped"
            ),
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, DetectedCard, FileId};

    fn candidates(file: &str, xs: &[f64]) -> Vec<Candidate> {
        let file_id = FileId::from(file);
        xs.iter()
            .enumerate()
            .map(|(i, &x)| {
                let mut card =
                    DetectedCard::from_rect(BoundingBox::new(0, 0, 10, 10), 100, 100);
                card.center_norm = Point::new(x, 0.5);
                Candidate {
                    key: DetectionKey::auto(&file_id, i),
                    card,
                }
            })
            .collect()
    }

    #[test]
    fn distances_are_non_negative_and_reverse_twice_restores_forward() {
        let front = vec![Point::new(0.1, 0.2), Point::new(0.5, 0.4), Point::new(0.9, 0.3)];
        let back = vec![Point::new(0.2, 0.2), Point::new(0.4, 0.6), Point::new(0.8, 0.1)];
        let d = centroid_distances(&front, &back);
        assert!(d.forward >= 0.0 && d.reversed >= 0.0);

        let mut twice = back.clone();
        twice.reverse();
        twice.reverse();
        assert_eq!(centroid_distances(&front, &twice).forward, d.forward);

        let mut once = back.clone();
        once.reverse();
        assert_eq!(centroid_distances(&front, &once).forward, d.reversed);
    }

    #[test]
    fn flipped_back_photo_is_reversed() {
        let front = candidates("front", &[0.2, 0.5, 0.8]);
        let back = candidates("back", &[0.21, 0.49, 0.79]);
        assert_eq!(
            PairingPlan::compute(&front, &back).mode,
            PairingMode::Auto(BackOrder::Forward)
        );

        let mirrored = candidates("back", &[0.8, 0.5, 0.2]);
        let plan = PairingPlan::compute(&front, &mirrored);
        assert_eq!(plan.mode, PairingMode::Auto(BackOrder::Reversed));
        assert!(plan.distances.reversed < plan.distances.forward);
    }

    #[test]
    fn reversed_order_pairs_first_front_with_last_back() {
        let front = candidates("front", &[0.1, 0.9]);
        let back = candidates("back", &[0.1, 0.9]);
        let pairs = auto_pair(&front, &back, BackOrder::Reversed).unwrap();
        assert_eq!(pairs[0].back.as_ref().unwrap().detection_id, "back-card-1");
        assert_eq!(pairs[1].back.as_ref().unwrap().detection_id, "back-card-0");
        assert!(pairs.iter().all(|p| p.status() == PairStatus::Matched));
    }

    #[test]
    fn exact_tie_prefers_forward() {
        // Symmetric layout: both orderings cost the same.
        let front = vec![Point::new(0.5, 0.2), Point::new(0.5, 0.8)];
        let back = vec![Point::new(0.5, 0.5), Point::new(0.5, 0.5)];
        let d = centroid_distances(&front, &back);
        assert_eq!(d.forward, d.reversed);
        assert_eq!(d.recommended_order(), BackOrder::Forward);
    }

    #[test]
    fn mismatched_counts_fall_back_to_manual() {
        let front = candidates("front", &[0.1, 0.5, 0.9]);
        let back = candidates("back", &[0.2, 0.8]);
        let plan = PairingPlan::compute(&front, &back);
        assert_eq!(plan.mode, PairingMode::Manual);
        assert!(plan.distances.forward.is_infinite());
        assert!(auto_pair(&front, &back, BackOrder::Forward).is_none());
    }

    #[test]
    fn empty_lists_are_not_auto_pairable() {
        let d = centroid_distances(&[], &[]);
        assert!(!d.is_auto_pairable());
    }

    #[test]
    fn manual_assignment_keeps_backs_unique() {
        let front = candidates("front", &[0.1, 0.5, 0.9]);
        let back = candidates("back", &[0.2, 0.8]);
        let mut assignment = ManualAssignment::from_candidates(&front);

        assignment.assign(&front[0].key, back[0].key.clone()).unwrap();
        assert!(!assignment.is_available(&back[0].key));
        assert_eq!(
            assignment.assign(&front[1].key, back[0].key.clone()),
            Err(AssignError::BackTaken("front-card-0".into()))
        );

        // Re-dropping onto the same front is fine.
        assignment.assign(&front[0].key, back[0].key.clone()).unwrap();

        let statuses: Vec<PairStatus> = assignment.pairings().iter().map(|p| p.status()).collect();
        assert_eq!(
            statuses,
            vec![PairStatus::Matched, PairStatus::Pending, PairStatus::Pending]
        );

        assert_eq!(assignment.unassign(&front[0].key), Some(back[0].key.clone()));
        assert!(assignment.is_available(&back[0].key));
    }

    #[test]
    fn unknown_front_is_refused() {
        let front = candidates("front", &[0.1]);
        let back = candidates("back", &[0.2]);
        let mut assignment = ManualAssignment::from_candidates(&front);
        let stray = DetectionKey::auto(&FileId::from("front"), 7);
        assert!(matches!(
            assignment.assign(&stray, back[0].key.clone()),
            Err(AssignError::UnknownFront(_))
        ));
    }

    #[test]
    fn nearest_neighbour_suggestion_uses_each_front_once() {
        let front = candidates("front", &[0.1, 0.5, 0.9]);
        let back = candidates("back", &[0.85, 0.15]);
        let assignment = nearest_neighbour_pair(&front, &back);
        let pairs = assignment.pairings();
        assert_eq!(pairs[0].back.as_ref().unwrap().detection_id, "back-card-1");
        assert_eq!(pairs[1].status(), PairStatus::Pending);
        assert_eq!(pairs[2].back.as_ref().unwrap().detection_id, "back-card-0");
    }

    #[test]
    fn repeated_back_is_suggested_once() {
        let front = candidates("front", &[0.1, 0.9]);
        let mut back = candidates("back", &[0.15]);
        back.push(back[0].clone());
        let pairs = nearest_neighbour_pair(&front, &back).pairings();
        assert_eq!(pairs[0].back.as_ref().unwrap().detection_id, "back-card-0");
        assert_eq!(pairs[1].status(), PairStatus::Pending);
    }
}
