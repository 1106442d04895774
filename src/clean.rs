//! Removal of tessellation artifacts from a batch of admin-area regions.
//!
//! Raw regions overlap in places: a cell cluster belonging to one area can end
//! up entirely inside another area's region. Two heuristics decide which of
//! those fragments are noise. Both compare each area only against the other
//! areas of the same (country, level) batch, never against itself.
//!
//! The cutoff heuristic assumes fragment sizes within one area are bimodal
//! (a few real landmasses, many small slivers). When they are not, it can keep
//! noise or drop real fragments; that behavior is relied upon by existing
//! output and is kept as is.

use std::fmt;

use geo::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{contains, difference, fill_holes, planar_area, FragmentIndex};

/// Which cleaning heuristic to run over a batch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CleanStrategy {
    /// Keep raw regions untouched
    None,
    /// Size-gap classification, subtract nested real fragments
    #[default]
    Cutoff,
    /// Drop every fragment nested inside another area
    Simple,
}

impl fmt::Display for CleanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanStrategy::None => write!(f, "none"),
            CleanStrategy::Cutoff => write!(f, "cutoff"),
            CleanStrategy::Simple => write!(f, "simple"),
        }
    }
}

/// Clean a batch of raw regions, one entry per area, preserving order.
pub fn clean(strategy: CleanStrategy, raw: Vec<MultiPolygon<f64>>) -> Vec<MultiPolygon<f64>> {
    match strategy {
        CleanStrategy::None => raw,
        CleanStrategy::Cutoff => clean_cutoff(&raw),
        CleanStrategy::Simple => clean_simple(&raw),
    }
}

fn fill_all(raw: &[MultiPolygon<f64>]) -> Vec<Vec<Polygon<f64>>> {
    raw.iter()
        .map(|region| region.0.iter().map(fill_holes).collect())
        .collect()
}

/// Fill holes, then drop every fragment lying within a filled fragment of
/// another area.
pub fn clean_simple(raw: &[MultiPolygon<f64>]) -> Vec<MultiPolygon<f64>> {
    let filled = fill_all(raw);
    let index = FragmentIndex::build(&filled);

    filled
        .iter()
        .enumerate()
        .map(|(area, fragments)| {
            let kept: Vec<Polygon<f64>> = fragments
                .iter()
                .filter(|p| !index.is_contained(p, |other| other != area))
                .cloned()
                .collect();
            if kept.len() != fragments.len() {
                debug!(
                    "Area #{}: dropped {} nested fragments",
                    area,
                    fragments.len() - kept.len()
                );
            }
            MultiPolygon::new(kept)
        })
        .collect()
}

/// Fragments of one area split by the size-gap heuristic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionCandidates {
    pub must_keep: Vec<Polygon<f64>>,
    pub can_delete: Vec<Polygon<f64>>,
}

/// Split fragments at the largest jump between consecutive sorted areas.
///
/// Fragments no larger than the area just below the jump can be deleted; the
/// rest must be kept. A lone fragment is always kept. Relative order is
/// preserved within both groups.
pub fn separate_deletion_candidates(fragments: &[Polygon<f64>]) -> DeletionCandidates {
    let mask = deletion_mask(fragments);
    let mut candidates = DeletionCandidates::default();
    for (fragment, deletable) in fragments.iter().zip(mask) {
        if deletable {
            candidates.can_delete.push(fragment.clone());
        } else {
            candidates.must_keep.push(fragment.clone());
        }
    }
    candidates
}

fn deletion_mask(fragments: &[Polygon<f64>]) -> Vec<bool> {
    if fragments.len() <= 1 {
        return vec![false; fragments.len()];
    }

    let areas: Vec<f64> = fragments.iter().map(planar_area).collect();
    let mut sorted = areas.clone();
    sorted.sort_by(f64::total_cmp);

    // First occurrence of the largest gap
    let mut gap_at = 0;
    let mut widest = f64::NEG_INFINITY;
    for (i, pair) in sorted.windows(2).enumerate() {
        let gap = pair[1] - pair[0];
        if gap > widest {
            widest = gap;
            gap_at = i;
        }
    }
    let cutoff = sorted[gap_at];

    areas.iter().map(|&a| a <= cutoff).collect()
}

/// Size-gap cleaning.
///
/// 1. Fill holes and split each area into must-keep and can-delete fragments.
/// 2. A must-keep fragment fully containing another area's must-keep
///    fragment gets it cut out as a hole.
/// 3. Can-delete fragments within any area's cleaned must-keep fragment are
///    dropped.
/// 4. Surviving can-delete fragments within another area's surviving
///    can-delete fragment are dropped; the rest are appended to their area.
pub fn clean_cutoff(raw: &[MultiPolygon<f64>]) -> Vec<MultiPolygon<f64>> {
    let (must_keep, can_delete): (Vec<_>, Vec<_>) = fill_all(raw)
        .iter()
        .map(|fragments| {
            let c = separate_deletion_candidates(fragments);
            (c.must_keep, c.can_delete)
        })
        .unzip();

    let keep_index = FragmentIndex::build(&must_keep);
    let mut cleaned: Vec<Vec<Polygon<f64>>> = must_keep
        .iter()
        .enumerate()
        .map(|(area, fragments)| {
            fragments
                .iter()
                .flat_map(|fragment| {
                    let mut piece = MultiPolygon::new(vec![fragment.clone()]);
                    for nested in keep_index.candidates_within(fragment) {
                        if nested.area != area && contains(&piece, &nested.polygon) {
                            debug!(
                                "Area #{}: cutting out fragment {} of area #{}",
                                area, nested.fragment, nested.area
                            );
                            piece = difference(&piece, &nested.polygon);
                        }
                    }
                    piece.0
                })
                .collect()
        })
        .collect();

    let cleaned_index = FragmentIndex::build(&cleaned);
    let first_pass: Vec<Vec<Polygon<f64>>> = can_delete
        .iter()
        .map(|fragments| {
            fragments
                .iter()
                .filter(|p| !cleaned_index.is_contained(p, |_| true))
                .cloned()
                .collect()
        })
        .collect();

    let candidate_index = FragmentIndex::build(&first_pass);
    for (area, fragments) in first_pass.iter().enumerate() {
        let survivors = fragments
            .iter()
            .filter(|p| !candidate_index.is_contained(p, |other| other != area))
            .cloned();
        cleaned[area].extend(survivors);
    }

    cleaned.into_iter().map(MultiPolygon::new).collect()
}
