use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, CoreResult},
    types::{Representation, Segment},
};

/// Slack allowed between neighbouring segment boundaries.
const BOUNDARY_TOLERANCE: Duration = Duration::from_millis(1);

/// Parsed, validated description of one piece of adaptive content.
///
/// Every representation is split into the same segment boundaries, so the
/// selector may switch quality at any segment index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestParts", into = "ManifestParts")]
pub struct Manifest {
    representations: Vec<Representation>,
    segments: HashMap<String, Vec<Segment>>,
    /// `(start, duration)` of each segment index, shared by all representations.
    boundaries: Vec<(Duration, Duration)>,
}

#[derive(Serialize, Deserialize)]
struct ManifestParts {
    representations: Vec<Representation>,
    segments: Vec<Segment>,
}

impl TryFrom<ManifestParts> for Manifest {
    type Error = CoreError;

    fn try_from(parts: ManifestParts) -> CoreResult<Self> {
        Self::new(parts.representations, parts.segments)
    }
}

impl From<Manifest> for ManifestParts {
    fn from(manifest: Manifest) -> Self {
        let mut segments: Vec<Segment> = manifest.segments.into_values().flatten().collect();
        segments.sort_by(|a, b| {
            a.representation_id
                .cmp(&b.representation_id)
                .then(a.index.cmp(&b.index))
        });
        Self {
            representations: manifest.representations,
            segments,
        }
    }
}

impl Manifest {
    /// Build a manifest, validating representations and segment layout.
    pub fn new(representations: Vec<Representation>, segments: Vec<Segment>) -> CoreResult<Self> {
        if representations.is_empty() {
            return Err(CoreError::invalid("manifest declares no representations"));
        }

        let mut ids = HashSet::new();
        for rep in &representations {
            if rep.id.is_empty() {
                return Err(CoreError::invalid("representation with empty id"));
            }
            if !ids.insert(rep.id.as_str()) {
                return Err(CoreError::invalid(format!(
                    "duplicate representation id `{}`",
                    rep.id
                )));
            }
            if rep.bitrate_bps == 0 {
                return Err(CoreError::invalid(format!(
                    "representation `{}` has zero bitrate",
                    rep.id
                )));
            }
        }

        let mut by_rep: HashMap<String, Vec<Segment>> = HashMap::new();
        for segment in segments {
            if !ids.contains(segment.representation_id.as_str()) {
                return Err(CoreError::invalid(format!(
                    "segment {} references unknown representation `{}`",
                    segment.index, segment.representation_id
                )));
            }
            by_rep
                .entry(segment.representation_id.clone())
                .or_default()
                .push(segment);
        }

        let mut boundaries: Option<Vec<(Duration, Duration)>> = None;
        for rep in &representations {
            let Some(list) = by_rep.get_mut(&rep.id) else {
                return Err(CoreError::invalid(format!(
                    "representation `{}` has no segments",
                    rep.id
                )));
            };
            list.sort_by_key(|s| s.start);
            for (index, segment) in list.iter_mut().enumerate() {
                segment.index = index;
            }

            let layout = segment_layout(&rep.id, list)?;
            match &boundaries {
                None => boundaries = Some(layout),
                Some(reference) => check_aligned(&rep.id, reference, &layout)?,
            }
        }

        Ok(Self {
            representations,
            segments: by_rep,
            boundaries: boundaries.unwrap_or_default(),
        })
    }

    /// Representations in manifest order.
    #[must_use]
    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    #[must_use]
    pub fn representation(&self, id: &str) -> Option<&Representation> {
        self.representations.iter().find(|r| r.id == id)
    }

    /// Segment `index` of representation `id`.
    #[must_use]
    pub fn segment(&self, id: &str, index: usize) -> Option<&Segment> {
        self.segments.get(id).and_then(|list| list.get(index))
    }

    /// Number of segments per representation.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.boundaries.len()
    }

    /// `(start, duration)` of segment `index`, shared by all representations.
    #[must_use]
    pub fn boundary(&self, index: usize) -> Option<(Duration, Duration)> {
        self.boundaries.get(index).copied()
    }

    /// Total media duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.boundaries
            .last()
            .map_or(Duration::ZERO, |(start, duration)| *start + *duration)
    }

    /// Index of the segment covering `position`, clamped to the last segment.
    ///
    /// Returns `None` when `position` is at or past the end.
    #[must_use]
    pub fn segment_index_at(&self, position: Duration) -> Option<usize> {
        if position >= self.duration() {
            return None;
        }
        let idx = self
            .boundaries
            .partition_point(|(start, _)| *start <= position);
        Some(idx.saturating_sub(1))
    }

    /// Whether `other` splits the content at the same boundaries.
    #[must_use]
    pub fn same_layout(&self, other: &Manifest) -> bool {
        self.boundaries.len() == other.boundaries.len()
            && self
                .boundaries
                .iter()
                .zip(&other.boundaries)
                .all(|(a, b)| close(a.0, b.0) && close(a.1, b.1))
    }
}

fn close(a: Duration, b: Duration) -> bool {
    a.abs_diff(b) <= BOUNDARY_TOLERANCE
}

fn segment_layout(id: &str, list: &[Segment]) -> CoreResult<Vec<(Duration, Duration)>> {
    let mut expected_start = Duration::ZERO;
    let mut layout = Vec::with_capacity(list.len());
    for segment in list {
        if segment.duration.is_zero() {
            return Err(CoreError::invalid(format!(
                "segment {} of `{id}` has zero duration",
                segment.index
            )));
        }
        if !close(segment.start, expected_start) {
            return Err(CoreError::invalid(format!(
                "segment {} of `{id}` starts at {:?}, expected {:?}",
                segment.index, segment.start, expected_start
            )));
        }
        layout.push((segment.start, segment.duration));
        expected_start = segment.end();
    }
    Ok(layout)
}

fn check_aligned(
    id: &str,
    reference: &[(Duration, Duration)],
    layout: &[(Duration, Duration)],
) -> CoreResult<()> {
    if reference.len() != layout.len() {
        return Err(CoreError::invalid(format!(
            "representation `{id}` has {} segments, expected {}",
            layout.len(),
            reference.len()
        )));
    }
    for (index, (a, b)) in reference.iter().zip(layout).enumerate() {
        if !close(a.0, b.0) || !close(a.1, b.1) {
            return Err(CoreError::invalid(format!(
                "segment {index} of `{id}` is not aligned with other representations"
            )));
        }
    }
    Ok(())
}
