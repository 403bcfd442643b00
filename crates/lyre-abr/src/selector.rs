use lyre_core::Representation;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AbrMode, AbrOptions};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AbrReason {
    Initial,
    ManualOverride,
    UpSwitch,
    DownSwitch,
    AwaitingHeadroom,
    RepresentationUnavailable,
    AlreadyOptimal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AbrDecision {
    pub representation: Representation,
    pub reason: AbrReason,
    pub changed: bool,
}

/// Chooses the representation for the next segment.
///
/// Switches down as soon as the budget drops below the current bitrate and
/// switches up only after `up_switch_segments` consecutive decisions found
/// headroom for a higher representation.
#[derive(Clone, Debug)]
pub struct TrackSelector {
    cfg: AbrOptions,
    /// Consecutive decisions that qualified for an up-switch.
    up_streak: usize,
}

impl TrackSelector {
    #[must_use]
    pub fn new(cfg: AbrOptions) -> Self {
        Self { cfg, up_streak: 0 }
    }

    #[must_use]
    pub fn options(&self) -> &AbrOptions {
        &self.cfg
    }

    /// Forget accumulated up-switch headroom (e.g. after a seek).
    pub fn reset(&mut self) {
        self.up_streak = 0;
    }

    /// Decide which of `candidates` to load next.
    ///
    /// `current` is the representation the previous segment came from; it
    /// may no longer be among `candidates` after a manifest update. Returns
    /// `None` only when `candidates` is empty.
    #[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
    pub fn select(
        &mut self,
        candidates: &[Representation],
        estimate_bps: u64,
        current: Option<&Representation>,
    ) -> Option<AbrDecision> {
        if candidates.is_empty() {
            return None;
        }

        if let AbrMode::Manual(ref id) = self.cfg.mode {
            if let Some(pinned) = candidates.iter().find(|r| &r.id == id) {
                self.up_streak = 0;
                return Some(decision(pinned, AbrReason::ManualOverride, current));
            }
            debug!(id, "pinned representation unavailable, selecting automatically");
        }

        let budget = estimate_bps as f64 * self.cfg.safety_margin;
        let target = best_within_budget(candidates, budget, current);

        let Some(current) = current else {
            self.up_streak = 0;
            debug!(
                estimate_bps,
                budget,
                target = %target.id,
                "ABR select: initial"
            );
            return Some(decision(target, AbrReason::Initial, None));
        };

        if !candidates.iter().any(|r| r.id == current.id) {
            self.up_streak = 0;
            let fallback = nearest_available(candidates, budget, current);
            debug!(
                removed = %current.id,
                fallback = %fallback.id,
                "ABR select: current representation unavailable"
            );
            return Some(decision(
                fallback,
                AbrReason::RepresentationUnavailable,
                Some(current),
            ));
        }

        if target.bitrate_bps < current.bitrate_bps {
            self.up_streak = 0;
            debug!(
                from = %current.id,
                to = %target.id,
                estimate_bps,
                budget,
                "ABR select: down-switch"
            );
            return Some(decision(target, AbrReason::DownSwitch, Some(current)));
        }

        if target.bitrate_bps > current.bitrate_bps {
            self.up_streak += 1;
            if self.up_streak >= self.cfg.up_switch_segments.max(1) {
                self.up_streak = 0;
                debug!(
                    from = %current.id,
                    to = %target.id,
                    estimate_bps,
                    budget,
                    "ABR select: up-switch"
                );
                return Some(decision(target, AbrReason::UpSwitch, Some(current)));
            }
            debug!(
                streak = self.up_streak,
                required = self.cfg.up_switch_segments,
                candidate = %target.id,
                "ABR select: awaiting sustained headroom"
            );
            return Some(decision(current, AbrReason::AwaitingHeadroom, Some(current)));
        }

        self.up_streak = 0;
        Some(decision(current, AbrReason::AlreadyOptimal, Some(current)))
    }
}

fn decision(
    chosen: &Representation,
    reason: AbrReason,
    current: Option<&Representation>,
) -> AbrDecision {
    AbrDecision {
        representation: chosen.clone(),
        reason,
        changed: current.is_none_or(|c| c.id != chosen.id),
    }
}

/// Highest bitrate fitting `budget`, or the lowest bitrate when none fits.
#[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
fn best_within_budget<'a>(
    candidates: &'a [Representation],
    budget: f64,
    current: Option<&Representation>,
) -> &'a Representation {
    let bitrate = candidates
        .iter()
        .map(|r| r.bitrate_bps)
        .filter(|bw| (*bw as f64) <= budget)
        .max()
        .or_else(|| candidates.iter().map(|r| r.bitrate_bps).min())
        .unwrap_or_default();
    closest_with_bitrate(candidates, bitrate, current)
}

/// Replacement for a withdrawn representation: the bitrate nearest to it
/// among those fitting `budget` (or the lowest ones when none fits).
#[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
fn nearest_available<'a>(
    candidates: &'a [Representation],
    budget: f64,
    removed: &Representation,
) -> &'a Representation {
    let lowest = candidates
        .iter()
        .map(|r| r.bitrate_bps)
        .min()
        .unwrap_or_default();
    let bitrate = candidates
        .iter()
        .map(|r| r.bitrate_bps)
        .filter(|bw| (*bw as f64) <= budget || *bw == lowest)
        .min_by_key(|bw| (bw.abs_diff(removed.bitrate_bps), *bw))
        .unwrap_or(lowest);
    closest_with_bitrate(candidates, bitrate, Some(removed))
}

/// Among representations with `bitrate`, the one closest to `current`:
/// the same id, then the nearest frame height, then manifest order.
fn closest_with_bitrate<'a>(
    candidates: &'a [Representation],
    bitrate: u64,
    current: Option<&Representation>,
) -> &'a Representation {
    let mut group = candidates.iter().filter(|r| r.bitrate_bps == bitrate);
    let Some(first) = group.clone().next() else {
        return &candidates[0];
    };
    let Some(current) = current else {
        return first;
    };
    if let Some(same) = group.clone().find(|r| r.id == current.id) {
        return same;
    }
    let Some(height) = current.resolution.map(|r| r.height) else {
        return first;
    };
    group
        .min_by_key(|r| r.resolution.map_or(u32::MAX, |res| res.height.abs_diff(height)))
        .unwrap_or(first)
}
