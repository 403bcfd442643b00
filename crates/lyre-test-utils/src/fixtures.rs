//! Ready-made manifests for tests.

use std::time::Duration;

use lyre_core::{Manifest, Representation, Segment};
use url::Url;

pub const KBPS: u64 = 1_000;

/// Fixed-duration segmented ladder served from `http://media.test/{name}/`.
pub struct LadderSpec<'a> {
    pub name: &'a str,
    pub bitrates: &'a [(&'a str, u64)],
    pub segments: usize,
    pub segment_duration: Duration,
}

impl LadderSpec<'_> {
    #[must_use]
    pub fn build(&self) -> Manifest {
        let representations = self
            .bitrates
            .iter()
            .map(|(id, bps)| Representation::new(*id, *bps))
            .collect();
        let (name, count, duration) = (self.name, self.segments, self.segment_duration);
        let segments = self
            .bitrates
            .iter()
            .flat_map(|(id, _)| {
                (0..count).map(move |index| Segment {
                    representation_id: (*id).to_string(),
                    index,
                    start: duration * index as u32,
                    duration,
                    uri: Url::parse(&format!("http://media.test/{name}/{id}/{index}.m4s"))
                        .unwrap(),
                    byte_range: None,
                })
            })
            .collect();
        Manifest::new(representations, segments).unwrap()
    }
}

/// Manifest location for `name`.
#[must_use]
pub fn manifest_url(name: &str) -> Url {
    Url::parse(&format!("http://media.test/{name}/manifest.mpd")).unwrap()
}

/// 500 / 1500 / 3000 kbps ladder, `segments` × 4 s.
#[must_use]
pub fn abr_ladder(segments: usize) -> Manifest {
    LadderSpec {
        name: "ladder",
        bitrates: &[
            ("500k", 500 * KBPS),
            ("1500k", 1_500 * KBPS),
            ("3000k", 3_000 * KBPS),
        ],
        segments,
        segment_duration: Duration::from_secs(4),
    }
    .build()
}

/// Single-representation content named `name`, `segments` × `secs` s.
#[must_use]
pub fn single_rate(name: &str, bitrate_bps: u64, segments: usize, secs: u64) -> Manifest {
    LadderSpec {
        name,
        bitrates: &[("main", bitrate_bps)],
        segments,
        segment_duration: Duration::from_secs(secs),
    }
    .build()
}
