use std::{collections::HashMap, slice};

use async_trait::async_trait;
use lyre_core::Manifest;
use url::Url;

use crate::error::PlayError;

/// Provides parsed manifests. Parsing the manifest format is up to the
/// implementation.
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn load(&self, uri: &Url) -> Result<Manifest, PlayError>;
}

/// What a session plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaSource {
    /// One adaptive manifest.
    Adaptive(Url),
    /// Several manifests played back to back, one window each.
    Concatenating(Vec<Url>),
}

impl MediaSource {
    #[must_use]
    pub fn uris(&self) -> &[Url] {
        match self {
            Self::Adaptive(uri) => slice::from_ref(uri),
            Self::Concatenating(uris) => uris,
        }
    }
}

impl From<Url> for MediaSource {
    fn from(uri: Url) -> Self {
        Self::Adaptive(uri)
    }
}

impl From<Vec<Url>> for MediaSource {
    fn from(uris: Vec<Url>) -> Self {
        Self::Concatenating(uris)
    }
}

/// Manifests known up front, keyed by location.
#[derive(Clone, Debug, Default)]
pub struct StaticManifests {
    manifests: HashMap<Url, Manifest>,
}

impl StaticManifests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, uri: Url, manifest: Manifest) -> Self {
        self.insert(uri, manifest);
        self
    }

    pub fn insert(&mut self, uri: Url, manifest: Manifest) {
        self.manifests.insert(uri, manifest);
    }
}

#[async_trait]
impl ManifestLoader for StaticManifests {
    async fn load(&self, uri: &Url) -> Result<Manifest, PlayError> {
        self.manifests
            .get(uri)
            .cloned()
            .ok_or_else(|| PlayError::ManifestLoad {
                uri: uri.clone(),
                reason: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use lyre_test_utils::{abr_ladder, manifest_url};

    use super::*;

    #[test]
    fn adaptive_source_has_one_uri() {
        let source = MediaSource::from(manifest_url("a"));
        assert_eq!(source.uris(), &[manifest_url("a")]);
    }

    #[tokio::test]
    async fn static_manifests_resolve_known_uris() {
        let loader = StaticManifests::new().with(manifest_url("a"), abr_ladder(3));

        let manifest = loader.load(&manifest_url("a")).await.unwrap();
        assert_eq!(manifest.segment_count(), 3);

        let err = loader.load(&manifest_url("b")).await.unwrap_err();
        assert!(matches!(err, PlayError::ManifestLoad { .. }));
    }
}
