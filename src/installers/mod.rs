//! Game installation collaborators (git repositories and packaged archives)

#[cfg(feature = "installer")]
mod archive;
mod git;

#[cfg(feature = "installer")]
pub use archive::{archive_name_from_url, extract_archive, fetch_archive, ArchiveKind, FetchedArchive};
pub use git::{GitCli, VersionControl};

#[cfg(all(test, feature = "installer"))]
pub(crate) use archive::tests::write_zip;

use std::sync::Arc;

// ============================================================================
// Progress Reporting
// ============================================================================

/// Optional `(stage, fraction)` progress sink for long-running installs
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<dyn Fn(&str, f32) + Send + Sync>>,
}

impl Progress {
    pub fn new(callback: impl Fn(&str, f32) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn report(&self, stage: &str, fraction: f32) {
        if let Some(callback) = &self.callback {
            callback(stage, fraction.clamp(0.0, 1.0));
        }
    }
}
