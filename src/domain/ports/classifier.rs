//! Root-cause classifier port - the reflection extension point.

use async_trait::async_trait;

use crate::domain::models::RootCause;

/// Maps a failed candidate and its error output to a root-cause category.
///
/// A rule-based matcher and a delegated diagnostic call satisfy the same
/// contract. Errors are tolerated by the caller, which falls back to
/// [`RootCause::Unknown`].
#[async_trait]
pub trait RootCauseClassifier: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn classify(&self, code: &str, error: &str) -> anyhow::Result<RootCause>;
}
