use tracing::{debug, warn};

use super::scaffold::{demo_package_path, work_meta_path};
use crate::errors::HostingError;
use crate::hosting::RepoApi;

/// Highest numeric suffix tried before giving up on finding a free slug.
pub const MAX_SLUG_SUFFIX: u32 = 9;

/// `base`, `base-2`, … `base-9`.
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string())
        .chain((2..=MAX_SLUG_SUFFIX).map(move |n| format!("{base}-{n}")))
}

/// First candidate slug under `author_id` whose work meta and demo package
/// are both absent on `git_ref`. When every candidate is taken the last one
/// is returned and the publish overwrites it.
pub async fn resolve_work_slug(
    api: &RepoApi,
    author_id: &str,
    base_slug: &str,
    git_ref: &str,
) -> Result<String, HostingError> {
    let mut last = base_slug.to_string();
    for candidate in slug_candidates(base_slug) {
        let taken = api
            .path_exists(&work_meta_path(author_id, &candidate), git_ref)
            .await?
            || api
                .path_exists(&demo_package_path(author_id, &candidate), git_ref)
                .await?;
        if !taken {
            debug!(slug = %candidate, "Resolved free work slug");
            return Ok(candidate);
        }
        last = candidate;
    }
    warn!(base = base_slug, slug = %last, "No free work slug, reusing the last candidate");
    Ok(last)
}
