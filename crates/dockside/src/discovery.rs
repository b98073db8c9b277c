//! Candidate discovery.

use tracing::debug;

use crate::binding::DirectoryBinding;
use crate::engine::{ContainerHandle, EngineGateway, EngineResult, ListFilter};
use crate::image::ImageReference;

/// Running containers of `image` that already mount `binding`, in the order
/// the engine listed them.
pub async fn find_running(
    engine: &dyn EngineGateway,
    binding: &DirectoryBinding,
    image: &ImageReference,
) -> EngineResult<Vec<ContainerHandle>> {
    let listed = engine
        .list_containers(&ListFilter::volume(binding.host_path()))
        .await?;
    let total = listed.len();

    let candidates: Vec<ContainerHandle> = listed
        .into_iter()
        .filter(|c| image.matches(&c.image) && c.is_running())
        .collect();

    debug!(
        "{} of {} containers mounting {} are running {}",
        candidates.len(),
        total,
        binding.host_path(),
        image
    );
    Ok(candidates)
}
