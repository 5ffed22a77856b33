//! Production adapters for the processor's ports

mod artifacts;
mod download;
mod landing;
mod pipefy;

pub use artifacts::FsArtifactStore;
pub(crate) use artifacts::file_safe;
pub use download::{HttpFileFetcher, file_extension};
pub use landing::LandingExtractionClient;
pub use pipefy::{PipefyAttachmentResolver, attachment_url_from_field};
