//! Gateway models

pub mod media;
pub mod session;

// Re-export for convenience
pub use media::{GalleryPage, MediaRecord};
pub use session::Session;
