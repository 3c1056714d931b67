//! Repositories for database operations

pub mod media;
pub mod session;

pub use media::MediaRepository;
pub use session::{SESSION_TTL_SECS, SessionRepository};
