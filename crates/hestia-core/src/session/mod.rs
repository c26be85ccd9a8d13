//! Session persistence: the stored session entity and its repository trait.

pub mod model;
pub mod repository;

pub use model::Session;
pub use repository::SessionRepository;
