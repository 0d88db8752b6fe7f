//! Request handlers.

pub mod generate;
pub mod health;
pub mod search;
pub mod videos;

pub use generate::generate_video;
pub use health::health;
pub use search::search;
pub use videos::serve_video;
