pub mod collections;
pub mod config;
pub mod engine;
pub mod library;
pub mod plugins;
pub mod post;

pub use collections::SiteCollections;
pub use config::SiteConfig;
pub use library::Library;
pub use post::{Post, PostKey};
