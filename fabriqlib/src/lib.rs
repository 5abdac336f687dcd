#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_bool)]
#![allow(clippy::match_same_arms)]
// TODO: delete these after writing docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod core;
pub mod discover;
pub mod linter;
pub mod render;
pub mod site_context;
pub mod util;

pub use render::Renderers;

pub type Result<T> = eyre::Result<T>;

pub const USER_LOG: &str = "fabriq_user";
