pub mod commands;
pub mod error;
pub mod helpers;
pub mod lifecycle;
pub mod utils;

pub use error::InstallError;
