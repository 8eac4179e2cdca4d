pub mod install;
pub mod setup;
pub mod uninstall;
