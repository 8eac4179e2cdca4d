pub mod config;
pub mod daemon;
pub mod logging;
pub mod path;
pub mod pm2;
pub mod preconditions;
pub mod sid;
