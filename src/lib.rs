pub mod config;
pub mod install;
pub mod logging;
pub mod release;
pub mod version;
