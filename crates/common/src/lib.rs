// droppy-common: paths, configuration and user storage shared by the droppy crates

pub mod config;
pub mod fs;
pub mod paths;
pub mod users;
