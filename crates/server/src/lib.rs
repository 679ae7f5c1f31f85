// droppy-server: the HTTP file server and its client resources.

pub mod files;
pub mod resources;
pub mod server;
