pub mod api;
pub mod conditions;
pub mod config;
pub mod errors;
pub mod links;
pub mod logging;
pub mod pages;
pub mod pusher;
pub mod router;
pub mod server;
pub mod util;
