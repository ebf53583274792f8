//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `serve`    | `Serve`          |
//! | `resolve`  | `Resolve`        |
//! | `pusher`   | `Pusher`         |
//! | `config`   | `Config`         |

pub mod config;
pub mod pusher;
pub mod resolve;
pub mod serve;

pub use config::cmd_config;
pub use pusher::{PusherSelection, cmd_pusher};
pub use resolve::cmd_resolve;
pub use serve::cmd_serve;
