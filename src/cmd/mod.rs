//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Command handled |
//! |-----------|-----------------|
//! | `serve`   | `Serve`         |
//! | `sync`    | `Sync`          |
//! | `init_db` | `InitDb`        |

pub mod init_db;
pub mod serve;
pub mod sync;

pub use init_db::cmd_init_db;
pub use serve::cmd_serve;
pub use sync::cmd_sync;
