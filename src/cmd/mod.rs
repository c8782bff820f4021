//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                   |
//! |-----------------|-----------------------------------------------------|
//! | `simulate`      | `Simulate`, `Stages`                               |
//! | `config`        | `Config`                                           |

pub mod config;
pub mod simulate;

pub use config::cmd_config;
pub use simulate::{cmd_simulate, cmd_stages};
