//! The `forma` command line client.
//!
//! Every command returns a [`FormaOutput`]; authenticated commands build a
//! [`forma_session::SessionClient`] over the profile's stored credential.

pub mod cli;
pub mod command;
pub mod env;

pub use cli::Forma;
pub use command::FormaOutput;

pub type Result<T> = anyhow::Result<T>;

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
