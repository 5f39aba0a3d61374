#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(missing_docs)]

//! Client-side credential storage for forma.
//!
//! A [`Credential`] is the access/refresh token pair plus its expiry. A
//! [`TokenStore`] owns exactly one of them and is the only thing allowed to
//! replace it. Two stores are provided: [`MemoryTokenStore`] for tests and
//! embedding, and [`ProfileTokenStore`] which persists to a named profile
//! under the config home.

mod config;
mod credential;
mod error;
mod profile;
mod store;

pub use config::Config;
pub use credential::{expiry_after, mask_token, Credential};
pub use error::StrongboxProblem;
pub use profile::{Profile, ProfileTokenStore};
pub use store::{MemoryTokenStore, TokenStore};
