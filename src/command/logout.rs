use clap::Parser;
use strongbox::TokenStore;

use crate::cli::Forma;
use crate::command::FormaOutput;
use crate::Result;

#[derive(Debug, Parser)]
pub struct Logout {}

impl Logout {
    /// Only the local credential is forgotten; the server session stays
    /// active until it expires or is evicted from another device.
    pub fn run(&self, forma: &Forma) -> Result<FormaOutput> {
        let profile = forma.profile_name()?;
        tracing::info!(%profile, "logging out");
        forma.store()?.clear()?;
        Ok(FormaOutput::LoggedOut { profile })
    }
}
