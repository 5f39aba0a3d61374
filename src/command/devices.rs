use clap::{Parser, Subcommand};

use crate::cli::Forma;
use crate::command::FormaOutput;
use crate::Result;

#[derive(Debug, Parser)]
pub struct Devices {
    #[command(subcommand)]
    command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
enum DevicesCommand {
    /// Log out one of the account's active sessions. Does not need a
    /// signed-in profile
    Evict {
        /// Session id, as listed when a login hits the device limit
        session_id: String,
    },
}

impl Devices {
    pub async fn run(&self, forma: &Forma) -> Result<FormaOutput> {
        match &self.command {
            DevicesCommand::Evict { session_id } => {
                forma.client()?.evict(session_id).await?;
                Ok(FormaOutput::DeviceEvicted {
                    session_id: session_id.clone(),
                })
            }
        }
    }
}
