use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::cli::OutputFormat;

/// Everything a forma command can print.
///
/// Commands return a `FormaOutput` instead of printing, so `main` decides
/// between human-readable and JSON output in one place. Informational lines
/// go to stderr; the data a script would want goes to stdout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormaOutput {
    LoggedIn {
        profile: String,
        expires_at: Option<DateTime<Utc>>,
    },
    LoginAbandoned,
    LoggedOut {
        profile: String,
    },
    Token {
        profile: String,
        /// masked, never the raw token
        token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        expired: bool,
    },
    Response {
        status: u16,
        body: String,
    },
    DeviceEvicted {
        session_id: String,
    },
    Profiles {
        profiles: Vec<String>,
    },
    ProfileDeleted {
        profile: String,
    },
}

impl FormaOutput {
    pub fn print(&self, format: OutputFormat) -> serde_json::Result<()> {
        match format {
            OutputFormat::Json => println!("{}", self.json()?),
            OutputFormat::Plain => self.print_plain(),
        }
        Ok(())
    }

    pub fn json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn print_plain(&self) {
        match self {
            FormaOutput::LoggedIn {
                profile,
                expires_at,
            } => {
                eprintln!(
                    "{} Signed in to profile '{profile}'.",
                    style("✓").green().bold()
                );
                if let Some(expires_at) = expires_at {
                    eprintln!("The session expires at {}.", format_time(expires_at));
                }
            }
            FormaOutput::LoginAbandoned => {
                eprintln!("Login cancelled. No device was logged out.");
            }
            FormaOutput::LoggedOut { profile } => {
                eprintln!("Forgot the credential stored for profile '{profile}'.");
            }
            FormaOutput::Token {
                profile,
                token,
                expires_at,
                expired,
            } => match token {
                None => eprintln!("Profile '{profile}' is not signed in."),
                Some(token) => {
                    eprint!("Access token: ");
                    println!("{token}");
                    match expires_at {
                        Some(at) if *expired => {
                            eprintln!("{} since {}", style("Expired").yellow(), format_time(at));
                        }
                        Some(at) => eprintln!("Expires at {}", format_time(at)),
                        None => eprintln!("No expiry was given for this token"),
                    }
                }
            },
            FormaOutput::Response { status, body } => {
                eprintln!("Status: {status}");
                println!("{body}");
            }
            FormaOutput::DeviceEvicted { session_id } => {
                eprintln!("Session {session_id} is logged out.");
            }
            FormaOutput::Profiles { profiles } => {
                if profiles.is_empty() {
                    eprintln!("No profiles found.");
                } else {
                    eprintln!("Profiles:");
                }

                for profile in profiles {
                    println!("{profile}");
                }
            }
            FormaOutput::ProfileDeleted { profile } => {
                eprintln!("Deleted profile '{profile}'.");
            }
        }
    }
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S %Z").to_string()
}
