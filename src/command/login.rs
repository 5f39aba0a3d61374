use std::fmt;

use async_trait::async_trait;
use clap::Parser;
use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Input, Password, Select};
use forma_session::{
    ActiveSession, AdmissionOutcome, AdmissionView, DeviceChoice, DevicePicker, LoginCredentials,
};

use crate::cli::Forma;
use crate::command::FormaOutput;
use crate::env::FormaEnvKey;
use crate::Result;

#[derive(Parser)]
pub struct Login {
    /// Account user name. Prompted for when omitted
    #[arg(long, short = 'u')]
    username: Option<String>,

    /// Account password. Read from $FORMA_PASSWORD or prompted for when omitted
    #[arg(long, hide = true)]
    password: Option<String>,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Login {
    pub async fn run(&self, forma: &Forma) -> Result<FormaOutput> {
        let credentials = self.credentials(forma)?;
        let client = forma.client()?;
        let mut picker = TerminalPicker;
        match client.login(&credentials, &mut picker).await? {
            AdmissionOutcome::Admitted(credential) => Ok(FormaOutput::LoggedIn {
                profile: forma.profile_name()?,
                expires_at: credential.expires_at(),
            }),
            AdmissionOutcome::Abandoned => Ok(FormaOutput::LoginAbandoned),
        }
    }

    fn credentials(&self, forma: &Forma) -> Result<LoginCredentials> {
        let theme = ColorfulTheme::default();
        let username = match &self.username {
            Some(username) => username.clone(),
            None => Input::<String>::with_theme(&theme)
                .with_prompt("Username")
                .interact_text_on(&Term::stderr())?,
        };
        let password = match (&self.password, forma.env_store.get(FormaEnvKey::Password)?) {
            (Some(password), _) => password.clone(),
            (None, Some(password)) => password,
            (None, None) => Password::with_theme(&theme)
                .with_prompt("Password")
                .allow_empty_password(false)
                .interact_on(&Term::stderr())?,
        };
        Ok(LoginCredentials::new(username, password))
    }
}

/// Shows the device-limit dialog on the terminal
struct TerminalPicker;

#[async_trait]
impl DevicePicker for TerminalPicker {
    async fn choose(&mut self, view: AdmissionView<'_>) -> DeviceChoice {
        match view {
            AdmissionView::Devices {
                sessions,
                max_devices,
                current_devices,
                message,
                error,
            } => {
                eprintln!("{message} ({current_devices} of {max_devices} devices in use)");
                if let Some(error) = error {
                    eprintln!("{}", style(error).red());
                }
                let mut items: Vec<String> = sessions.iter().map(describe).collect();
                items.push("Cancel login".to_string());

                let selection = Select::new()
                    .with_prompt("? Choose a device to log out")
                    .items(&items)
                    .default(0)
                    .interact_on_opt(&Term::stderr());
                match selection {
                    Ok(Some(index)) if index < sessions.len() => {
                        DeviceChoice::Evict(sessions[index].session_id.clone())
                    }
                    Ok(_) => DeviceChoice::Dismiss,
                    Err(err) => {
                        tracing::debug!(%err, "device prompt failed");
                        DeviceChoice::Dismiss
                    }
                }
            }
            AdmissionView::NoActiveDevices { message } => {
                eprintln!("{message}");
                eprintln!("No active devices were listed, so there is nothing to log out.");
                DeviceChoice::Dismiss
            }
            AdmissionView::Evicting { .. } | AdmissionView::Closed => DeviceChoice::Dismiss,
        }
    }
}

fn describe(session: &ActiveSession) -> String {
    let mut line = session.session_id.clone();
    if let Some(ip) = &session.ip_address {
        line.push_str(&format!("  {ip}"));
    }
    if let Some(login_time) = &session.login_time {
        line.push_str(&format!("  signed in {login_time}"));
    }
    if let Some(expires_at) = &session.expires_at {
        line.push_str(&format!("  until {expires_at}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use forma_session::ActiveSession;
    use rstest::rstest;
    use speculoos::prelude::*;

    use super::describe;
    use crate::cli::{Command, Forma};

    #[rstest]
    #[case(
        ActiveSession {
            session_id: "s1".to_string(),
            ip_address: Some("10.0.0.7".to_string()),
            login_time: Some("2026-10-18T07:30:00Z".to_string()),
            expires_at: None,
        },
        "s1  10.0.0.7  signed in 2026-10-18T07:30:00Z"
    )]
    #[case(
        ActiveSession {
            session_id: "s2".to_string(),
            ip_address: None,
            login_time: None,
            expires_at: Some("2026-10-19T07:30:00Z".to_string()),
        },
        "s2  until 2026-10-19T07:30:00Z"
    )]
    fn it_describes_sessions(#[case] session: ActiveSession, #[case] expected: &str) {
        assert_that!(describe(&session).as_str()).is_equal_to(expected);
    }

    #[test]
    fn it_parses_username() {
        let forma = Forma::parse_from(["forma", "login", "-u", "qc-lead"]);
        let Command::Login(login) = forma.command else {
            panic!("expected login");
        };
        assert_that!(login.username).is_equal_to(Some("qc-lead".to_string()));
        assert_that!(login.password).is_none();
    }
}
