use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use forma_http::{
    extend_headers::ExtendHeadersLayer, HttpService, HttpServiceConfig, HttpServiceFactory,
    ReqwestServiceFactory,
};
use forma_session::{SessionClient, SessionConfig, SessionListener};
use http::{HeaderMap, HeaderName, HeaderValue};
use strongbox::{Config, ProfileTokenStore, TokenStore};
use timber::Level;
use tower::Layer;
use url::Url;

use crate::command::{self, FormaOutput};
use crate::env::{FormaEnv, FormaEnvKey};
use crate::{Result, PKG_VERSION};

/// Profile used when neither `--profile` nor `$FORMA_PROFILE` names one
pub const DEFAULT_PROFILE: &str = "default";

/// API used when `$FORMA_API_URL` is unset
pub const DEFAULT_API_URL: &str = "https://api.forma.build";

const CLIENT_HEADER: &str = "x-forma-client";

#[derive(Debug, Parser)]
#[command(
    name = "forma",
    version,
    about = "
Forma - precast QC from the command line

To sign in, run:

    $ forma login

Requests made with `forma request` carry your session and renew it when
the server asks for it.
"
)]
pub struct Forma {
    #[command(subcommand)]
    pub command: Command,

    /// Specify forma's log level
    #[arg(long = "log", short = 'l', global = true, value_parser = timber::parse_level)]
    pub log_level: Option<Level>,

    /// Name of the credential profile to use [default: default]
    #[arg(long = "profile", global = true)]
    pub profile: Option<String>,

    /// How to print command output
    #[arg(long = "format", global = true, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    #[arg(skip)]
    pub env_store: FormaEnv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in, freeing up a device slot if the account is full
    Login(command::Login),

    /// Forget the credential stored for this profile
    Logout(command::Logout),

    /// Show the stored access token (masked) and when it expires
    Token(command::Token),

    /// Make an authenticated request against the Forma API
    Request(command::Request),

    /// Manage the devices signed in to your account
    Devices(command::Devices),

    /// Manage credential profiles
    Profile(command::Profile),
}

impl Forma {
    pub async fn run(&self) -> Result<FormaOutput> {
        match &self.command {
            Command::Login(command) => command.run(self).await,
            Command::Logout(command) => command.run(self),
            Command::Token(command) => command.run(self),
            Command::Request(command) => command.run(self).await,
            Command::Devices(command) => command.run(self).await,
            Command::Profile(command) => command.run(self),
        }
    }

    pub(crate) fn profile_name(&self) -> Result<String> {
        if let Some(profile) = &self.profile {
            return Ok(profile.clone());
        }
        Ok(self
            .env_store
            .get(FormaEnvKey::Profile)?
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string()))
    }

    pub(crate) fn config(&self) -> Result<Config> {
        let override_home: Option<Utf8PathBuf> = self
            .env_store
            .get(FormaEnvKey::ConfigHome)?
            .map(Utf8PathBuf::from);
        Ok(Config::new(override_home.as_ref())?)
    }

    pub(crate) fn store(&self) -> Result<Arc<ProfileTokenStore>> {
        let store = ProfileTokenStore::open(&self.profile_name()?, &self.config()?)?;
        Ok(Arc::new(store))
    }

    pub(crate) fn api_url(&self) -> Result<Url> {
        let url = self
            .env_store
            .get(FormaEnvKey::ApiUrl)?
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Url::parse(&url).map_err(|err| anyhow::anyhow!("'{url}' is not a valid API URL: {err}"))
    }

    pub(crate) fn client(&self) -> Result<SessionClient> {
        let transport = ReqwestServiceFactory::new(
            HttpServiceConfig::builder()
                .user_agent(format!("forma/{PKG_VERSION}"))
                .build(),
        )?
        .create()?;
        let http = HttpService::new(ExtendHeadersLayer::new(client_headers()).layer(transport));

        let store: Arc<dyn TokenStore> = self.store()?;
        let listener: Arc<dyn SessionListener> = Arc::new(TerminalListener);
        Ok(SessionClient::builder()
            .config(SessionConfig::builder().base_url(self.api_url()?).build())
            .http(http)
            .store(store)
            .listener(listener)
            .build())
    }
}

fn client_headers() -> HeaderMap {
    HeaderMap::from_iter([(
        HeaderName::from_static(CLIENT_HEADER),
        HeaderValue::from_static(concat!("forma-cli/", env!("CARGO_PKG_VERSION"))),
    )])
}

/// Tells the person at the terminal what happened to their session
struct TerminalListener;

impl SessionListener for TerminalListener {
    fn on_session_expired(&self) {
        eprintln!("Your session has expired. Run `forma login` to sign in again.");
    }

    fn on_device_evicted(&self, session_id: &str) {
        eprintln!("Logged out session {session_id}.");
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::TempDir;
    use camino::Utf8Path;
    use clap::Parser;
    use rstest::rstest;
    use speculoos::prelude::*;
    use timber::Level;

    use super::{Command, Forma, OutputFormat, DEFAULT_API_URL};
    use crate::env::FormaEnvKey;

    #[test]
    fn it_parses_global_flags_after_the_subcommand() {
        let forma = Forma::parse_from(["forma", "token", "--log", "DEBUG", "--profile", "site-b"]);
        assert_that!(forma.log_level).is_equal_to(Some(Level::DEBUG));
        assert_that!(forma.profile_name().unwrap().as_str()).is_equal_to("site-b");
        assert_that!(forma.command).matches(|command| matches!(command, Command::Token(_)));
    }

    #[rstest]
    #[case(&["forma", "logout"], OutputFormat::Plain)]
    #[case(&["forma", "--format", "json", "logout"], OutputFormat::Json)]
    fn it_parses_output_format(#[case] args: &[&str], #[case] expected: OutputFormat) {
        let forma = Forma::parse_from(args);
        assert_that!(forma.format).is_equal_to(expected);
    }

    #[test]
    fn it_rejects_unknown_log_levels() {
        assert!(Forma::try_parse_from(["forma", "--log", "loud", "token"]).is_err());
    }

    #[test]
    fn profile_falls_back_to_env_then_default() {
        let mut forma = Forma::parse_from(["forma", "token"]);
        assert_that!(forma.profile_name().unwrap().as_str()).is_equal_to("default");

        forma.env_store.insert(FormaEnvKey::Profile, "yard");
        assert_that!(forma.profile_name().unwrap().as_str()).is_equal_to("yard");
    }

    #[test]
    fn api_url_comes_from_env() {
        let mut forma = Forma::parse_from(["forma", "token"]);
        assert_that!(forma.api_url().unwrap().as_str()).starts_with(DEFAULT_API_URL);

        forma
            .env_store
            .insert(FormaEnvKey::ApiUrl, "http://localhost:4000/api");
        assert_that!(forma.api_url().unwrap().as_str()).is_equal_to("http://localhost:4000/api");

        forma.env_store.insert(FormaEnvKey::ApiUrl, "not a url");
        assert!(forma.api_url().is_err());
    }

    #[test]
    fn store_lives_under_the_config_home() {
        let home = TempDir::new().unwrap();
        let home = Utf8Path::from_path(home.path()).unwrap();
        let mut forma = Forma::parse_from(["forma", "--profile", "yard", "token"]);
        forma.env_store.insert(FormaEnvKey::ConfigHome, home.as_str());

        let store = forma.store().unwrap();

        assert_that!(store.path().starts_with(home.join("profiles").join("yard"))).is_true();
    }

    #[test]
    fn client_targets_the_configured_api() {
        let mut forma = Forma::parse_from(["forma", "token"]);
        let home = TempDir::new().unwrap();
        forma
            .env_store
            .insert(FormaEnvKey::ConfigHome, home.path().to_str().unwrap());
        forma
            .env_store
            .insert(FormaEnvKey::ApiUrl, "https://qc.example.com");

        let client = forma.client().unwrap();

        assert_that!(client.config().url("/projects").as_str())
            .is_equal_to("https://qc.example.com/projects");
    }
}
