use std::fs;
use std::sync::{PoisonError, RwLock};

use camino::Utf8PathBuf;

use crate::{Config, Credential, StrongboxProblem, TokenStore};

const CREDENTIALS_FILE: &str = ".credentials";

/// Named profiles under `<home>/profiles/<name>`.
pub struct Profile;

impl Profile {
    /// Checks that `name` names a single directory inside `<home>/profiles`
    pub fn validate_name(name: &str) -> Result<(), StrongboxProblem> {
        let escapes = name.is_empty() || name == "." || name == "..";
        if escapes || name.contains(['/', '\\']) {
            return Err(StrongboxProblem::InvalidProfileName(name.to_string()));
        }
        Ok(())
    }

    fn dir(name: &str, config: &Config) -> Result<Utf8PathBuf, StrongboxProblem> {
        Profile::validate_name(name)?;
        Ok(config.home.join("profiles").join(name))
    }

    fn credentials_path(name: &str, config: &Config) -> Result<Utf8PathBuf, StrongboxProblem> {
        Ok(Profile::dir(name, config)?.join(CREDENTIALS_FILE))
    }

    /// Lists profiles based on directories in `<home>/profiles`
    pub fn list(config: &Config) -> Result<Vec<String>, StrongboxProblem> {
        let profiles_dir = config.home.join("profiles");
        let mut profiles = vec![];

        // a missing profiles dir just means nobody has logged in yet
        let Ok(entries) = profiles_dir.read_dir_utf8() else {
            return Ok(profiles);
        };

        for entry in entries {
            let entry = entry?;
            if entry.path().is_dir() {
                tracing::debug!(profile = entry.file_name(), "detected profile");
                profiles.push(entry.file_name().to_string());
            }
        }
        profiles.sort();
        Ok(profiles)
    }

    /// Deletes a profile and everything stored in it
    pub fn delete(name: &str, config: &Config) -> Result<(), StrongboxProblem> {
        let dir = Profile::dir(name, config)?;
        if !dir.exists() {
            return Err(StrongboxProblem::ProfileNotFound(name.to_string()));
        }
        Ok(fs::remove_dir_all(dir)?)
    }
}

/// A [`TokenStore`] persisted as TOML in a profile directory.
///
/// The credential is read once at open and cached. Writes hold the cache's
/// write lock across the file replacement, so concurrent `get`s wait for
/// the new credential instead of observing a half-written one.
#[derive(Debug)]
pub struct ProfileTokenStore {
    path: Utf8PathBuf,
    current: RwLock<Credential>,
}

impl ProfileTokenStore {
    /// Opens the store for `profile`, loading any credential already saved
    pub fn open(profile: &str, config: &Config) -> Result<ProfileTokenStore, StrongboxProblem> {
        let path = Profile::credentials_path(profile, config)?;
        let credential = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            Credential::empty()
        };
        tracing::debug!(%path, present = credential.is_present(), "opened token store");
        Ok(ProfileTokenStore {
            path,
            current: RwLock::new(credential),
        })
    }

    /// Where the credential is persisted
    pub const fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    fn persist(&self, credential: &Credential) -> Result<(), StrongboxProblem> {
        if !credential.is_present() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = toml::to_string(credential)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, data)?;
        fs::rename(&staging, &self.path)?;
        tracing::debug!(path = %self.path, "wrote credential");
        Ok(())
    }
}

impl TokenStore for ProfileTokenStore {
    fn get(&self) -> Credential {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) -> Result<(), StrongboxProblem> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&credential)?;
        *current = credential;
        Ok(())
    }

    fn clear(&self) -> Result<(), StrongboxProblem> {
        self.set(Credential::empty())
    }
}
