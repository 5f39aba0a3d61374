use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;

use crate::StrongboxProblem;

use std::fs;

/// Where forma keeps its profiles on disk.
#[derive(Debug, Clone)]
pub struct Config {
    /// home is the path to the user's global config directory
    pub home: Utf8PathBuf,
}

impl Config {
    /// Uses `override_home` when given, otherwise the OS config directory.
    pub fn new(override_home: Option<&impl AsRef<Utf8Path>>) -> Result<Config, StrongboxProblem> {
        let home = match override_home {
            Some(home) => home.as_ref().to_path_buf(),
            None => {
                // Lin: /home/alice/.config/forma
                // Win: C:\Users\Alice\AppData\Roaming\Forma\Forma\config
                // Mac: /Users/Alice/Library/Application Support/com.Forma.Forma
                let dir = ProjectDirs::from("com", "Forma", "Forma")
                    .ok_or(StrongboxProblem::DefaultConfigDirNotFound)?
                    .config_dir()
                    .to_path_buf();
                Utf8PathBuf::try_from(dir)?
            }
        };

        Ok(Config { home })
    }

    /// Removes every profile and the config home itself
    pub fn clear(&self) -> Result<(), StrongboxProblem> {
        tracing::debug!(home_dir = ?self.home);
        fs::remove_dir_all(&self.home)
            .map_err(|_| StrongboxProblem::NoConfigFound(self.home.to_string()))
    }
}
