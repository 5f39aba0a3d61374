use clap::{Parser, Subcommand};
use strongbox::Profile as StoredProfile;

use crate::cli::Forma;
use crate::command::FormaOutput;
use crate::Result;

#[derive(Debug, Parser)]
pub struct Profile {
    #[command(subcommand)]
    command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    /// List every profile with a stored credential
    List,

    /// Delete a profile and its stored credential
    Delete {
        /// Name of the profile to delete
        name: String,
    },
}

impl Profile {
    pub fn run(&self, forma: &Forma) -> Result<FormaOutput> {
        let config = forma.config()?;
        match &self.command {
            ProfileCommand::List => Ok(FormaOutput::Profiles {
                profiles: StoredProfile::list(&config)?,
            }),
            ProfileCommand::Delete { name } => {
                StoredProfile::delete(name, &config)?;
                Ok(FormaOutput::ProfileDeleted {
                    profile: name.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::TempDir;
    use clap::Parser;
    use speculoos::prelude::*;
    use strongbox::{Credential, TokenStore};

    use crate::cli::Forma;
    use crate::command::FormaOutput;
    use crate::env::FormaEnvKey;

    fn forma(args: &[&str], home: &TempDir) -> Forma {
        let mut forma = Forma::parse_from(args);
        forma
            .env_store
            .insert(FormaEnvKey::ConfigHome, home.path().to_str().unwrap());
        forma
    }

    fn sign_in(profile: &str, home: &TempDir) {
        forma(&["forma", "--profile", profile, "token"], home)
            .store()
            .unwrap()
            .set(Credential::new(
                Some("a1".to_string()),
                Some("r1".to_string()),
                None,
            ))
            .unwrap();
    }

    #[tokio::test]
    async fn it_lists_signed_in_profiles() {
        let home = TempDir::new().unwrap();
        sign_in("yard", &home);
        sign_in("default", &home);

        let output = forma(&["forma", "profile", "list"], &home).run().await.unwrap();

        assert_that!(output).is_equal_to(FormaOutput::Profiles {
            profiles: vec!["default".to_string(), "yard".to_string()],
        });
    }

    #[tokio::test]
    async fn it_deletes_a_profile() {
        let home = TempDir::new().unwrap();
        sign_in("yard", &home);

        forma(&["forma", "profile", "delete", "yard"], &home)
            .run()
            .await
            .unwrap();
        let output = forma(&["forma", "profile", "list"], &home).run().await.unwrap();

        assert_that!(output).is_equal_to(FormaOutput::Profiles { profiles: vec![] });
    }

    #[tokio::test]
    async fn deleting_a_missing_profile_fails() {
        let home = TempDir::new().unwrap();
        let result = forma(&["forma", "profile", "delete", "nobody"], &home)
            .run()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn deleting_leaves_directories_outside_the_profiles_alone() {
        let home = TempDir::new().unwrap();
        let outside = home.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();

        let result = forma(&["forma", "profile", "delete", "../outside"], &home)
            .run()
            .await;

        assert_that!(result).is_err();
        assert!(outside.exists());
    }
}
