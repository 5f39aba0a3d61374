use chrono::{DateTime, Utc};
use clap::Parser;
use strongbox::{mask_token, Credential, TokenStore};

use crate::cli::Forma;
use crate::command::FormaOutput;
use crate::Result;

#[derive(Debug, Parser)]
pub struct Token {}

impl Token {
    pub fn run(&self, forma: &Forma) -> Result<FormaOutput> {
        let credential = forma.store()?.get();
        Ok(summarize(forma.profile_name()?, &credential, Utc::now()))
    }
}

fn summarize(profile: String, credential: &Credential, now: DateTime<Utc>) -> FormaOutput {
    FormaOutput::Token {
        profile,
        token: credential.access_token().map(mask_token),
        expires_at: credential.expires_at(),
        expired: credential.is_expired(now),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use speculoos::prelude::*;
    use strongbox::Credential;

    use super::summarize;
    use crate::command::FormaOutput;

    #[test]
    fn it_masks_the_access_token() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let credential = Credential::new(
            Some("eyJhbGciOiJIUzI1NiJ9".to_string()),
            Some("r1".to_string()),
            Some(now - Duration::minutes(5)),
        );

        let output = summarize("default".to_string(), &credential, now);

        assert_that!(output).is_equal_to(FormaOutput::Token {
            profile: "default".to_string(),
            token: Some("eyJh************NiJ9".to_string()),
            expires_at: Some(now - Duration::minutes(5)),
            expired: true,
        });
    }

    #[test]
    fn a_signed_out_profile_has_no_token() {
        let output = summarize("yard".to_string(), &Credential::empty(), Utc::now());

        assert_that!(output).is_equal_to(FormaOutput::Token {
            profile: "yard".to_string(),
            token: None,
            expires_at: None,
            expired: false,
        });
    }
}
