use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::StrongboxProblem;

/// The access/refresh token pair held by a [`TokenStore`](crate::TokenStore).
///
/// Both tokens are present or both are absent. Constructors fold a partial
/// pair into the empty credential, so holders never have to check for it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredCredential", into = "StoredCredential")]
pub struct Credential {
    tokens: Option<TokenPair>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, PartialEq, Eq)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl Credential {
    /// Builds a credential, discarding it entirely if either token is missing
    /// or empty.
    pub fn new(
        access_token: Option<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Credential {
        let access_token = access_token.filter(|token| !token.is_empty());
        let refresh_token = refresh_token.filter(|token| !token.is_empty());
        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Credential {
                tokens: Some(TokenPair {
                    access_token,
                    refresh_token,
                }),
                expires_at,
            },
            _ => Credential::empty(),
        }
    }

    /// The absent credential
    pub const fn empty() -> Credential {
        Credential {
            tokens: None,
            expires_at: None,
        }
    }

    /// Returns `true` when both tokens are held
    pub const fn is_present(&self) -> bool {
        self.tokens.is_some()
    }

    /// The access token, if a credential is held
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|pair| pair.access_token.as_str())
    }

    /// The refresh token, if a credential is held
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|pair| pair.refresh_token.as_str())
    }

    /// When the access token stops being valid, if the server said so
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns `true` once `now` has reached the known expiry.
    /// A credential without an expiry never reports itself expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_present() && self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns `true` when the known expiry falls within `buffer` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.is_present() && self.expires_at.is_some_and(|expires_at| now + buffer >= expires_at)
    }

    /// Applies a refresh response on top of this credential.
    ///
    /// The refresh token is replaced only when the server sent a new one;
    /// otherwise the one already held is carried over. `expires_in` is in
    /// seconds from `now` and must land on a representable instant.
    pub fn refreshed(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Credential, StrongboxProblem> {
        let refresh_token = refresh_token
            .filter(|token| !token.is_empty())
            .or_else(|| self.refresh_token().map(str::to_string));
        let expires_at = expires_in
            .map(|seconds| {
                expiry_after(now, seconds).ok_or(StrongboxProblem::ExpiryOutOfRange(seconds))
            })
            .transpose()?;
        Ok(Credential::new(Some(access_token), refresh_token, expires_at))
    }
}

/// The instant `seconds` after `now`, or `None` when it cannot be represented
pub fn expiry_after(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds).and_then(|delta| now.checked_add_signed(delta))
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token().map(mask_token))
            .field("refresh_token", &self.refresh_token().map(mask_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// On-disk layout. Kept flat so a hand-edited file with one token missing
/// still loads (as the empty credential).
#[derive(Default, Serialize, Deserialize)]
struct StoredCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl From<StoredCredential> for Credential {
    fn from(stored: StoredCredential) -> Self {
        Credential::new(stored.access_token, stored.refresh_token, stored.expires_at)
    }
}

impl From<Credential> for StoredCredential {
    fn from(credential: Credential) -> Self {
        match credential.tokens {
            Some(pair) => StoredCredential {
                access_token: Some(pair.access_token),
                refresh_token: Some(pair.refresh_token),
                expires_at: credential.expires_at,
            },
            None => StoredCredential::default(),
        }
    }
}

/// Masks all but the first and last four characters of a token
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}
