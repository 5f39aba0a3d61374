use std::collections::HashMap;
use std::{env, fmt, io};

use heck::ToShoutySnakeCase;

/// FormaEnv lets tests mock environment variables, so they can run in
/// parallel without the developer's own environment leaking into them.
#[derive(Debug, Clone)]
pub struct FormaEnv {
    mock_store: Option<HashMap<String, String>>,
}

impl Default for FormaEnv {
    fn default() -> FormaEnv {
        FormaEnv::new()
    }
}

impl FormaEnv {
    /// creates a new environment variable store
    pub fn new() -> FormaEnv {
        let mock_store = if cfg!(test) {
            Some(HashMap::new())
        } else {
            None
        };

        FormaEnv { mock_store }
    }

    /// returns the value of the environment variable if it exists
    pub fn get(&self, key: FormaEnvKey) -> io::Result<Option<String>> {
        let key_str = key.to_string();
        tracing::trace!("checking for ${key_str}");
        let result = match &self.mock_store {
            Some(mock_store) => mock_store.get(&key_str).cloned(),
            None => match env::var(&key_str) {
                Ok(data) => Some(data),
                Err(env::VarError::NotPresent) => None,
                Err(env::VarError::NotUnicode(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("The value of the environment variable \"{key_str}\" is not valid Unicode."),
                    ));
                }
            },
        };

        match &result {
            Some(value) => tracing::debug!("read {}", debug_value(key, value)),
            None => tracing::trace!("could not find ${key_str}"),
        }

        Ok(result)
    }

    /// sets a variable in the mock store
    #[cfg(test)]
    pub fn insert(&mut self, key: FormaEnvKey, value: &str) {
        tracing::debug!("writing {}", debug_value(key, value));
        if let Some(mock_store) = &mut self.mock_store {
            mock_store.insert(key.to_string(), value.into());
        }
    }

    /// unsets a variable in the mock store
    #[cfg(test)]
    pub fn remove(&mut self, key: FormaEnvKey) {
        tracing::debug!("removing {key}");
        if let Some(mock_store) = &mut self.mock_store {
            mock_store.remove(&key.to_string());
        }
    }
}

fn debug_value(key: FormaEnvKey, value: &str) -> String {
    let value = match key {
        FormaEnvKey::Password => "*".repeat(value.chars().count()),
        _ => value.to_string(),
    };
    format!("environment variable ${key} = {value}")
}

/// Every environment variable forma reads.
///
/// Each one is the variant name in SHOUTY_SNAKE_CASE prefixed with `FORMA_`,
/// so `FormaEnvKey::ConfigHome` is read from `FORMA_CONFIG_HOME`.
#[derive(Debug, Copy, Clone)]
pub enum FormaEnvKey {
    ConfigHome,
    ApiUrl,
    Profile,
    Password,
}

impl fmt::Display for FormaEnvKey {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let dbg = format!("{self:?}").to_shouty_snake_case();
        write!(fmt, "FORMA_{dbg}")
    }
}
