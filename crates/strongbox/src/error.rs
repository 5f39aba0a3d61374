use std::io;

use thiserror::Error;

/// StrongboxProblem describes why a credential could not be loaded or saved.
#[derive(Error, Debug)]
pub enum StrongboxProblem {
    /// DefaultConfigDirNotFound occurs when the default OS config can't be found.
    #[error("Could not determine default OS configuration directory.")]
    DefaultConfigDirNotFound,

    /// NoConfigFound occurs when a configuration directory can't be found.
    #[error("Could not find a configuration directory at '{0}'.")]
    NoConfigFound(String),

    /// ProfileNotFound occurs when a profile with a specified name can't be found.
    #[error("There is no profile named '{0}'.")]
    ProfileNotFound(String),

    /// InvalidProfileName occurs when a profile name could escape the profiles directory.
    #[error("'{0}' is not a valid profile name. Names must not be empty, '.' or '..', or contain a path separator.")]
    InvalidProfileName(String),

    /// ExpiryOutOfRange occurs when a token lifetime puts its expiry outside the representable calendar.
    #[error("A token lifetime of {0} seconds is out of range.")]
    ExpiryOutOfRange(i64),

    /// PathNotUtf8 occurs when a file path is not valid UTF-8
    #[error(transparent)]
    PathNotUtf8(#[from] camino::FromPathBufError),

    /// TomlSerialization occurs when a credential can't be serialized to a String.
    #[error(transparent)]
    TomlSerialization(#[from] toml::ser::Error),

    /// TomlDeserialization occurs when a stored credential file can't be parsed.
    #[error(transparent)]
    TomlDeserialization(#[from] toml::de::Error),

    /// IoError occurs when any given std::io::Error arises.
    #[error(transparent)]
    IoError(#[from] io::Error),
}
