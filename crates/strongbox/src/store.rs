use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};

use crate::{Credential, StrongboxProblem};

/// Owner of the process-wide [`Credential`].
///
/// Implementations make `set` and `clear` atomic with respect to `get`: a
/// reader sees either the old credential or the new one, never a mix.
pub trait TokenStore: Send + Sync + Debug {
    /// Returns a snapshot of the current credential
    fn get(&self) -> Credential;

    /// Replaces the current credential
    fn set(&self, credential: Credential) -> Result<(), StrongboxProblem>;

    /// Forgets the current credential
    fn clear(&self) -> Result<(), StrongboxProblem>;
}

/// A [`TokenStore`] that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    current: RwLock<Credential>,
}

impl MemoryTokenStore {
    /// Creates a store already holding `credential`
    pub const fn new(credential: Credential) -> MemoryTokenStore {
        MemoryTokenStore {
            current: RwLock::new(credential),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Credential {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Credential) -> Result<(), StrongboxProblem> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = credential;
        Ok(())
    }

    fn clear(&self) -> Result<(), StrongboxProblem> {
        self.set(Credential::empty())
    }
}
