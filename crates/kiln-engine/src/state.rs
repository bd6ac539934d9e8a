//! Shared state container threaded through every step of a run.
//!
//! Values are stored under typed keys: a [`StateKey<T>`] names a slot and
//! fixes the type stored in it, so a reader can never silently get back a
//! value of the wrong shape. The terminal error of a run has its own slot
//! (see [`StateBag::halt`]) instead of living under a magic key.
//!
//! All access is internally synchronized; the runner task and an external
//! canceller may touch the bag concurrently.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use parking_lot::{Mutex, RwLock};

use crate::error::{EngineError, Result, StepError};
use crate::step::StepAction;

/// A named, typed slot in a [`StateBag`].
///
/// Keys are usually declared as constants next to the steps that share
/// them:
///
/// ```
/// use kiln_engine::StateKey;
///
/// const INSTANCE_NAME: StateKey<String> = StateKey::new("instance_name");
/// ```
pub struct StateKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    /// Declare a key.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The key's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateKey")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

type Value = Box<dyn Any + Send + Sync>;

/// Concurrency-safe key/value context for one run.
#[derive(Default)]
pub struct StateBag {
    values: RwLock<HashMap<&'static str, Value>>,
    error: Mutex<Option<StepError>>,
}

impl StateBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put<T>(&self, key: StateKey<T>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.values.write().insert(key.name, Box::new(value));
    }

    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingState`] if nothing was written under the key,
    /// [`EngineError::TypeMismatch`] if the slot holds another type.
    pub fn get<T>(&self, key: StateKey<T>) -> Result<T>
    where
        T: Any + Clone + Send + Sync,
    {
        let values = self.values.read();
        let value = values
            .get(key.name)
            .ok_or(EngineError::MissingState(key.name))?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or(EngineError::TypeMismatch {
                key: key.name,
                expected: type_name::<T>(),
            })
    }

    /// Read the value under `key`, if present and of the right type.
    pub fn get_ok<T>(&self, key: StateKey<T>) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        self.get(key).ok()
    }

    /// Remove and return the value under `key`.
    ///
    /// A value of a different type is left in place.
    pub fn remove<T>(&self, key: StateKey<T>) -> Option<T>
    where
        T: Any + Send + Sync,
    {
        let mut values = self.values.write();
        if !values.get(key.name).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        values
            .remove(key.name)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Whether anything is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Names of all populated keys, sorted.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.values.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Record the run's terminal error.
    ///
    /// The first recorded error wins; later ones are logged and dropped so
    /// that follow-on failures never mask the primary cause.
    pub fn set_error(&self, error: StepError) {
        let mut slot = self.error.lock();
        if let Some(existing) = slot.as_ref() {
            tracing::debug!(
                kept = %existing,
                dropped = %error,
                "Run already has an error recorded"
            );
            return;
        }
        *slot = Some(error);
    }

    /// Record `error` as the failure of `step` and return [`StepAction::Halt`].
    pub fn halt(
        &self,
        step: &str,
        error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> StepAction {
        self.set_error(StepError::new(step, error));
        StepAction::Halt
    }

    /// Whether an error has been recorded.
    pub fn has_error(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Display form of the recorded error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.lock().as_ref().map(ToString::to_string)
    }

    /// Take the recorded error out of the bag.
    pub fn take_error(&self) -> Option<StepError> {
        self.error.lock().take()
    }
}

impl fmt::Debug for StateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBag")
            .field("keys", &self.keys())
            .field("error", &self.error_message())
            .finish()
    }
}
