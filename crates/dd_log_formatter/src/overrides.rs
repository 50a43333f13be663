//! Runtime-settable `env` and `version` values shared between the formatter and the application.

use std::{
    collections::HashMap,
    fmt,
    sync::{PoisonError, RwLock},
};

/// Environment variable consulted for `env` when no override is set.
pub const DD_ENV: &str = "DD_ENV";

/// Environment variable consulted for `version` when no override is set.
pub const DD_VERSION: &str = "DD_VERSION";

/// Read access to environment-style variables.
pub trait EnvLookup: Send + Sync {
    /// Returns the value of `key`, or `None` if it is unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment on every lookup, so changes take effect without a restart.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn var(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Overrides for the `env` and `version` attributes, shared through an [`Arc`][std::sync::Arc]
/// between the [`LogFormatter`][crate::LogFormatter] and whoever updates them.
///
/// An override, once set, wins over the [`DD_ENV`] / [`DD_VERSION`] fallbacks. Writes are
/// last-write-wins and become visible to the next formatted event.
pub struct ServiceTagOverrides {
    env: RwLock<Option<String>>,
    version: RwLock<Option<String>>,
    lookup: Box<dyn EnvLookup>,
}

impl ServiceTagOverrides {
    /// Creates an empty set of overrides that falls back to `lookup`.
    pub fn new(lookup: impl EnvLookup + 'static) -> Self {
        Self {
            env: RwLock::new(None),
            version: RwLock::new(None),
            lookup: Box::new(lookup),
        }
    }

    /// Sets or clears the `env` override.
    pub fn set_env(&self, env: Option<impl Into<String>>) {
        *self.env.write().unwrap_or_else(PoisonError::into_inner) = env.map(Into::into);
    }

    /// Sets or clears the `version` override.
    pub fn set_version(&self, version: Option<impl Into<String>>) {
        *self.version.write().unwrap_or_else(PoisonError::into_inner) = version.map(Into::into);
    }

    /// The effective `env`: the override if set, otherwise the [`DD_ENV`] variable.
    pub fn env(&self) -> Option<String> {
        self.resolve(&self.env, DD_ENV)
    }

    /// The effective `version`: the override if set, otherwise the [`DD_VERSION`] variable.
    pub fn version(&self) -> Option<String> {
        self.resolve(&self.version, DD_VERSION)
    }

    fn resolve(&self, slot: &RwLock<Option<String>>, fallback_key: &str) -> Option<String> {
        let current = slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        current.or_else(|| self.lookup.var(fallback_key))
    }
}

impl Default for ServiceTagOverrides {
    fn default() -> Self {
        Self::new(ProcessEnv)
    }
}

impl fmt::Debug for ServiceTagOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTagOverrides")
            .field("env", &self.env)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn fallbacks() -> HashMap<String, String> {
        HashMap::from([
            (DD_ENV.to_string(), "staging".to_string()),
            (DD_VERSION.to_string(), "1.2.3".to_string()),
        ])
    }

    #[test]
    fn falls_back_to_lookup_when_unset() {
        let overrides = ServiceTagOverrides::new(fallbacks());
        assert_eq!(overrides.env().as_deref(), Some("staging"));
        assert_eq!(overrides.version().as_deref(), Some("1.2.3"));
    }

    #[test]
    fn override_wins_over_fallback_and_can_be_cleared() {
        let overrides = ServiceTagOverrides::new(fallbacks());

        overrides.set_env(Some("prod"));
        assert_eq!(overrides.env().as_deref(), Some("prod"));
        assert_eq!(overrides.version().as_deref(), Some("1.2.3"));

        overrides.set_env(None::<String>);
        assert_eq!(overrides.env().as_deref(), Some("staging"));
    }

    #[test]
    fn absent_everywhere_is_none() {
        let overrides = ServiceTagOverrides::new(|_: &str| None::<String>);
        assert_eq!(overrides.env(), None);
        assert_eq!(overrides.version(), None);
    }

    #[test]
    fn closure_lookup_is_consulted_per_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let overrides = ServiceTagOverrides::new(move |key: &str| {
            counter.fetch_add(1, Ordering::Relaxed);
            (key == DD_VERSION).then(|| "9.9.9".to_string())
        });

        assert_eq!(overrides.version().as_deref(), Some("9.9.9"));
        assert_eq!(overrides.version().as_deref(), Some("9.9.9"));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn last_write_is_visible_across_threads() {
        let overrides = Arc::new(ServiceTagOverrides::new(|_: &str| None::<String>));

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let overrides = Arc::clone(&overrides);
                thread::spawn(move || overrides.set_version(Some(format!("v{i}"))))
            })
            .collect();
        for writer in writers {
            writer.join().ok();
        }

        let version = overrides.version();
        assert!(matches!(version.as_deref(), Some("v0" | "v1" | "v2" | "v3")));
    }
}
