//! Runtime deprecation notices.
//!
//! `#[deprecated]` only warns at compile time. `Deprecation` covers the
//! callers that need a warning at run time, for example when an item is
//! reached through configuration or a scripting layer.

use std::borrow::Cow;

/// A deprecation notice for a named item.
///
/// # Examples
///
/// ```rust
/// use pacer_core::deprecation::Deprecation;
///
/// let notice = Deprecation::new("Client::sync_forever")
///     .use_instead("Client::sync")
///     .removal_version("2.0.0");
///
/// assert_eq!(
///     notice.message(),
///     "Client::sync_forever is deprecated. It will be removed in version 2.0.0. \
///      Please use 'Client::sync' instead."
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
    item: Cow<'static, str>,
    use_instead: Option<Cow<'static, str>>,
    removal_version: Option<Cow<'static, str>>,
}

impl Deprecation {
    /// Notice for `item`, usually a qualified function name.
    pub fn new(item: impl Into<Cow<'static, str>>) -> Self {
        Self {
            item: item.into(),
            use_instead: None,
            removal_version: None,
        }
    }

    /// Name the replacement callers should move to.
    pub fn use_instead(mut self, replacement: impl Into<Cow<'static, str>>) -> Self {
        self.use_instead = Some(replacement.into());
        self
    }

    /// Version in which the item will be removed.
    pub fn removal_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.removal_version = Some(version.into());
        self
    }

    /// The deprecated item.
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Human readable notice.
    pub fn message(&self) -> String {
        let mut parts = vec![format!("{} is deprecated.", self.item)];
        if let Some(version) = &self.removal_version {
            parts.push(format!("It will be removed in version {version}."));
        }
        if let Some(replacement) = &self.use_instead {
            parts.push(format!("Please use '{replacement}' instead."));
        }
        parts.join(" ")
    }

    /// Emit the notice as a `tracing` warning.
    pub fn warn(&self) {
        tracing::warn!(item = %self.item, "{}", self.message());
    }

    /// Warn, then run `f`.
    pub fn call<T>(&self, f: impl FnOnce() -> T) -> T {
        self.warn();
        f()
    }

    /// Wrap `f` so that every call warns first.
    pub fn wrap<F, T>(self, mut f: F) -> impl FnMut() -> T
    where
        F: FnMut() -> T,
    {
        move || {
            self.warn();
            f()
        }
    }
}
