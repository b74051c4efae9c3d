//! Locale port

use cm_domain::Language;

/// Supplies the language attached to outgoing requests.
pub trait LocaleSource: Send + Sync {
    /// Returns the currently selected language.
    fn current(&self) -> Language;
}

/// A locale source that always reports the same language.
#[derive(Debug, Clone, Default)]
pub struct FixedLocale(pub Language);

impl LocaleSource for FixedLocale {
    fn current(&self) -> Language {
        self.0.clone()
    }
}
