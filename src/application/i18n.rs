//! Translation port used for visitor-facing messages.

/// Looks up `message` in a translation catalog for `locale`.
///
/// Implementations fall back to the message itself when no translation
/// exists.
pub trait Translator: Send + Sync {
    fn translate(&self, locale: &str, catalog: &str, message: &str) -> String;
}

/// Translator that returns every message unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untranslated;

impl Translator for Untranslated {
    fn translate(&self, _locale: &str, _catalog: &str, message: &str) -> String {
        message.to_string()
    }
}
