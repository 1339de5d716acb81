//! Collects widget faults into visitor-facing error messages.

use tracing::error;

use crate::application::error::{FaultKind, FragmentFault, error_chain};
use crate::application::i18n::Translator;

/// Localized messages shown in the fragment's error area, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    messages: Vec<String>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Translate and append the fault's message.
    ///
    /// Unclassified faults are also logged with their full source chain;
    /// the visitor only sees the generic message.
    pub fn record(&mut self, fault: &FragmentFault, translator: &dyn Translator, locale: &str) {
        let kind = fault.kind();
        if kind == FaultKind::Unclassified {
            error!(
                fault = %fault,
                chain = ?error_chain(fault),
                "unclassified fault while rendering catalog fragment"
            );
        }

        let message = translator.translate(locale, kind.catalog(), &fault.user_message());
        self.push(message);
    }
}
