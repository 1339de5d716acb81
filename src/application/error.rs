use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    config::LoadError, domain::error::DomainError, infra::error::InfraError,
    presentation::views::RenderError,
};

/// Message shown to visitors for faults that carry no user-facing text.
pub const NON_RECOVERABLE_MESSAGE: &str = "A non-recoverable error occurred";

/// Collect the display text of an error and every error in its source chain.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            source,
            status,
            messages: error_chain(error),
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            public_message,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Faults caused by the request or the widget setup.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Sub-widget \"{0}\" is not available")]
    UnknownSubWidget(String),
    #[error("{0}")]
    Rejected(String),
}

/// Faults raised by the frontend product controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Rejected(String),
    #[error("product search failed: {0}")]
    Search(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Severity class of a fault; selects the translation catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Client,
    Controller,
    Domain,
    Unclassified,
}

impl FaultKind {
    pub fn catalog(self) -> &'static str {
        match self {
            FaultKind::Client | FaultKind::Unclassified => "client",
            FaultKind::Controller => "controller/frontend",
            FaultKind::Domain => "mshop",
        }
    }
}

/// Outcome of a failed composition, render or input-processing step.
#[derive(Debug, Error)]
pub enum FragmentFault {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Controller(ControllerError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{context}")]
    Unclassified {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl FragmentFault {
    pub fn unclassified(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Unclassified {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            FragmentFault::Client(_) => FaultKind::Client,
            FragmentFault::Controller(_) => FaultKind::Controller,
            FragmentFault::Domain(_) => FaultKind::Domain,
            FragmentFault::Unclassified { .. } => FaultKind::Unclassified,
        }
    }

    /// Untranslated message shown to the visitor.
    pub fn user_message(&self) -> String {
        match self {
            FragmentFault::Unclassified { .. } => NON_RECOVERABLE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ControllerError> for FragmentFault {
    fn from(error: ControllerError) -> Self {
        match error {
            ControllerError::Domain(inner) => FragmentFault::Domain(inner),
            other => FragmentFault::Controller(other),
        }
    }
}

impl From<RenderError> for FragmentFault {
    fn from(error: RenderError) -> Self {
        FragmentFault::unclassified("template rendering failed", error)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
