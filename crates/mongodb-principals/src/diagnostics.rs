//! Converting errors into diagnostics reported back to the host.
use std::error::Error;

use crate::{
    client, config,
    merge::MergeError,
    principal::{self, Operation},
    users,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Severity {
    Error,
}

/// A problem reported to the host, optionally pointing at the attribute
/// that caused it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<String>,
}

/// An error that can be reported as a [`Diagnostic`].
pub trait DiagnosticError: Error {
    /// A short, stable category of the error.
    fn summary(&self) -> &'static str;

    /// The attribute the error is about, if any.
    fn attribute(&self) -> Option<&'static str> {
        None
    }

    fn to_diagnostic(&self) -> Diagnostic
    where
        Self: Sized,
    {
        Diagnostic {
            severity: Severity::Error,
            summary: self.summary().to_owned(),
            detail: full_message(self),
            attribute: self.attribute().map(str::to_owned),
        }
    }
}

/// Walks the whole error chain, so that the detail carries the full reason
/// for the error.
fn full_message(error: &dyn Error) -> String {
    std::iter::successors(Some(error), |&error| error.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

impl DiagnosticError for principal::Error {
    fn summary(&self) -> &'static str {
        match self {
            Self::ResolveIdentity { .. } | Self::InvalidAttribute { .. } => "Invalid Attribute",
            Self::InvalidPrivileges { .. } => "Invalid Privileges",
            Self::Connect { .. } => "Connection Error",
            Self::Command {
                operation: Operation::Read,
                ..
            } => "Read Error",
            Self::Command { .. } => "Client Error",
            Self::Merge { .. } => "Unexpected Server Response",
        }
    }

    fn attribute(&self) -> Option<&'static str> {
        match self {
            Self::ResolveIdentity { .. } => Some("id"),
            Self::InvalidAttribute { attribute, .. } => Some(*attribute),
            Self::InvalidPrivileges { .. }
            | Self::Merge {
                source: MergeError::DecodePrivilege { .. },
                ..
            } => Some("privileges"),
            Self::Merge {
                source:
                    MergeError::RoleReferenceCountMismatch { .. }
                    | MergeError::RoleReferenceMismatch { .. },
                ..
            } => Some("roles"),
            Self::Connect { .. } | Self::Command { .. } => None,
        }
    }
}

impl DiagnosticError for config::Error {
    fn summary(&self) -> &'static str {
        "Invalid Provider Configuration"
    }

    fn attribute(&self) -> Option<&'static str> {
        match self {
            Self::MissingUri | Self::MissingUriScheme | Self::UnsupportedUriScheme { .. } => {
                Some("uri")
            }
            Self::PasswordWithoutUsername => Some("username"),
            Self::ParseTimeout { .. } => Some("timeout"),
        }
    }
}

impl DiagnosticError for users::Error {
    fn summary(&self) -> &'static str {
        match self {
            Self::InvalidDatabase { .. } => "Invalid Attribute",
            Self::Connect { .. } => "Connection Error",
            Self::ListUsers { .. } => "Client Error",
        }
    }

    fn attribute(&self) -> Option<&'static str> {
        match self {
            Self::InvalidDatabase { .. } => Some("db"),
            Self::Connect { .. } | Self::ListUsers { .. } => None,
        }
    }
}

impl DiagnosticError for client::Error {
    fn summary(&self) -> &'static str {
        "Client Error"
    }
}
