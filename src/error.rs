// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

/// The category of a failed call to a remote endpoint, decided once by the `Connector` or
/// `Connection` that saw the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The endpoint rejected the username or password.
    Authentication,
    /// The endpoint could not be reached or the connection dropped.
    Connectivity,
    /// The requested object does not exist.
    NotFound,
    Other,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FaultKind::Authentication => "authentication",
                FaultKind::Connectivity => "connectivity",
                FaultKind::NotFound => "not found",
                FaultKind::Other => "other",
            }
        )
    }
}

/// A failure reported by the remote management API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} fault: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no credentials registered for vCenter \"{server}\"")]
    CredentialNotFound { server: String },

    #[error("failed to log into vCenter \"{server}\": incorrect username or password: {reason}")]
    AuthenticationFault { server: String, reason: String },

    #[error("unable to connect to vCenter \"{server}\": {fault}")]
    Session { server: String, fault: Fault },

    #[error("request to vCenter \"{server}\" failed: {fault}")]
    Remote { server: String, fault: Fault },

    #[error("compute cluster \"{cluster}\" not found on vCenter \"{server}\"")]
    ClusterNotFound { server: String, cluster: String },

    #[error("network \"{network}\" not found at \"{path}\" on vCenter \"{server}\"")]
    NetworkNotFound {
        server: String,
        network: String,
        path: String,
    },

    #[error("network \"{network}\" is not available to resource pool \"{resource_pool}\"")]
    NetworkNotFoundInResourcePool {
        network: String,
        resource_pool: String,
    },

    #[error("zone \"{zone}\" used by machine pool \"{pool}\" is not a defined deployment zone")]
    UndefinedZone { zone: String, pool: String },

    #[error("deployment zone \"{zone}\" references undefined failure domain \"{failure_domain}\"")]
    UndefinedFailureDomain {
        zone: String,
        failure_domain: String,
    },

    #[error("failure domain \"{failure_domain}\" references undefined vCenter \"{server}\"")]
    UndefinedVCenter {
        failure_domain: String,
        server: String,
    },

    #[error("deployment zone \"{zone}\" does not allow control plane machines (pool \"{pool}\")")]
    ControlPlaneNotAllowed { zone: String, pool: String },

    #[error("{operation} on vCenter \"{server}\" did not complete within the deadline")]
    DeadlineExceeded { server: String, operation: String },

    #[error("{0}")]
    Config(String),
}

impl Error {
    /// The remote fault behind this error, if the error came from the endpoint.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Error::Session { fault, .. } | Error::Remote { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
