// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session identities for JVM launches.
//!
//! Each JVM writes its coverage snapshot into a shared destination directory, so the snapshot
//! file name must be unique among concurrently running JVMs. A session ID combines a readable
//! label with a number that's unique among running processes on this host: a TCP port assigned by
//! the OS. An allocated session keeps its port bound until the last clone of it is dropped, so the
//! OS can't hand the same port to another session while the launch is running.

use std::{
    fmt,
    hash::{Hash, Hasher},
    io,
    net::TcpListener,
    sync::Arc,
};

/// Identifies one JVM launch.
///
/// Equality and hashing only consider the label and the port.
#[derive(Clone, Debug)]
pub struct SessionId {
    label: String,
    port: u16,
    reservation: Option<Arc<TcpListener>>,
}

impl SessionId {
    /// Creates a session ID from a label and a unique number.
    ///
    /// Characters other than ASCII alphanumerics, `-`, `_` and `.` are replaced in the label, since
    /// it becomes part of a file name and of the coverage agent argument.
    pub fn new(label: impl AsRef<str>, port: u16) -> Self {
        let label = label
            .as_ref()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self {
            label,
            port,
            reservation: None,
        }
    }

    /// Allocates a session ID, using a port the OS considers free.
    ///
    /// The port stays bound for as long as the session ID or any of its clones is alive.
    pub fn allocate(label: impl AsRef<str>) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            reservation: Some(Arc::new(listener)),
            ..Self::new(label, port)
        })
    }

    /// Returns true if this session holds its port until it's dropped.
    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    /// Returns the label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the unique number.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.port == other.port
    }
}

impl Eq for SessionId {}

impl Hash for SessionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.port)
        } else {
            write!(f, "{}.{}", self.label, self.port)
        }
    }
}
