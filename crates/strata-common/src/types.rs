//! Domain primitive types used across the strata workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Unique identifier for a deployed service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(String);

impl ServiceId {
    /// Creates a new service ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random service ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a built image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(String);

impl ImageId {
    /// Creates a new image ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives an image ID from the image's top cache key.
    ///
    /// The first twelve hex characters are enough to be unambiguous in a
    /// local catalog while staying readable in table output.
    #[must_use]
    pub fn from_digest(digest: &Sha256Hash) -> Self {
        Self(digest.as_hex()[..12].to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SHA-256 digest used for content addressing and verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Creates a digest from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != crate::constants::SHA256_HEX_LENGTH
            || !hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(StrataError::Recipe {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Creates a digest from raw SHA-256 output bytes.
    #[must_use]
    pub fn from_digest_bytes(bytes: &[u8]) -> Self {
        use fmt::Write as _;
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    /// Returns the hex-encoded digest string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// The `module:attribute` pair locating the application object to serve.
///
/// Resolved once at launch and passed explicitly into the launcher; the
/// application object itself is opaque to strata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    module: String,
    attribute: String,
}

impl EntryPoint {
    /// Parses an entry point string of the form `module:attribute`.
    ///
    /// The module part may be a dotted path (`pkg.main`); the attribute is a
    /// single identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not exactly one `module:attribute`
    /// pair or either part is not a valid identifier path.
    pub fn parse(raw: &str) -> Result<Self> {
        let err = |message: String| StrataError::Recipe { message };
        let Some((module, attribute)) = raw.split_once(':') else {
            return Err(err(format!("entry point \"{raw}\" must be <module>:<attribute>")));
        };
        if module.is_empty() || attribute.is_empty() || attribute.contains(':') {
            return Err(err(format!("entry point \"{raw}\" must be <module>:<attribute>")));
        }
        if !module.split('.').all(is_identifier) {
            return Err(err(format!("invalid entry point module: \"{module}\"")));
        }
        if !is_identifier(attribute) {
            return Err(err(format!("invalid entry point attribute: \"{attribute}\"")));
        }
        Ok(Self {
            module: module.to_string(),
            attribute: attribute.to_string(),
        })
    }

    /// Returns the module path (left of the colon).
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the attribute name (right of the colon).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The fixed command a built image runs on start.
///
/// The port argument and the image's exposed-port metadata are derived from
/// the same field, so the two can never diverge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupCommand {
    /// Server executable name or path (e.g. `uvicorn`).
    pub program: String,
    /// Application object to serve.
    pub entry_point: EntryPoint,
    /// Port the server is told to listen on.
    pub port: u16,
}

impl StartupCommand {
    /// Returns the argument vector passed to the server executable.
    ///
    /// The host is always the wildcard address so traffic from outside the
    /// service's network namespace can reach it.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        vec![
            self.entry_point.to_string(),
            "--host".to_string(),
            crate::constants::WILDCARD_HOST.to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ]
    }
}

impl fmt::Display for StartupCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.argv().join(" "))
    }
}

/// Lifecycle state of a deployed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    /// Image built and rootfs assembled, process not yet started.
    Created,
    /// Server process is running.
    Running,
    /// Process was stopped deliberately.
    Stopped,
    /// Process exited with a failure or never started.
    Failed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
