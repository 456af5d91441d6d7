//! Credential handling for the inference servers.
//!
//! The local servers accept an optional bearer token (`HF_TOKEN`). When
//! present it is wrapped immediately so it cannot reach a log line:
//!
//! - `Debug` and `Display` print `[REDACTED]`
//! - the value is zeroed on drop via `secrecy`
//! - the raw value is only reachable through [`ApiCredential::expose`]
//!
//! ```ignore
//! let token = ApiCredential::from_lookup(HF_TOKEN_ENV, "Hugging Face token", lookup);
//! if let Some(token) = &token {
//!     request = request.bearer_auth(token.expose());
//! }
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Environment variable holding the inference server token.
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored bearer credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Create a new credential from a string value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load an optional credential through a variable lookup.
    ///
    /// Unset and blank values both yield `None`: the servers run without
    /// authentication unless a token is configured.
    pub fn from_lookup<F>(env_var: &str, name: &'static str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(env_var)
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v.trim(), CredentialSource::Environment, name))
    }

    /// Expose the raw value. Call only at the point of use.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
