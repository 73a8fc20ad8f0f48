//! Shared host secret for room control
//!
//! There is deliberately no per-user identity: a single password, injected at
//! startup, gates the host role for every room.

/// Host authentication configuration
#[derive(Debug, Clone)]
pub struct HostAuth {
    /// Shared host password (None = auth disabled)
    password: Option<String>,
}

impl HostAuth {
    /// Load the shared secret from the HOST_PASSWORD environment variable.
    pub fn from_env() -> Self {
        let password = std::env::var("HOST_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if password.is_some() {
            tracing::info!("Host authentication enabled");
        } else {
            tracing::warn!("Host authentication DISABLED - anyone can claim the host role!");
        }

        Self { password }
    }

    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }

    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Validate a submitted password against the shared secret.
    pub fn validate(&self, submitted: &str) -> bool {
        match &self.password {
            // Constant-time comparison to prevent timing attacks
            Some(p) => constant_time_eq(p.as_bytes(), submitted.as_bytes()),
            None => true, // Auth disabled, allow all
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
