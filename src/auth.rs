use std::fmt;

/// Username/secret pair used for HTTP basic auth against a directory service.
///
/// The secret is never printed by `Debug`, so credentials can sit inside
/// structs that get logged.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Resolves credentials from configured values, falling back to the
    /// given environment variables. Empty strings count as missing.
    pub fn resolve(
        username: Option<&str>,
        username_env: &str,
        secret: Option<&str>,
        secret_env: &str,
    ) -> Option<Self> {
        let username = non_empty(username).or_else(|| env_value(username_env))?;
        let secret = non_empty(secret).or_else(|| env_value(secret_env))?;
        Some(Self::new(username, secret))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(ToString::to_string)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
