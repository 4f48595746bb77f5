//! Hosting-service credentials, read once at startup.

/// Bearer token variable. Takes precedence over login/password.
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_LOGIN: &str = "GH_LOGIN";
pub const ENV_PASSWORD: &str = "GH_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { login: String, password: String },
    Anonymous,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = non_empty(ENV_TOKEN) {
            return Credentials::Token(token);
        }
        match (non_empty(ENV_LOGIN), non_empty(ENV_PASSWORD)) {
            (Some(login), Some(password)) => Credentials::Basic { login, password },
            _ => Credentials::Anonymous,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Token(***)"),
            Credentials::Basic { login, .. } => write!(f, "Basic({login}:***)"),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}
