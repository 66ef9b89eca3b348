use serde::{Deserialize, Serialize};

/// How a mirror client authenticates to a mirror server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMethod {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    #[default]
    Anonymous,
}

impl AuthMethod {
    pub fn from_api_key(key: Option<&str>) -> Self {
        match key {
            Some(key) if !key.is_empty() => Self::Bearer(key.to_string()),
            _ => Self::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Value for the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Bearer(token) => Some(format!("Bearer {token}")),
            Self::Anonymous => None,
        }
    }

    /// Whether a request carrying `header` satisfies this method.
    ///
    /// `Anonymous` accepts everything.
    pub fn accepts(&self, header: Option<&str>) -> bool {
        match self {
            Self::Anonymous => true,
            Self::Bearer(token) => header
                .and_then(|h| h.strip_prefix("Bearer "))
                .is_some_and(|given| given == token),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer-token",
            Self::Anonymous => "anonymous",
        }
    }
}
