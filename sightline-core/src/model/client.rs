use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity the server assigns to a signaling connection.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    /// `<name>_<8 hex>` when the client supplied a name, `client_<8 hex>` otherwise.
    pub fn generate(name: Option<&str>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let prefix = match name.map(str::trim) {
            Some(name) if !name.is_empty() => sanitize(name),
            _ => "client".to_owned(),
        };
        Self(format!("{}_{}", prefix, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used for placeholder display names.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
