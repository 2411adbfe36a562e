use crate::error::ChannelError;
use url::Url;

/// Location of a sightline server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secure: false,
        }
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// `{ws|wss}://{host}:{port}/ws[?client_name=<name>]`
    pub fn signaling_url(&self, client_name: Option<&str>) -> Result<Url, ChannelError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = self.base(scheme)?;
        url.set_path("/ws");
        if let Some(name) = client_name {
            url.query_pairs_mut().append_pair("client_name", name);
        }
        Ok(url)
    }

    pub fn http_url(&self, path: &str) -> Result<Url, ChannelError> {
        let scheme = if self.secure { "https" } else { "http" };
        let mut url = self.base(scheme)?;
        url.set_path(path);
        Ok(url)
    }

    fn base(&self, scheme: &str) -> Result<Url, ChannelError> {
        let raw = format!("{}://{}:{}", scheme, self.host, self.port);
        Url::parse(&raw).map_err(|e| ChannelError::InvalidEndpoint(format!("{raw}: {e}")))
    }
}
