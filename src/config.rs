use crate::error::ChatError;

pub const DEFAULT_PORT: u16 = 7712;
pub const DEFAULT_MAX_CLIENTS: usize = 1000;

/// Server configuration, assembled through `ServerConfig::builder()`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
    pub max_clients: usize,
}

/// The builder accumulates optional values and produces a validated config.
pub struct ServerConfigBuilder {
    addr: String,
    port: u16,
    max_clients: usize,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

impl ServerConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    pub fn build(self) -> Result<ServerConfig, ChatError> {
        if self.max_clients == 0 {
            return Err(ChatError::Config("max_clients must be at least 1".into()));
        }
        Ok(ServerConfig {
            addr: self.addr,
            port: self.port,
            max_clients: self.max_clients,
        })
    }
}
