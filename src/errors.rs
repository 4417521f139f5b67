use crate::config::ConfigError;
use crate::render::broker::BrokerError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Device error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Browser session could not be created: {0}")]
    SessionCreate(#[source] anyhow::Error),

    #[error("Cache directory {} could not be created: {source}", .path.display())]
    CachePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compositor has been torn down")]
    TornDown,
}
