//! Control plane server errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
