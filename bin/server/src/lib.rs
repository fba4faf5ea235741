//! The runforge server: configuration, the ingress façade, and the
//! worker daemon wiring in `main`.

pub mod config;
pub mod ingress;

pub use config::ServerConfig;
pub use ingress::{
    CancelRunResponse, CreateRunInput, CreateRunResponse, Ingress, IngressError,
};
