//! HTTP check service used by the edge functions.

mod server;
mod service;

pub use server::HttpServer;
pub use service::{
    check_limit, resolve_identifier, router, CheckRequest, CheckResponse, ServiceState,
};
