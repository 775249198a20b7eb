pub mod auth;
mod command;
mod error;
mod http_server;
mod listeners;
mod request_ext;
mod router;
mod server_context;
mod session;

pub use command::{Command, Options};
pub use error::Error;
pub use http_server::serve_request;
pub use server_context::ServerContext;
