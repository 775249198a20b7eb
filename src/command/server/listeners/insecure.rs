use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hyper_util::rt::TokioIo;
use tracing::{debug, info};

use crate::command::server::error::Error;
use crate::command::server::listeners::{accept, build_listener};
use crate::command::server::serve_request;
use crate::command::server::ServerContext;
use crate::configuration::ServerConfig;

/// Plain HTTP listener. The gate usually sits behind a reverse proxy terminating TLS.
pub struct InsecureListener {
    binding_address: SocketAddr,
    context: ArcSwap<ServerContext>,
    timeouts: ArcSwap<[Duration; 2]>,
}

fn timeouts(server_config: &ServerConfig) -> [Duration; 2] {
    [
        Duration::from_secs(server_config.query_timeout),
        Duration::from_secs(server_config.query_timeout_grace_period),
    ]
}

impl InsecureListener {
    pub fn new(server_config: &ServerConfig, context: ServerContext) -> Self {
        Self {
            binding_address: SocketAddr::new(server_config.bind_address, server_config.port),
            context: ArcSwap::from_pointee(context),
            timeouts: ArcSwap::from_pointee(timeouts(server_config)),
        }
    }

    /// Swap the context and timeouts used by new connections. The binding address is
    /// only read at startup.
    pub fn notify_config_change(&self, server_config: &ServerConfig, context: ServerContext) {
        self.context.store(Arc::new(context));
        self.timeouts.store(Arc::new(timeouts(server_config)));
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {}", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            debug!("Waiting for incoming connection");
            let (tcp, remote_address) = accept(&listener).await?;

            let stream = TokioIo::new(tcp);
            let context = Arc::clone(&self.context.load());
            let timeouts = Arc::clone(&self.timeouts.load());

            tokio::spawn(Box::pin(serve_request(
                stream,
                context,
                timeouts,
                remote_address,
            )));
        }
    }
}
