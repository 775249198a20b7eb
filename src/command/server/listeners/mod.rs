use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::command::server::error::Error;

pub mod insecure;

async fn build_listener(binding_address: SocketAddr) -> Result<TcpListener, Error> {
    TcpListener::bind(binding_address).await.map_err(|err| {
        Error::Initialization(format!("Failed to bind gate listener to {binding_address}: {err}"))
    })
}

async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), Error> {
    let (stream, remote_address) = listener.accept().await.map_err(|err| {
        Error::Execution(format!("Failed to accept incoming connection: {err}"))
    })?;

    debug!("Accepted connection from {remote_address}");
    Ok((stream, remote_address))
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn test_build_listener_ephemeral_port() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = build_listener(addr).await.unwrap();

        let local_addr = listener.local_addr().unwrap();
        assert_eq!(local_addr.ip(), addr.ip());
        assert_ne!(local_addr.port(), 0);
    }

    #[tokio::test]
    async fn test_build_listener_address_in_use() {
        let listener = build_listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let taken = listener.local_addr().unwrap();

        match build_listener(taken).await {
            Err(Error::Initialization(msg)) => {
                assert!(msg.starts_with("Failed to bind gate listener to"));
                assert!(msg.contains(&taken.to_string()));
            }
            _ => panic!("Expected Initialization error"),
        }
    }

    #[tokio::test]
    async fn test_accept_reports_remote_address() {
        let listener = build_listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let local_addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(local_addr).await.unwrap();
            stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
            stream.local_addr().unwrap()
        });

        let (_, remote_address) = accept(&listener).await.unwrap();
        let client_address = client.await.unwrap();

        assert_eq!(remote_address, client_address);
    }
}
