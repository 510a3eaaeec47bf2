use super::*;

/// Raw-TCP Stratum listener. Other transports (HTTP poll, WebSocket,
/// TLS) front this one externally.
pub(crate) async fn run(hub: Arc<Hub>, cancel: CancellationToken) -> Result {
    let listener = TcpListener::bind(("0.0.0.0", hub.settings.listen_port))
        .await
        .with_context(|| format!("failed to bind stratum port {}", hub.settings.listen_port))?;

    info!("Stratum server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, socket_addr)) => {
                        debug!("Accepted connection from {socket_addr}");

                        let hub = hub.clone();
                        let cancel = cancel.clone();

                        task::spawn(async move {
                            let mut connection = Connection::new(hub, stream, socket_addr, cancel);
                            if let Err(err) = connection.serve().await {
                                warn!("Connection {socket_addr} closed with error: {err}");
                            }
                        });
                    }
                    Err(err) => warn!("Failed to accept connection: {err}"),
                }
            }
        }
    }

    info!("Shutting down stratum server");

    Ok(())
}
