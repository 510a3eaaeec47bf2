use super::*;

/// Single long-running task keeping the registry fed: polls the daemon
/// on the prevhash interval, refreshes the mempool view on the merkle
/// interval, forces fresh work on the force interval, and lets the ZMQ
/// blocknotify short-circuit the whole wait. RPC failures back off
/// exponentially and never reach miners.
pub(crate) struct BlockUpdater {
    hub: Arc<Hub>,
    cancel: CancellationToken,
}

impl BlockUpdater {
    pub(crate) fn new(hub: Arc<Hub>, cancel: CancellationToken) -> Self {
        Self { hub, cancel }
    }

    pub(crate) async fn run(self) {
        let settings = self.hub.settings.clone();

        let mut zmq = match settings.zmq_block_notifications.as_deref() {
            Some(endpoint) => match Zmq::connect(endpoint).await {
                Ok(socket) => Some(socket),
                Err(err) => {
                    warn!("Continuing without blocknotify: {err}");
                    None
                }
            },
            None => None,
        };

        let mut backoff = 1;
        let mut last_refresh = self.hub.clock.now();
        let mut last_force = self.hub.clock.now();

        loop {
            let mut notified = false;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(Duration::from_secs(settings.prevhash_refresh_interval)) => {}
                received = next_blocknotify(&mut zmq) => {
                    match received {
                        Ok(blockhash) => {
                            info!("Blocknotify: new tip {blockhash}");
                            notified = true;
                        }
                        Err(err) => {
                            warn!("ZMQ subscription failed, falling back to polling: {err}");
                            zmq = None;
                        }
                    }
                }
            }

            match self.hub.daemon.get_block_template(settings.chain).await {
                Ok(template) => {
                    backoff = 1;

                    let now = self.hub.clock.now();

                    let tip_changed = self.hub.registry.lock().active_previous_hash()
                        != Some(template.previous_block_hash);
                    let force = now.saturating_sub(last_force) >= settings.force_refresh_interval;
                    let merkle_due =
                        now.saturating_sub(last_refresh) >= settings.merkle_refresh_interval;

                    if !(tip_changed || merkle_due || force || notified) {
                        continue;
                    }

                    match self.hub.registry.lock().add_template(template, force) {
                        Ok(Some((_, clean))) => {
                            last_refresh = now;
                            if clean || force {
                                last_force = now;
                            }
                        }
                        Ok(None) => debug!("Template unchanged, no job broadcast"),
                        Err(err) => warn!("Failed to register template: {err}"),
                    }
                }
                Err(err) => {
                    warn!("getblocktemplate failed: {err}; backing off {backoff}s");

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = sleep(Duration::from_secs(backoff)) => {}
                    }

                    backoff = (backoff * 2).min(60);
                }
            }
        }

        info!("Shutting down block updater");
    }
}

async fn next_blocknotify(zmq: &mut Option<Zmq>) -> Result<BlockHash> {
    match zmq.as_mut() {
        Some(socket) => socket.recv_blockhash().await,
        None => std::future::pending().await,
    }
}
