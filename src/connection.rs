use {
    super::*,
    tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf},
};

/// Protocol position of one miner connection. Submits before subscribe
/// answer code 25, before authorize code 24.
#[derive(Debug)]
enum State {
    Fresh,
    Subscribed {
        extranonce1: Extranonce,
        user_agent: String,
    },
    Working {
        extranonce1: Extranonce,
        user_agent: String,
        worker: Arc<Worker>,
    },
}

impl State {
    fn extranonce1(&self) -> Option<&Extranonce> {
        match self {
            State::Fresh => None,
            State::Subscribed { extranonce1, .. } => Some(extranonce1),
            State::Working { extranonce1, .. } => Some(extranonce1),
        }
    }

    fn user_agent(&self) -> Option<&str> {
        match self {
            State::Fresh => None,
            State::Subscribed { user_agent, .. } => Some(user_agent),
            State::Working { user_agent, .. } => Some(user_agent),
        }
    }

    fn worker(&self) -> Option<&Arc<Worker>> {
        match self {
            State::Working { worker, .. } => Some(worker),
            _ => None,
        }
    }
}

/// One miner session: speaks the wire protocol, registers issued work
/// under its extranonce1, and feeds accepted shares to vardiff and the
/// persistence queue.
pub(crate) struct Connection {
    hub: Arc<Hub>,
    socket_addr: SocketAddr,
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
    job_rx: watch::Receiver<Option<Arc<JobNotice>>>,
    cancel: CancellationToken,
    state: State,
    vardiff: Vardiff,
}

impl Connection {
    pub(crate) fn new(
        hub: Arc<Hub>,
        tcp_stream: TcpStream,
        socket_addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Self {
        let _ = tcp_stream.set_nodelay(true);

        let (reader, writer) = tcp_stream.into_split();

        let vardiff = Vardiff::new(
            hub.settings.vardiff_config(),
            hub.settings.pool_diff,
            hub.clock.now(),
        );

        let job_rx = hub.subscribe_jobs();

        hub.add_connection();

        Self {
            hub,
            socket_addr,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            job_rx,
            cancel,
            state: State::Fresh,
            vardiff,
        }
    }

    pub(crate) async fn serve(&mut self) -> Result {
        let mut job_rx = self.job_rx.clone();
        let cancel = self.cancel.clone();

        // Whatever job predates this connection is delivered on
        // authorize, not through the broadcast arm.
        job_rx.borrow_and_update();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Disconnecting {}", self.socket_addr);
                    break;
                }

                message = self.read_message() => {
                    let Some(message) = message? else {
                        break;
                    };

                    let Message::Request { id, method, params } = message else {
                        warn!(?message, "Ignoring non-request from miner");
                        continue;
                    };

                    match method.as_str() {
                        "mining.subscribe" => {
                            debug!("SUBSCRIBE from {} with {params}", self.socket_addr);

                            let subscribe = serde_json::from_value::<Subscribe>(params)
                                .context("failed to deserialize mining.subscribe")?;

                            self.subscribe(id, subscribe).await?
                        }
                        "mining.authorize" => {
                            debug!("AUTHORIZE from {} with {params}", self.socket_addr);

                            let authorize = serde_json::from_value::<Authorize>(params)
                                .context("failed to deserialize mining.authorize")?;

                            self.authorize(id, authorize).await?
                        }
                        "mining.submit" => {
                            debug!("SUBMIT from {} with {params}", self.socket_addr);

                            // Malformed hex in a submit is a client
                            // error, not grounds to drop the socket.
                            match serde_json::from_value::<Submit>(params) {
                                Ok(submit) => self.submit(id, submit).await?,
                                Err(err) => {
                                    self.send_error(
                                        id,
                                        StratumError::Other,
                                        Some(json!({"message": err.to_string()})),
                                    )
                                    .await?
                                }
                            }
                        }
                        method => {
                            warn!("UNKNOWN method {method} from {}", self.socket_addr);

                            self.send_error(
                                id,
                                StratumError::Other,
                                Some(json!({"method": method})),
                            )
                            .await?
                        }
                    }
                }

                changed = job_rx.changed() => {
                    if changed.is_err() {
                        warn!("Job broadcast closed, disconnecting {}", self.socket_addr);
                        break;
                    }

                    let notice = job_rx.borrow_and_update().clone();

                    if self.state.worker().is_some()
                        && let Some(notice) = notice
                    {
                        self.push_job(&notice.job, notice.clean).await?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn subscribe(&mut self, id: Id, subscribe: Subscribe) -> Result {
        if let Some(previous) = self.state.extranonce1() {
            info!("Client {} resubscribing", self.socket_addr);

            self.hub.registry.lock().release_extranonce1(previous);
            self.hub.work_log.detach(previous);

            self.vardiff = Vardiff::new(
                self.hub.settings.vardiff_config(),
                self.hub.settings.pool_diff,
                self.hub.clock.now(),
            );
        }

        let extranonce1 = self.hub.registry.lock().get_new_extranonce1()?;
        self.hub.work_log.attach(&extranonce1);

        let result = SubscribeResult {
            subscriptions: vec![
                (
                    "mining.set_difficulty".to_string(),
                    SUBSCRIPTION_ID.to_string(),
                ),
                ("mining.notify".to_string(), SUBSCRIPTION_ID.to_string()),
            ],
            extranonce1: extranonce1.clone(),
            extranonce2_size: self.hub.settings.extranonce2_size,
        };

        self.send(Message::Response {
            id,
            result: Some(json!(result)),
            error: None,
        })
        .await?;

        self.state = State::Subscribed {
            extranonce1,
            user_agent: subscribe.user_agent,
        };

        Ok(())
    }

    async fn authorize(&mut self, id: Id, authorize: Authorize) -> Result {
        let Some(extranonce1) = self.state.extranonce1().cloned() else {
            self.send_error(id, StratumError::NotSubscribed, None).await?;
            return Ok(());
        };

        let user_agent = self.state.user_agent().unwrap_or_default().to_string();

        let worker = match self.hub.workers.authorize(
            &authorize.workername,
            authorize.password.as_deref(),
            self.hub.clock.now(),
        ) {
            Ok(worker) => worker,
            Err(error) => {
                info!(
                    "Refusing worker {} from {}: {error}",
                    authorize.workername, self.socket_addr
                );

                self.send_error(
                    id,
                    error,
                    Some(json!({"workername": authorize.workername})),
                )
                .await?;

                return Ok(());
            }
        };

        self.send(Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
        })
        .await?;

        info!(
            "Authorized worker {} from {} ({user_agent})",
            worker.workername(),
            self.socket_addr
        );

        self.state = State::Working {
            extranonce1,
            user_agent,
            worker,
        };

        // set_difficulty always lands before the job it applies to.
        self.send_difficulty().await?;

        let notice = self.job_rx.borrow().clone();
        if let Some(notice) = notice {
            self.push_job(&notice.job, true).await?;
        }

        Ok(())
    }

    async fn submit(&mut self, id: Id, submit: Submit) -> Result {
        let (extranonce1, worker) = match &self.state {
            State::Fresh => {
                self.send_error(id, StratumError::NotSubscribed, None).await?;
                return Ok(());
            }
            State::Subscribed { .. } => {
                self.send_error(id, StratumError::Unauthorized, None).await?;
                return Ok(());
            }
            State::Working {
                extranonce1,
                worker,
                ..
            } => (extranonce1.clone(), worker.clone()),
        };

        if submit.workername != worker.workername() {
            self.reject(
                id,
                &worker,
                StratumError::Unauthorized,
                Some(json!({
                    "authorized": worker.workername(),
                    "submitted": submit.workername,
                })),
                0.0,
            )
            .await?;

            return Ok(());
        }

        let expected = self.hub.settings.extranonce2_size;
        if submit.extranonce2.len() != expected {
            self.reject(
                id,
                &worker,
                StratumError::Other,
                Some(json!({
                    "message": "invalid extranonce2 length",
                    "expected": expected,
                    "received": submit.extranonce2.len(),
                })),
                0.0,
            )
            .await?;

            return Ok(());
        }

        let Some(record) = self.hub.work_log.lookup(&extranonce1, submit.work_id) else {
            self.reject(id, &worker, StratumError::JobNotFound, None, 0.0)
                .await?;
            return Ok(());
        };

        let outcome = self.hub.registry.lock().submit_share(
            record.job_id,
            &extranonce1,
            &submit.extranonce2,
            submit.ntime,
            submit.nonce,
            record.difficulty,
        )?;

        match outcome {
            Outcome::BlockCandidate {
                block_hex,
                block_hash,
                height,
                share_diff,
            } => {
                info!(
                    "BLOCK CANDIDATE {block_hash} from {} at share diff {share_diff:.3}",
                    worker.workername()
                );

                self.accept(
                    id,
                    &worker,
                    record.difficulty,
                    share_diff,
                    Some(block_hash.to_string()),
                )
                .await?;

                self.submit_block(block_hex, block_hash, height, worker.workername().to_string());

                self.retarget().await?;
            }
            Outcome::ValidShare { share_diff } => {
                debug!(
                    "Share accepted from {} | diff={} sdiff={share_diff:.3}",
                    self.socket_addr, record.difficulty
                );

                self.accept(id, &worker, record.difficulty, share_diff, None)
                    .await?;

                self.retarget().await?;
            }
            Outcome::Stale => {
                self.reject(id, &worker, StratumError::Stale, None, 0.0)
                    .await?
            }
            Outcome::Duplicate => {
                self.reject(id, &worker, StratumError::Duplicate, None, 0.0)
                    .await?
            }
            Outcome::LowDifficulty { share_diff } => {
                self.reject(
                    id,
                    &worker,
                    StratumError::LowDifficulty,
                    Some(json!({
                        "share_diff": share_diff,
                        "required": record.difficulty,
                    })),
                    share_diff,
                )
                .await?
            }
            Outcome::NtimeOutOfRange => {
                self.reject(
                    id,
                    &worker,
                    StratumError::Other,
                    Some(json!({"message": "ntime out of range"})),
                    0.0,
                )
                .await?
            }
            Outcome::JobNotFound => {
                self.reject(id, &worker, StratumError::JobNotFound, None, 0.0)
                    .await?
            }
        }

        Ok(())
    }

    async fn accept(
        &mut self,
        id: Id,
        worker: &Arc<Worker>,
        pool_diff: f64,
        share_diff: f64,
        block_hash: Option<String>,
    ) -> Result {
        self.send(Message::Response {
            id,
            result: Some(json!(true)),
            error: None,
        })
        .await?;

        let now = self.hub.clock.now();

        worker.record_share(true, self.hub.workers.policy(), now);

        self.hub.publish(Event::Share(ShareEvent {
            timestamp: now,
            workername: worker.workername().to_string(),
            ip: self.socket_addr.ip().to_string(),
            accepted: true,
            pool_diff,
            share_diff,
            block_hash,
            reject_reason: None,
        }));

        Ok(())
    }

    async fn reject(
        &mut self,
        id: Id,
        worker: &Arc<Worker>,
        error: StratumError,
        traceback: Option<Value>,
        share_diff: f64,
    ) -> Result {
        self.send_error(id, error, traceback).await?;

        let now = self.hub.clock.now();

        worker.record_share(false, self.hub.workers.policy(), now);

        debug!(
            "Share rejected from {} ({error}); {} lifetime: {} accepted / {} rejected",
            self.socket_addr,
            worker.workername(),
            worker.accepted(),
            worker.rejected()
        );

        self.hub.publish(Event::Share(ShareEvent {
            timestamp: now,
            workername: worker.workername().to_string(),
            ip: self.socket_addr.ip().to_string(),
            accepted: false,
            pool_diff: self.vardiff.current(),
            share_diff,
            block_hash: None,
            reject_reason: Some(error.to_string()),
        }));

        Ok(())
    }

    /// Fire-and-forget daemon submission. Failures are logged with the
    /// full block hex for manual replay; the share's acceptance already
    /// went out.
    fn submit_block(
        &self,
        block_hex: String,
        block_hash: BlockHash,
        height: u64,
        workername: String,
    ) {
        let hub = self.hub.clone();

        task::spawn(async move {
            let accepted = match hub.daemon.submit_block(&block_hex).await {
                Ok(None) => {
                    info!("Daemon accepted block {block_hash}");
                    true
                }
                Ok(Some(reply))
                    if hub.settings.solution_block_hash
                        && reply.eq_ignore_ascii_case(&block_hash.to_string()) =>
                {
                    info!("Daemon accepted block {block_hash} (solution hash)");
                    true
                }
                Ok(Some(reason)) => {
                    error!(
                        "Daemon rejected block {block_hash}: {reason}; hex for manual replay: {block_hex}"
                    );
                    false
                }
                Err(err) => {
                    error!(
                        "submitblock failed for {block_hash}: {err}; hex for manual replay: {block_hex}"
                    );
                    false
                }
            };

            hub.publish(Event::Block(BlockEvent {
                timestamp: hub.clock.now(),
                workername,
                block_hash: block_hash.to_string(),
                height,
                accepted,
            }));
        });
    }

    async fn retarget(&mut self) -> Result {
        let Some(new_diff) = self.vardiff.record_share(self.hub.clock.now()) else {
            return Ok(());
        };

        info!(
            "Adjusting difficulty to {new_diff} for {}",
            self.socket_addr
        );

        self.send_difficulty().await?;

        // Fresh work so the miner picks up the new target immediately.
        let notice = self.job_rx.borrow().clone();
        if let Some(notice) = notice {
            self.push_job(&notice.job, false).await?;
        }

        Ok(())
    }

    async fn push_job(&mut self, job: &Arc<Job>, clean: bool) -> Result {
        let Some(extranonce1) = self.state.extranonce1() else {
            return Ok(());
        };

        let work_id = self.hub.work_log.register(
            extranonce1,
            job.job_id,
            self.vardiff.current(),
            self.hub.clock.now(),
        );

        self.send(Message::Notification {
            method: "mining.notify".into(),
            params: json!(job.notify(work_id, clean)),
        })
        .await
    }

    async fn send_difficulty(&mut self) -> Result {
        self.send(Message::Notification {
            method: "mining.set_difficulty".into(),
            params: json!(SetDifficulty(self.vardiff.current())),
        })
        .await
    }

    async fn read_message(&mut self) -> Result<Option<Message>> {
        match self.reader.next().await {
            Some(Ok(line)) => {
                let message = serde_json::from_str::<Message>(&line).map_err(|e| {
                    anyhow!(
                        "invalid stratum message from {}: {e}; line={line:?}",
                        self.socket_addr
                    )
                })?;
                Ok(Some(message))
            }
            Some(Err(e)) => Err(anyhow!("read error from {}: {e}", self.socket_addr)),
            None => {
                info!("Connection {} disconnected", self.socket_addr);
                Ok(None)
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result {
        let frame = serde_json::to_string(&message)?;
        self.writer.send(frame).await?;
        Ok(())
    }

    async fn send_error(
        &mut self,
        id: Id,
        error: StratumError,
        traceback: Option<Value>,
    ) -> Result {
        self.send(Message::Response {
            id,
            result: None,
            error: Some(error.into_response(traceback)),
        })
        .await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(extranonce1) = self.state.extranonce1() {
            self.hub.registry.lock().release_extranonce1(extranonce1);
            self.hub.work_log.detach(extranonce1);
        }

        self.hub.sub_connection();

        info!(
            "Closed connection {} (remaining: {})",
            self.socket_addr,
            self.hub.total_connections()
        );
    }
}
