use {super::*, tokio::io::AsyncWriteExt};

const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// One record bound for the share database. The database itself is
/// external; the core only guarantees a bounded queue that never blocks
/// the share pipeline.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Event {
    Share(ShareEvent),
    Block(BlockEvent),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ShareEvent {
    pub(crate) timestamp: u64,
    pub(crate) workername: String,
    pub(crate) ip: String,
    pub(crate) accepted: bool,
    pub(crate) pool_diff: f64,
    pub(crate) share_diff: f64,
    pub(crate) block_hash: Option<String>,
    pub(crate) reject_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct BlockEvent {
    pub(crate) timestamp: u64,
    pub(crate) workername: String,
    pub(crate) block_hash: String,
    pub(crate) height: u64,
    pub(crate) accepted: bool,
}

#[async_trait]
pub(crate) trait EventSink: Send + Sync {
    async fn record(&mut self, event: Event) -> Result;

    async fn flush(&mut self) -> Result {
        Ok(())
    }
}

/// JSON-lines sink for deployments without a database loader attached.
pub(crate) struct FileSink {
    file: tokio::fs::File,
}

impl FileSink {
    pub(crate) async fn create(path: &PathBuf) -> Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open events file {}", path.display()))?;

        Ok(Self { file })
    }
}

#[async_trait]
impl EventSink for FileSink {
    async fn record(&mut self, event: Event) -> Result {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result {
        self.file.flush().await?;
        Ok(())
    }
}

/// Fallback sink that lands records in the log stream.
pub(crate) struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn record(&mut self, event: Event) -> Result {
        info!(target: "events", "{}", serde_json::to_string(&event)?);
        Ok(())
    }
}

/// Builds the bounded persistence queue and spawns its drain task. On
/// shutdown the queue is drained before the sink is flushed.
pub(crate) async fn spawn_queue(
    settings: &Settings,
    cancel: CancellationToken,
    tasks: &mut JoinSet<()>,
) -> Result<mpsc::Sender<Event>> {
    let mut sink: Box<dyn EventSink> = match &settings.events_file {
        Some(path) => {
            info!("Recording share events to {}", path.display());
            Box::new(FileSink::create(path).await?)
        }
        None => Box::new(LogSink),
    };

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tasks.spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        if let Err(err) = sink.record(event).await {
                            warn!("Error recording event during shutdown: {err}");
                        }
                    }
                    if let Err(err) = sink.flush().await {
                        warn!("Error flushing event sink: {err}");
                    }
                    break;
                }

                event = rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if let Err(err) = sink.record(event).await {
                        warn!("Error recording event: {err}");
                    }
                }
            }
        }
    });

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share_event() -> Event {
        Event::Share(ShareEvent {
            timestamp: 1_345_678_900,
            workername: "pool.rig1".into(),
            ip: "203.0.113.7".into(),
            accepted: true,
            pool_diff: 8.0,
            share_diff: 11.5,
            block_hash: None,
            reject_reason: None,
        })
    }

    #[test]
    fn share_event_serializes_with_tag() {
        let value = serde_json::to_value(share_event()).unwrap();

        assert_eq!(value["type"], "share");
        assert_eq!(value["workername"], "pool.rig1");
        assert_eq!(value["accepted"], true);
        assert_eq!(value["block_hash"], Value::Null);
    }

    #[test]
    fn block_event_serializes_with_tag() {
        let event = Event::Block(BlockEvent {
            timestamp: 1_345_678_900,
            workername: "pool.rig1".into(),
            block_hash: "00".repeat(32),
            height: 201_600,
            accepted: true,
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "block");
        assert_eq!(value["height"], 201_600);
    }

    #[tokio::test]
    async fn file_sink_writes_json_lines() {
        let dir = std::env::temp_dir().join(format!("noncepool-events-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("events.jsonl");

        let mut sink = FileSink::create(&path).await.unwrap();
        sink.record(share_event()).await.unwrap();
        sink.record(share_event()).await.unwrap();
        sink.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);

        let parsed: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["type"], "share");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
