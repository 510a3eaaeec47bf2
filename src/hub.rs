use super::*;

/// Shared context threaded through the call graph: settings, the
/// template registry, the work log, worker records, the clock, the
/// daemon channel and the persistence queue. Built once at startup.
pub(crate) struct Hub {
    pub(crate) settings: Arc<Settings>,
    pub(crate) registry: Mutex<TemplateRegistry>,
    pub(crate) work_log: WorkLog,
    pub(crate) workers: Workers,
    pub(crate) clock: Clock,
    pub(crate) daemon: Arc<Daemon>,
    events: mpsc::Sender<Event>,
    job_rx: watch::Receiver<Option<Arc<JobNotice>>>,
    connections: AtomicU64,
}

impl Hub {
    pub(crate) fn new(
        settings: Arc<Settings>,
        registry: TemplateRegistry,
        clock: Clock,
        daemon: Arc<Daemon>,
        events: mpsc::Sender<Event>,
        job_rx: watch::Receiver<Option<Arc<JobNotice>>>,
    ) -> Self {
        Self {
            work_log: WorkLog::new(settings.work_expire),
            workers: Workers::new(settings.worker_policy()),
            registry: Mutex::new(registry),
            settings,
            clock,
            daemon,
            events,
            job_rx,
            connections: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe_jobs(&self) -> watch::Receiver<Option<Arc<JobNotice>>> {
        self.job_rx.clone()
    }

    /// Queue full is a transient condition: the share stays accepted,
    /// the record is dropped, and only the log knows.
    pub(crate) fn publish(&self, event: Event) {
        if self.events.try_send(event).is_err() {
            warn!("Event queue full, dropping record");
        }
    }

    pub(crate) fn add_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sub_connection(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn total_connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}
