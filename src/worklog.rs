use super::*;

/// What a work id resolves back to at submit time. The difficulty is the
/// one in effect when the work was issued; shares are always judged
/// against it, not the connection's current target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WorkRecord {
    pub(crate) job_id: JobId,
    pub(crate) difficulty: f64,
    pub(crate) issued_at: u64,
}

/// Per-connection log of issued work, keyed by (extranonce1, work_id).
/// Work ids come from one shared short-hex counter that wraps at 0xffff,
/// matching what miners expect in the job_id slot.
pub(crate) struct WorkLog {
    log: DashMap<Extranonce, HashMap<WorkId, WorkRecord>>,
    counter: AtomicU32,
    work_expire: u64,
}

impl WorkLog {
    pub(crate) fn new(work_expire: u64) -> Self {
        Self {
            log: DashMap::new(),
            counter: AtomicU32::new(0x1000),
            work_expire,
        }
    }

    /// Creates the per-connection map at subscribe time.
    pub(crate) fn attach(&self, extranonce1: &Extranonce) {
        self.log.entry(extranonce1.clone()).or_default();
    }

    /// Drops the connection's map entirely; pruning keeps empty maps for
    /// live connections, disconnect is the only full removal.
    pub(crate) fn detach(&self, extranonce1: &Extranonce) {
        self.log.remove(extranonce1);
    }

    pub(crate) fn register(
        &self,
        extranonce1: &Extranonce,
        job_id: JobId,
        difficulty: f64,
        now: u64,
    ) -> WorkId {
        let work_id = self.next_work_id();

        self.log.entry(extranonce1.clone()).or_default().insert(
            work_id,
            WorkRecord {
                job_id,
                difficulty,
                issued_at: now,
            },
        );

        work_id
    }

    pub(crate) fn lookup(&self, extranonce1: &Extranonce, work_id: WorkId) -> Option<WorkRecord> {
        self.log
            .get(extranonce1)?
            .get(&work_id)
            .copied()
    }

    /// Removes records older than the expiry horizon. Empty maps stay in
    /// place until their connection closes.
    pub(crate) fn prune(&self, now: u64) -> usize {
        let cutoff = now.saturating_sub(self.work_expire);
        let mut removed = 0;

        for mut entry in self.log.iter_mut() {
            let before = entry.len();
            entry.retain(|_, record| record.issued_at >= cutoff);
            removed += before - entry.len();
        }

        removed
    }

    fn next_work_id(&self) -> WorkId {
        loop {
            let raw = self.counter.fetch_add(1, Ordering::Relaxed) & WORK_ID_WRAP;
            if raw != 0 {
                return WorkId::new(raw);
            }
        }
    }
}

/// Background task sweeping all connections' logs on half the expiry
/// interval.
pub(crate) async fn prune_loop(hub: Arc<Hub>, cancel: CancellationToken) {
    let period = Duration::from_secs((hub.settings.work_expire / 2).max(1));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(period) => {
                let removed = hub.work_log.prune(hub.clock.now());
                if removed > 0 {
                    debug!("Pruned {removed} expired work records");
                }
            }
        }
    }
}
