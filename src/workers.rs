use super::*;

/// Worker acceptance policy and ban thresholds.
#[derive(Debug, Clone)]
pub(crate) struct WorkerPolicy {
    pub(crate) check_password: bool,
    pub(crate) banning: bool,
    pub(crate) cache_time: u64,
    pub(crate) ban_time: u64,
    pub(crate) invalid_percent: u64,
    pub(crate) invalid_spam: u64,
}

#[derive(Debug, Default)]
struct BanWindow {
    valid: u64,
    invalid: u64,
    started_at: u64,
}

/// Rolling share counters and ban state for one worker name. Counters
/// roll over every `cache_time` seconds so a burst of garbage months ago
/// cannot ban anyone today.
#[derive(Debug)]
pub(crate) struct Worker {
    workername: String,
    window: Mutex<BanWindow>,
    banned_until: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl Worker {
    fn new(workername: String) -> Self {
        Self {
            workername,
            window: Mutex::new(BanWindow::default()),
            banned_until: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub(crate) fn workername(&self) -> &str {
        &self.workername
    }

    pub(crate) fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub(crate) fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub(crate) fn is_banned(&self, now: u64) -> bool {
        self.banned_until.load(Ordering::Relaxed) > now
    }

    /// Counts one share and applies the ban policy: too many invalids in
    /// the window, or an excessive invalid ratio once enough shares have
    /// been seen.
    pub(crate) fn record_share(&self, valid: bool, policy: &WorkerPolicy, now: u64) {
        if valid {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }

        if !policy.banning {
            return;
        }

        let mut window = self.window.lock();

        if now.saturating_sub(window.started_at) > policy.cache_time {
            *window = BanWindow {
                valid: 0,
                invalid: 0,
                started_at: now,
            };
        }

        if valid {
            window.valid += 1;
        } else {
            window.invalid += 1;
        }

        let total = window.valid + window.invalid;

        let spammed = window.invalid > policy.invalid_spam;
        let skewed = total >= policy.invalid_spam
            && window.invalid * 100 > window.valid.max(1) * policy.invalid_percent;

        if spammed || skewed {
            warn!(
                "Banning worker {} for {}s ({} invalid / {} total in window)",
                self.workername, policy.ban_time, window.invalid, total
            );

            self.banned_until
                .store(now + policy.ban_time, Ordering::Relaxed);
            *window = BanWindow {
                valid: 0,
                invalid: 0,
                started_at: now,
            };
        }
    }
}

/// In-memory worker registry. Names are auto-registered on first
/// authorize; credential storage proper lives in the external share
/// database.
pub(crate) struct Workers {
    workers: DashMap<String, Arc<Worker>>,
    policy: WorkerPolicy,
}

impl Workers {
    pub(crate) fn new(policy: WorkerPolicy) -> Self {
        Self {
            workers: DashMap::new(),
            policy,
        }
    }

    pub(crate) fn policy(&self) -> &WorkerPolicy {
        &self.policy
    }

    pub(crate) fn get_or_create(&self, workername: &str) -> Arc<Worker> {
        self.workers
            .entry(workername.to_string())
            .or_insert_with(|| Arc::new(Worker::new(workername.to_string())))
            .clone()
    }

    /// Authorization gate: banned workers are turned away here, and,
    /// when password checking is on, so are workers presenting no
    /// password at all.
    pub(crate) fn authorize(
        &self,
        workername: &str,
        password: Option<&str>,
        now: u64,
    ) -> Result<Arc<Worker>, StratumError> {
        if self.policy.check_password && password.unwrap_or("").is_empty() {
            return Err(StratumError::Unauthorized);
        }

        let worker = self.get_or_create(workername);

        if worker.is_banned(now) {
            return Err(StratumError::Unauthorized);
        }

        Ok(worker)
    }
}
