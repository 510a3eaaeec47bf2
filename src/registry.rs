use super::*;

/// Internal job identifier, monotonically assigned by the registry. The
/// wire never sees it; miners reference work through per-connection work
/// ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct JobId(u64);

impl JobId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Classification of one submitted share.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// The header meets the network target; the assembled block is ready
    /// for `submitblock`.
    BlockCandidate {
        block_hex: String,
        block_hash: BlockHash,
        height: u64,
        share_diff: f64,
    },
    /// Meets the connection target only.
    ValidShare { share_diff: f64 },
    Stale,
    Duplicate,
    LowDifficulty { share_diff: f64 },
    NtimeOutOfRange,
    JobNotFound,
}

struct JobEntry {
    job: Arc<Job>,
    issued_at: u64,
    seen: HashSet<(Extranonce, Extranonce, u32, u32)>,
}

/// The pool of live templates and the jobs minted from them. Owns the
/// extranonce1 space, the job-id watermark that invalidates work across
/// prevhash changes, and the per-job duplicate sets.
pub(crate) struct TemplateRegistry {
    instance_id: u8,
    extranonce_counter: u32,
    live_extranonces: HashSet<Extranonce>,
    coinbaser: Coinbaser,
    pow: PowVerifier,
    clock: Clock,
    work_expire: u64,
    solution_block_hash: bool,
    active: Option<Arc<BlockTemplate>>,
    history: LruCache<BlockHash, Arc<BlockTemplate>>,
    jobs: HashMap<JobId, JobEntry>,
    next_job_id: JobId,
    last_clean_job: JobId,
    job_tx: watch::Sender<Option<Arc<JobNotice>>>,
}

impl TemplateRegistry {
    pub(crate) fn new(
        settings: &Settings,
        clock: Clock,
        job_tx: watch::Sender<Option<Arc<JobNotice>>>,
    ) -> Result<Self> {
        ensure!(
            settings.instance_id <= 31,
            "instance id {} out of range [0, 31]",
            settings.instance_id
        );

        Ok(Self {
            instance_id: settings.instance_id,
            extranonce_counter: 1,
            live_extranonces: HashSet::new(),
            coinbaser: Coinbaser::from_settings(settings)?,
            pow: PowVerifier::new(settings.pow_algorithm, settings.share_multiplier),
            clock,
            work_expire: settings.work_expire,
            solution_block_hash: settings.solution_block_hash,
            active: None,
            history: LruCache::new(
                NonZeroUsize::new(TEMPLATE_HISTORY_SIZE).expect("history size is non-zero"),
            ),
            jobs: HashMap::new(),
            next_job_id: JobId::new(0),
            last_clean_job: JobId::new(0),
            job_tx,
        })
    }

    /// Hands out the next unused extranonce1: instance id in the top
    /// byte, allocation counter in the low 24 bits. Running out of
    /// counter space is a deployment error, not something to paper over
    /// by reusing live values.
    pub(crate) fn get_new_extranonce1(&mut self) -> Result<Extranonce> {
        ensure!(
            self.extranonce_counter < (1 << 24),
            "extranonce1 space exhausted for instance {}",
            self.instance_id
        );

        let value = (u32::from(self.instance_id) << 24) | self.extranonce_counter;
        self.extranonce_counter += 1;

        let extranonce1 = Extranonce::from_bytes(&value.to_be_bytes());
        self.live_extranonces.insert(extranonce1.clone());

        Ok(extranonce1)
    }

    pub(crate) fn release_extranonce1(&mut self, extranonce1: &Extranonce) {
        self.live_extranonces.remove(extranonce1);
    }

    pub(crate) fn active_previous_hash(&self) -> Option<BlockHash> {
        self.active
            .as_ref()
            .map(|template| template.previous_block_hash)
    }

    pub(crate) fn get_job(&self, job_id: JobId) -> Option<Arc<Job>> {
        self.jobs.get(&job_id).map(|entry| entry.job.clone())
    }

    /// Registers a fresh template, mints a job from it and broadcasts it
    /// to every subscriber. A prevhash change invalidates all prior
    /// jobs. Returns `None` when the daemon handed back a payload
    /// identical to one already active (no new job is broadcast), unless
    /// `force` requests a refresh anyway.
    pub(crate) fn add_template(
        &mut self,
        template: BlockTemplate,
        force: bool,
    ) -> Result<Option<(Arc<Job>, bool)>> {
        if !force
            && let Some(known) = self.history.peek(&template.previous_block_hash)
            && **known == template
        {
            return Ok(None);
        }

        let clean = self
            .active
            .as_ref()
            .map(|active| active.previous_block_hash != template.previous_block_hash)
            .unwrap_or(true);

        let now = self.clock.now();
        let template = Arc::new(template);

        self.history
            .put(template.previous_block_hash, template.clone());

        let job_id = self.next_job_id;
        self.next_job_id = job_id.next();

        let job = Arc::new(template.build_job(job_id, &self.coinbaser, now)?);

        if clean {
            self.jobs.clear();
            self.last_clean_job = job_id;
        } else {
            let cutoff = now.saturating_sub(self.work_expire);
            self.jobs.retain(|_, entry| entry.issued_at >= cutoff);
        }

        self.jobs.insert(
            job_id,
            JobEntry {
                job: job.clone(),
                issued_at: now,
                seen: HashSet::new(),
            },
        );

        self.active = Some(template.clone());

        info!(
            "New job {job_id} at height {} on {} (clean={clean})",
            template.height, template.previous_block_hash,
        );

        self.job_tx.send_replace(Some(Arc::new(JobNotice {
            job: job.clone(),
            clean,
        })));

        Ok(Some((job, clean)))
    }

    /// The share pipeline: resolve the job, check the ntime window and
    /// the duplicate set, rebuild the header, hash it and classify. The
    /// difficulty argument is the difficulty the work was issued at, not
    /// the connection's current target.
    pub(crate) fn submit_share(
        &mut self,
        job_id: JobId,
        extranonce1: &Extranonce,
        extranonce2: &Extranonce,
        ntime: Ntime,
        nonce: Nonce,
        difficulty: f64,
    ) -> Result<Outcome> {
        if job_id < self.last_clean_job {
            return Ok(Outcome::Stale);
        }

        let Some(entry) = self.jobs.get_mut(&job_id) else {
            return Ok(Outcome::JobNotFound);
        };

        let job = entry.job.clone();
        let template = job.template.clone();

        let submitted = u32::from(ntime);
        if submitted < u32::from(template.current_time)
            || u64::from(submitted) > self.clock.now() + MAX_NTIME_OFFSET
        {
            return Ok(Outcome::NtimeOutOfRange);
        }

        let key = (
            extranonce1.clone(),
            extranonce2.clone(),
            submitted,
            u32::from(nonce),
        );

        if !entry.seen.insert(key) {
            return Ok(Outcome::Duplicate);
        }

        let header = template.serialize_header(&job, extranonce1, extranonce2, ntime, nonce)?;
        let digest = self.pow.hash(&header);
        let share_diff = self.pow.share_diff(&digest);

        if share_diff < difficulty * (1.0 - SHARE_EPSILON) {
            return Ok(Outcome::LowDifficulty { share_diff });
        }

        if self.pow.meets_target(&digest, template.bits.to_compact()) {
            let block_hex =
                template.assemble_block(&job, extranonce1, extranonce2, ntime, nonce)?;

            let block_hash = if self.solution_block_hash {
                BlockHash::from_byte_array(digest)
            } else {
                BlockHash::from_byte_array(sha256d::Hash::hash(&header).to_byte_array())
            };

            return Ok(Outcome::BlockCandidate {
                block_hex,
                block_hash,
                height: template.height,
                share_diff,
            });
        }

        Ok(Outcome::ValidShare { share_diff })
    }
}
