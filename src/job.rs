use super::*;

/// One unit of broadcast work: a coinbase split minted from a template.
/// Jobs are global; miners personalize them with their extranonce1, so
/// no per-connection coinbase is materialized until a share arrives.
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) job_id: JobId,
    pub(crate) coinb1: String,
    pub(crate) coinb2: String,
    pub(crate) template: Arc<BlockTemplate>,
}

impl Job {
    pub(crate) fn notify(&self, work_id: WorkId, clean_jobs: bool) -> Notify {
        Notify {
            work_id,
            prevhash: PrevHash::from(self.template.previous_block_hash),
            coinb1: self.coinb1.clone(),
            coinb2: self.coinb2.clone(),
            merkle_branches: self.template.merkle_branches().to_vec(),
            version: self.template.version,
            nbits: self.template.bits,
            ntime: self.template.current_time,
            clean_jobs,
        }
    }
}

/// What the registry hands to every subscribed connection when new work
/// lands.
#[derive(Debug, Clone)]
pub(crate) struct JobNotice {
    pub(crate) job: Arc<Job>,
    pub(crate) clean: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        let template = Arc::new(BlockTemplate::for_tests(100, 1));
        Job {
            job_id: JobId::new(3),
            coinb1: "0100".into(),
            coinb2: "00ff".into(),
            template,
        }
    }

    #[test]
    fn notify_projects_template_fields() {
        let job = job();
        let notify = job.notify(WorkId::new(0x3e9), true);

        assert_eq!(notify.work_id, WorkId::new(0x3e9));
        assert_eq!(notify.coinb1, job.coinb1);
        assert_eq!(notify.coinb2, job.coinb2);
        assert_eq!(notify.version, job.template.version);
        assert_eq!(notify.nbits, job.template.bits);
        assert_eq!(notify.ntime, job.template.current_time);
        assert_eq!(
            BlockHash::from(notify.prevhash),
            job.template.previous_block_hash
        );
        assert!(notify.clean_jobs);
    }

    #[test]
    fn notify_work_id_is_caller_scoped() {
        let job = job();

        // The same job can fan out under different work ids.
        assert_ne!(
            job.notify(WorkId::new(1), false).work_id,
            job.notify(WorkId::new(2), false).work_id
        );
    }
}
