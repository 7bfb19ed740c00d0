use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Complete,
    Failed(String),
}

/// Named asset jobs that must finish before play can start.
#[derive(Debug, Clone, Default)]
pub struct LoadingGate {
    jobs: Vec<(String, JobStatus)>,
}

impl LoadingGate {
    pub fn new<I, S>(jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut gate = Self::default();
        for job in jobs {
            gate.add_job(job);
        }
        gate
    }

    /// Registers `job` as pending. A job registered twice is reset to pending.
    pub fn add_job(&mut self, job: impl Into<String>) {
        let job = job.into();
        match self.position(&job) {
            Some(index) => {
                warn!(job = job.as_str(), "loading_job_already_registered");
                self.jobs[index].1 = JobStatus::Pending;
            }
            None => self.jobs.push((job, JobStatus::Pending)),
        }
    }

    pub fn mark_complete(&mut self, job: &str) -> bool {
        self.set_status(job, JobStatus::Complete)
    }

    pub fn mark_failed(&mut self, job: &str, reason: impl Into<String>) -> bool {
        self.set_status(job, JobStatus::Failed(reason.into()))
    }

    pub fn status(&self, job: &str) -> Option<&JobStatus> {
        self.position(job).map(|index| &self.jobs[index].1)
    }

    pub fn is_loaded(&self, job: &str) -> bool {
        match self.status(job) {
            Some(status) => *status == JobStatus::Complete,
            None => {
                warn!(job, "loading_job_not_registered");
                false
            }
        }
    }

    pub fn load_complete<S: AsRef<str>>(&self, jobs: &[S]) -> bool {
        jobs.iter().all(|job| self.is_loaded(job.as_ref()))
    }

    pub fn failed_jobs(&self) -> Vec<(&str, &str)> {
        self.jobs
            .iter()
            .filter_map(|(job, status)| match status {
                JobStatus::Failed(reason) => Some((job.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&str, &JobStatus)> {
        self.jobs.iter().map(|(job, status)| (job.as_str(), status))
    }

    fn position(&self, job: &str) -> Option<usize> {
        self.jobs.iter().position(|(name, _)| name == job)
    }

    fn set_status(&mut self, job: &str, status: JobStatus) -> bool {
        let Some(index) = self.position(job) else {
            warn!(job, "loading_job_not_registered");
            return false;
        };
        debug!(job, status = ?status, "loading_job_updated");
        self.jobs[index].1 = status;
        true
    }
}
