use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::app::model::Job;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> anyhow::Result<()>;
    async fn get(&self, job_id: &str) -> anyhow::Result<Option<Job>>;
    async fn put(&self, job: &Job) -> anyhow::Result<()>;
    /// All jobs, oldest first.
    async fn list(&self) -> anyhow::Result<Vec<Job>>;
}

/// One pretty-printed `jobs/<job_id>.json` file per job under `base_dir`.
#[derive(Debug, Clone)]
pub struct LocalFsJobStore {
    base_dir: PathBuf,
}

impl LocalFsJobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn jobs_dir(&self) -> PathBuf {
        self.base_dir.join("jobs")
    }

    fn record_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(format!("{job_id}.json"))
    }
}

#[async_trait]
impl JobStore for LocalFsJobStore {
    async fn create(&self, job: &Job) -> anyhow::Result<()> {
        let path = self.record_path(&job.job_id);
        if fs::try_exists(&path)
            .await
            .with_context(|| format!("stat {}", path.display()))?
        {
            anyhow::bail!("job already exists: {}", job.job_id);
        }
        write_json_atomic(&path, job)
            .await
            .with_context(|| format!("create job {}", job.job_id))
    }

    async fn get(&self, job_id: &str) -> anyhow::Result<Option<Job>> {
        let path = self.record_path(job_id);
        read_json(&path)
            .await
            .with_context(|| format!("load job record {}", path.display()))
    }

    async fn put(&self, job: &Job) -> anyhow::Result<()> {
        write_json_atomic(&self.record_path(&job.job_id), job)
            .await
            .with_context(|| format!("update job {}", job.job_id))
    }

    async fn list(&self) -> anyhow::Result<Vec<Job>> {
        let jobs_dir = self.jobs_dir();
        let mut entries = match fs::read_dir(&jobs_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("list {}", jobs_dir.display()));
            }
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(job_id) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".json"))
            else {
                continue;
            };
            if uuid::Uuid::parse_str(job_id).is_err() {
                continue;
            }
            if let Some(job) = self.get(job_id).await? {
                jobs.push(job);
            }
        }
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}

/// Job records that live as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<BTreeMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            anyhow::bail!("job already exists: {}", job.job_id);
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> anyhow::Result<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn put(&self, job: &Job) -> anyhow::Result<()> {
        self.jobs
            .write()
            .await
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).context("decode job json")?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes to a sibling temp file first so readers never see a half-written record.
async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let Some(dir) = path.parent() else {
        anyhow::bail!("job record path has no parent: {}", path.display());
    };
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;

    let staging = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    let json = serde_json::to_vec_pretty(value).context("encode job json")?;
    fs::write(&staging, json)
        .await
        .with_context(|| format!("write {}", staging.display()))?;
    fs::rename(&staging, path)
        .await
        .with_context(|| format!("move job record into place: {}", path.display()))
}
