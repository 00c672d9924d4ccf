use std::sync::Arc;

use crate::{
    executor::AuditExecutor,
    registry::TaskRegistry,
    runner::BatchRunner,
    storage::Storage,
    types::{AuditConfig, AuditError, FileInfo, FolderInfo, Task},
    utils::REPORTS_DIR,
};

/// Default folder/config name when a submission carries none, matching the
/// original upload flow.
const DEFAULT_CONFIG_NAME: &str = "audit";

/// Business logic behind the external submit/poll/list/delete boundary.
/// Owns the task registry; storage and executor are injected at startup.
pub struct AuditService {
    registry: Arc<TaskRegistry>,
    storage: Arc<dyn Storage>,
    executor: Arc<dyn AuditExecutor>,
}

impl AuditService {
    pub fn new(storage: Arc<dyn Storage>, executor: Arc<dyn AuditExecutor>) -> Self {
        AuditService {
            registry: Arc::new(TaskRegistry::new()),
            storage,
            executor,
        }
    }

    /// Validates the config, creates the task and launches the batch on its
    /// own tokio task. Returns the task id immediately; the caller polls
    /// [`status`](Self::status) until the task reaches a terminal state.
    pub async fn submit(
        &self,
        config: AuditConfig,
        config_name: Option<String>,
    ) -> Result<String, AuditError> {
        config.validate()?;

        let config_name = config_name
            .or_else(|| config.name.clone())
            .unwrap_or_else(|| DEFAULT_CONFIG_NAME.into());

        let task_id = self.registry.create_task().await;
        info!("submitting batch {} as task {}", config_name, task_id);

        let runner = BatchRunner::new(self.executor.clone(), self.registry.clone());
        let id = task_id.clone();
        tokio::spawn(async move {
            runner.run(config, &id, &config_name).await;
        });

        Ok(task_id)
    }

    /// Latest snapshot for one task, or None for an unknown id.
    pub async fn status(&self, task_id: &str) -> Option<Task> {
        self.registry.snapshot(task_id).await
    }

    pub async fn list_folders(&self) -> anyhow::Result<Vec<FolderInfo>> {
        self.storage
            .list_folders(&format!("{}/", REPORTS_DIR))
            .await
    }

    pub async fn list_files(&self, folder: &str) -> anyhow::Result<Vec<FileInfo>> {
        self.storage.list_files(folder).await
    }

    pub async fn delete_folder(&self, folder: &str) -> anyhow::Result<()> {
        info!("deleting report folder {}", folder);
        self.storage.delete_folder(folder).await
    }
}
