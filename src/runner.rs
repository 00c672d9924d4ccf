use std::sync::Arc;

use chrono::Utc;

use crate::{
    devices::DEVICE_PROFILES,
    executor::AuditExecutor,
    registry::TaskRegistry,
    types::{AuditConfig, AuditError, PerPageResult, TaskStatus},
    utils::date_folder,
};

/// Drives one submitted batch across the url x device-profile matrix,
/// strictly one audit at a time. Communicates exclusively through registry
/// mutation; the spawner never sees a return value.
pub struct BatchRunner {
    executor: Arc<dyn AuditExecutor>,
    registry: Arc<TaskRegistry>,
}

impl BatchRunner {
    pub fn new(executor: Arc<dyn AuditExecutor>, registry: Arc<TaskRegistry>) -> Self {
        BatchRunner { executor, registry }
    }

    pub async fn run(&self, config: AuditConfig, task_id: &str, config_name: &str) {
        if let Err(e) = self.run_batch(&config, task_id, config_name).await {
            let fatal = AuditError::FatalBatch(format!("{:#}", e));
            error!("batch {} aborted: {}", task_id, fatal);
            self.registry
                .update(task_id, |task| {
                    task.status = TaskStatus::Error;
                    task.message = fatal.to_string();
                })
                .await;
        }
    }

    async fn run_batch(
        &self,
        config: &AuditConfig,
        task_id: &str,
        config_name: &str,
    ) -> anyhow::Result<()> {
        let folder_name = date_folder(config_name, Utc::now());
        info!(
            "starting batch {} for {} ({} paths) into folder {}",
            task_id,
            config.base,
            config.paths.len(),
            folder_name
        );

        self.registry
            .update(task_id, |task| {
                task.folder_name = Some(folder_name.clone());
            })
            .await;

        let total = config.paths.len() * DEVICE_PROFILES.len();
        let mut completed = 0;
        let mut results: Vec<PerPageResult> = Vec::with_capacity(total);

        for path in &config.paths {
            let full_url = format!("{}{}", config.base, path);
            for profile in DEVICE_PROFILES.iter() {
                // a failed pair is recorded and never aborts the batch
                let result = match self
                    .executor
                    .run_one(&full_url, profile, &folder_name)
                    .await
                {
                    Ok(location) => PerPageResult {
                        url: full_url.clone(),
                        device: profile.name.clone(),
                        success: true,
                        artifact_path: Some(location),
                        error: None,
                    },
                    Err(e) => {
                        warn!("audit of {} ({}) failed: {:#}", full_url, profile.name, e);
                        PerPageResult {
                            url: full_url.clone(),
                            device: profile.name.clone(),
                            success: false,
                            artifact_path: None,
                            error: Some(format!("{:#}", e)),
                        }
                    }
                };
                results.push(result);
                completed += 1;

                // the final pair is reported by the terminal update below, so
                // progress only shows 100 once the task is completed
                if completed < total {
                    let progress = completed as f32 / total as f32 * 100.0;
                    let message = format!("Processing {}/{} pages...", completed, total);
                    let snapshot = results.clone();
                    self.registry
                        .update(task_id, |task| {
                            task.message = message;
                            task.progress = progress;
                            task.results = snapshot;
                        })
                        .await;
                }
            }
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(
            "batch {} completed: {}/{} audits succeeded",
            task_id,
            total - failed,
            total
        );

        self.registry
            .update(task_id, |task| {
                task.status = TaskStatus::Completed;
                task.message = "Audit completed successfully!".into();
                task.progress = 100.0;
                task.folder_name = Some(folder_name.clone());
                task.results = results;
            })
            .await;

        Ok(())
    }
}
