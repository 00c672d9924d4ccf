use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use auditor::{
    executor::{ChromeExecutor, ExecutorOptions},
    service::AuditService,
    storage::{self, StorageConfig, BLOB_API_URL},
    types::{AuditConfig, TaskStatus},
};
use clap::Parser;
use tokio::time::sleep;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Site Audit Batch CLI", long_about = None)]
struct Args {
    /// Path to the audit config JSON file (base url + paths)
    config: PathBuf,
    /// Overrides the config name used for the report folder
    #[arg(short = 'n', long)]
    name: Option<String>,
    /// Store reports in the remote blob store instead of the local filesystem
    #[arg(long, default_value_t = false)]
    blob: bool,
    /// Maximum time the browser will wait for an event before timing out
    #[arg(long, default_value_t = 45)]
    browser_timeout: u64,
    /// Seconds to let a page settle after navigation before measuring
    #[arg(long, default_value_t = 2)]
    settle_wait: u64,
    /// Poll interval for task status in milliseconds
    #[arg(short = 'p', long, default_value_t = 500)]
    poll_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let config = AuditConfig::from_file(&args.config)?;

    let config_name = args.name.clone().or_else(|| {
        args.config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    });

    // the backend is decided once here and injected; nothing downstream
    // looks at the environment again
    let storage_config = if args.blob {
        let token = std::env::var("BLOB_READ_WRITE_TOKEN")
            .context("--blob requires BLOB_READ_WRITE_TOKEN to be set")?;
        let api_url = std::env::var("BLOB_API_URL").unwrap_or_else(|_| BLOB_API_URL.into());
        StorageConfig::Blob { api_url, token }
    } else {
        let root = std::env::current_dir().context("could not resolve working directory")?;
        StorageConfig::Local { root }
    };
    let storage = storage::from_config(storage_config);

    let options = ExecutorOptions::default_builder()
        .browser_timeout(args.browser_timeout)
        .settle_wait(args.settle_wait)
        .build()?;
    let executor = Arc::new(ChromeExecutor::new(storage.clone(), options));

    let service = AuditService::new(storage, executor);

    let task_id = service.submit(config, config_name).await?;
    println!("audit started, task id {}", task_id);

    loop {
        sleep(Duration::from_millis(args.poll_interval)).await;

        let task = match service.status(&task_id).await {
            Some(task) => task,
            None => return Err(anyhow!("task {} disappeared from the registry", task_id)),
        };

        match task.status {
            TaskStatus::Running => {
                println!("{} ({:.0}%)", task.message, task.progress);
            }
            TaskStatus::Completed => {
                let folder = task.folder_name.unwrap_or_default();
                println!("done: {} reports in {}", task.results.len(), folder);
                for result in &task.results {
                    if result.success {
                        println!(
                            "  ok   {} [{}] -> {}",
                            result.url,
                            result.device,
                            result.artifact_path.as_deref().unwrap_or("-")
                        );
                    } else {
                        println!(
                            "  fail {} [{}]: {}",
                            result.url,
                            result.device,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
                break;
            }
            TaskStatus::Error => {
                return Err(anyhow!("audit failed: {}", task.message));
            }
        }
    }

    Ok(())
}
