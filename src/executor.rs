use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::{
    browser_controller::BrowserController,
    devices::DeviceProfile,
    report::{self, AuditReport, RawAuditData, AUDIT_SCRIPT},
    storage::Storage,
    types::AuditError,
    utils::{filename_timestamp, path_slug, REPORTS_DIR},
};

/// Runs one audit (one url x one device profile), persists the artifact and
/// returns its location. A failure here is always recoverable for the
/// caller: the batch records it and moves on.
#[async_trait]
pub trait AuditExecutor: Send + Sync {
    async fn run_one(
        &self,
        url: &str,
        profile: &DeviceProfile,
        folder_name: &str,
    ) -> anyhow::Result<String>;
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ExecutorOptions {
    // browser idle timeout in seconds
    #[builder(default = "45")]
    pub browser_timeout: u64,
    // seconds to let the page settle after navigation before measuring
    #[builder(default = "2")]
    pub settle_wait: u64,
}

impl ExecutorOptions {
    pub fn default_builder() -> ExecutorOptionsBuilder {
        ExecutorOptionsBuilder::default()
    }
}

/// Production executor: drives an isolated headless Chrome per audit.
pub struct ChromeExecutor {
    storage: Arc<dyn Storage>,
    options: ExecutorOptions,
}

impl ChromeExecutor {
    pub fn new(storage: Arc<dyn Storage>, options: ExecutorOptions) -> Self {
        ChromeExecutor { storage, options }
    }

    async fn audit(
        &self,
        browser: &BrowserController,
        url: &str,
        profile: &DeviceProfile,
    ) -> anyhow::Result<AuditReport> {
        let tab = browser
            .open(url, profile, Duration::from_secs(self.options.settle_wait))
            .await?;

        let result = tab
            .evaluate(AUDIT_SCRIPT, true)
            .context(format!("audit script failed on {}", url))?;
        let payload = match result.value {
            Some(serde_json::Value::String(payload)) => payload,
            other => return Err(anyhow!("audit script returned no report: {:?}", other)),
        };

        let raw: RawAuditData = serde_json::from_str(&payload)
            .context(format!("could not parse audit payload for {}", url))?;
        Ok(AuditReport::from_raw(url, &profile.name, raw))
    }

    async fn run_inner(
        &self,
        url: &str,
        profile: &DeviceProfile,
        folder_name: &str,
    ) -> anyhow::Result<String> {
        info!("auditing {} with profile {}", url, profile.name);

        let browser = BrowserController::new(
            profile,
            Duration::from_secs(self.options.browser_timeout),
        )
        .context("could not acquire a browser for this audit")?;

        // browser is killed when it drops, on success and failure alike
        let report = self.audit(&browser, url, profile).await?;

        let filename = artifact_filename(url, &profile.name, Utc::now())?;
        let path = format!("{}/{}/{}", REPORTS_DIR, folder_name, filename);
        let html = report::render_html(&report);

        let location = self
            .storage
            .write_file(&path, html.as_bytes())
            .await
            .context(format!("could not persist report at {}", path))?;

        info!("saved report for {} ({}) at {}", url, profile.name, location.url);
        Ok(location.url)
    }
}

#[async_trait]
impl AuditExecutor for ChromeExecutor {
    async fn run_one(
        &self,
        url: &str,
        profile: &DeviceProfile,
        folder_name: &str,
    ) -> anyhow::Result<String> {
        match self.run_inner(url, profile, folder_name).await {
            Ok(location) => Ok(location),
            Err(e) => Err(AuditError::Execution(format!("{:#}", e)).into()),
        }
    }
}

/// Stable artifact filename: `{pathSlug}-{deviceProfileName}-{timestamp}.html`.
pub fn artifact_filename(url: &str, device: &str, ts: DateTime<Utc>) -> anyhow::Result<String> {
    let parsed = Url::parse(url).context(format!("audit url is invalid: {}", url))?;
    Ok(format!(
        "{}-{}-{}.html",
        path_slug(parsed.path()),
        device,
        filename_timestamp(ts)
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filenames_follow_the_artifact_layout() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 7, 12, 30, 5).unwrap();
        let name = artifact_filename("https://ex.com/", "mobile", ts).unwrap();
        assert_eq!(name, "home-mobile-2026-08-07T12-30-05-000Z.html");

        let name = artifact_filename("https://ex.com/about-us!!", "desktop", ts).unwrap();
        assert!(name.starts_with("about-us-desktop-"));
        assert!(name.ends_with(".html"));
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(artifact_filename("not a url", "mobile", Utc::now()).is_err());
    }
}
