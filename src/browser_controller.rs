use anyhow::{anyhow, Context, Result};
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tokio::time::sleep;

use crate::devices::DeviceProfile;

/// One isolated browser process, scoped to a single audit. Nothing is shared
/// across audits: each controller launches its own process and kills it on
/// drop, so cookies/cache/storage never leak between profile runs.
pub struct BrowserController {
    browser: Browser,
}

impl BrowserController {
    pub fn new(profile: &DeviceProfile, idle_timeout: Duration) -> Result<Self> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let executable = default_executable()
            .map_err(|e| anyhow!("could not find a chrome binary: {}", e))?;
        let options = LaunchOptions::default_builder()
            .path(Some(executable))
            .window_size(Some((
                profile.screen_emulation.width,
                profile.screen_emulation.height,
            )))
            .idle_browser_timeout(idle_timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("could not build browser launch options: {}", e))?;
        let browser = Browser::new(options).context("browser launching error")?;

        Ok(BrowserController { browser })
    }

    /// Opens `url` in a fresh incognito context with the profile's user
    /// agent applied, waits for navigation and lets late resources land.
    pub async fn open(
        &self,
        url: &str,
        profile: &DeviceProfile,
        settle_wait: Duration,
    ) -> Result<Arc<Tab>> {
        let ctx = self
            .browser
            .new_context()
            .context("could not create incognito context")?;
        let tab = ctx.new_tab().context("could not create new tab")?;

        tab.set_user_agent(&profile.user_agent, None, None)
            .context(format!("could not override user agent for {}", url))?;

        let nv = match tab.navigate_to(url) {
            Ok(t) => t,
            Err(e) => {
                error!("could not navigate to {} with error {}", url, e);
                tab.navigate_to(url)?
            }
        };
        if let Err(e) = nv.wait_until_navigated() {
            // we wait one more timeout
            warn!("error waiting for navigation, retrying {}", e);
            nv.wait_until_navigated()?;
        }

        debug!("settling {} for {:?}", url, settle_wait);
        sleep(settle_wait).await;

        Ok(tab)
    }

    pub fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => pid,
            None => return false,
        };
        let s = System::new();
        if let Some(process) = s.process(Pid::from_u32(pid)) {
            debug!("killing process with id {}", pid);
            process.kill();
            return true;
        }
        false
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}
