use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::{Stream, StreamExt};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use super::config::SessionOptions;
use crate::error::PipelineError;

/// Well-known install locations, probed after the explicit override.
pub const KNOWN_EXECUTABLES: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/opt/google/chrome/chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

/// Flags for running inside containers and hosted functions, where the
/// Chromium sandbox cannot be set up.
pub const SANDBOX_FREE_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-zygote",
];

/// Ordered executable candidates: the override first, then known paths.
pub fn executable_candidates(override_path: Option<&Path>) -> Vec<PathBuf> {
    override_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(KNOWN_EXECUTABLES.iter().map(PathBuf::from))
        .collect()
}

/// First candidate that exists on disk. `None` leaves the choice to the
/// renderer library's own default detection.
pub fn resolve_executable(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if !path.is_file() {
            tracing::warn!(
                "Browser override {} does not exist, probing known locations",
                path.display()
            );
        }
    }

    executable_candidates(override_path)
        .into_iter()
        .find(|candidate| candidate.is_file())
}

/// Drive a CDP event stream until it ends. A message that fails to decode is
/// logged and skipped; only the end of the stream stops the pump. Returns the
/// number of events seen.
pub async fn pump_events<S, E>(mut events: S) -> usize
where
    S: Stream<Item = Result<(), E>> + Unpin,
    E: std::fmt::Display,
{
    let mut seen = 0;
    while let Some(event) = events.next().await {
        seen += 1;
        if let Err(e) = event {
            tracing::debug!("Skipping undecodable browser event: {}", e);
        }
    }
    tracing::debug!("Browser event stream ended after {} events", seen);
    seen
}

fn user_agent_override(user_agent: &str) -> SetUserAgentOverrideParams {
    SetUserAgentOverrideParams::new(user_agent)
}

/// A launched browser plus the task pumping its DevTools event stream.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    launched_at: Instant,
}

impl BrowserSession {
    async fn launch(options: &SessionOptions) -> Result<Self, PipelineError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .args(SANDBOX_FREE_ARGS.iter().copied())
            .window_size(options.window_width, options.window_height)
            .viewport(Viewport {
                width: options.window_width,
                height: options.window_height,
                ..Default::default()
            })
            .launch_timeout(options.launch_timeout)
            .request_timeout(options.request_timeout);

        match resolve_executable(options.executable_override.as_deref()) {
            Some(path) => {
                tracing::info!("Launching browser from {}", path.display());
                builder = builder.chrome_executable(path);
            }
            None => tracing::info!("No known browser install found, using default detection"),
        }

        let config = builder.build().map_err(PipelineError::SessionLaunch)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| PipelineError::SessionLaunch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            pump_events(handler).await;
        });

        Ok(Self {
            browser,
            handler_task,
            launched_at: Instant::now(),
        })
    }

    /// The browser is gone once its event stream has stopped.
    pub fn is_alive(&self) -> bool {
        !self.handler_task.is_finished()
    }

    /// Open a fresh tab for one cycle. The caller owns the tab and must hand
    /// it to [`close_page`] on every exit path.
    pub async fn open_page(&self, user_agent: &str) -> Result<Page, PipelineError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PipelineError::Render(format!("Failed to open page: {}", e)))?;

        if let Err(e) = page
            .set_user_agent(user_agent_override(user_agent))
            .await
        {
            close_page(page).await;
            return Err(PipelineError::Render(format!(
                "Failed to set user agent: {}",
                e
            )));
        }

        Ok(page)
    }

    async fn close(mut self) -> anyhow::Result<()> {
        let uptime = self.launched_at.elapsed();
        let result = self
            .browser
            .close()
            .await
            .context("Browser close command failed");
        if result.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();
        tracing::info!("Browser session closed after {:.0}s", uptime.as_secs_f64());
        result.map(|_| ())
    }
}

/// Release a cycle's tab. Failures are logged, never raised.
pub async fn close_page(page: Page) {
    if let Err(e) = page.close().await {
        tracing::debug!("Failed to close page: {}", e);
    }
}

/// Owner of the process-wide browser session.
///
/// The session is launched lazily, reused across cycles and released exactly
/// once by [`SessionManager::shutdown`]. Holding the guard returned by
/// [`SessionManager::ensure_session`] gives a cycle exclusive use of the
/// session.
pub struct SessionManager {
    options: SessionOptions,
    slot: Mutex<Option<BrowserSession>>,
    shut_down: AtomicBool,
}

impl SessionManager {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            slot: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Return the live session, launching one if there is none or the
    /// previous one died. A launch failure is returned as-is, not retried.
    pub async fn ensure_session(&self) -> Result<MappedMutexGuard<'_, BrowserSession>, PipelineError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PipelineError::SessionLaunch(
                "session manager is shut down".to_string(),
            ));
        }

        let mut slot = self.slot.lock().await;

        // A shutdown may have run while this call waited for the lock.
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PipelineError::SessionLaunch(
                "session manager is shut down".to_string(),
            ));
        }

        if slot.as_ref().is_some_and(|session| !session.is_alive()) {
            tracing::warn!("Browser session died, relaunching");
            if let Some(dead) = slot.take() {
                let _ = dead.close().await;
            }
        }

        if slot.is_none() {
            let started = Instant::now();
            let session = BrowserSession::launch(&self.options).await?;
            tracing::info!(
                "Browser session launched in {}ms",
                started.elapsed().as_millis()
            );
            *slot = Some(session);
        }

        MutexGuard::try_map(slot, |slot| slot.as_mut()).map_err(|_| {
            PipelineError::SessionLaunch("browser session missing after launch".to_string())
        })
    }

    /// Whether a session is currently held (launched and not yet released).
    pub async fn has_session(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Release the session. Only the first call does anything; a failing
    /// close is logged and ignored.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = self.slot.lock().await.take();
        match session {
            Some(session) => {
                if let Err(e) = session.close().await {
                    tracing::warn!("Ignoring browser shutdown failure: {:#}", e);
                }
            }
            None => tracing::debug!("No browser session to release"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_candidates_start_with_override() {
        let candidates = executable_candidates(Some(Path::new("/custom/chrome")));
        assert_eq!(candidates[0], PathBuf::from("/custom/chrome"));
        assert_eq!(candidates.len(), KNOWN_EXECUTABLES.len() + 1);
    }

    #[test]
    fn test_candidates_without_override() {
        let candidates = executable_candidates(None);
        assert_eq!(candidates[0], PathBuf::from(KNOWN_EXECUTABLES[0]));
    }

    #[test]
    fn test_existing_override_wins() {
        // The test binary itself is a file that is guaranteed to exist.
        let exe = std::env::current_exe().unwrap();
        assert_eq!(resolve_executable(Some(&exe)), Some(exe));
    }

    #[test]
    fn test_missing_override_falls_through() {
        let resolved = resolve_executable(Some(Path::new("/definitely/not/a/browser")));
        assert_ne!(resolved, Some(PathBuf::from("/definitely/not/a/browser")));
    }

    #[tokio::test]
    async fn test_shutdown_without_session_is_noop() {
        let manager = SessionManager::new(SessionOptions::default());
        manager.shutdown().await;
        manager.shutdown().await;
        assert!(!manager.has_session().await);
    }

    #[tokio::test]
    async fn test_ensure_session_after_shutdown_fails() {
        let manager = SessionManager::new(SessionOptions::default());
        manager.shutdown().await;
        let result = manager.ensure_session().await;
        assert!(matches!(result, Err(PipelineError::SessionLaunch(_))));
    }

    #[test]
    fn test_user_agent_override_uses_network_domain() {
        let params = user_agent_override("market-snapshot/1.0");
        assert_eq!(params.user_agent, "market-snapshot/1.0");
        assert!(params.accept_language.is_none());
    }

    #[tokio::test]
    async fn test_event_pump_survives_decode_errors() {
        let events = futures::stream::iter(vec![
            Ok(()),
            Err("unknown method Page.somethingNew"),
            Ok(()),
            Err("invalid type: null"),
            Ok(()),
        ]);
        assert_eq!(pump_events(events).await, 5);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_lock_prevents_launch() {
        let manager = Arc::new(SessionManager::new(SessionOptions::default()));
        let held = manager.slot.lock().await;

        let waiter = Arc::clone(&manager);
        let pending = tokio::spawn(async move {
            waiter
                .ensure_session()
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        });

        // Let the spawned call pass the first check and block on the lock.
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        manager.shut_down.store(true, Ordering::SeqCst);
        drop(held);

        let err = pending.await.unwrap().unwrap_err();
        assert!(err.contains("session manager is shut down"), "{}", err);
        assert!(!manager.has_session().await);
    }

    #[tokio::test]
    #[ignore] // Requires a local Chromium install
    async fn test_launch_and_reuse_session() {
        let manager = SessionManager::new(SessionOptions::default());
        {
            let session = manager.ensure_session().await.unwrap();
            assert!(session.is_alive());
        }
        assert!(manager.has_session().await);
        {
            let session = manager.ensure_session().await.unwrap();
            let page = session.open_page("test-agent").await.unwrap();
            close_page(page).await;
        }
        manager.shutdown().await;
        assert!(!manager.has_session().await);
    }
}
