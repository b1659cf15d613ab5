use super::{BestEffortError, DriverError, PageDriver};
use crate::config::Config;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

/// Chrome over the DevTools protocol.
pub struct ChromeDriver {
    cfg: Config,
    session: Option<Session>,
}

impl ChromeDriver {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            session: None,
        }
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.session
            .as_ref()
            .map(|s| &s.page)
            .ok_or(DriverError::NotOpen)
    }

    fn ms(&self, ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn browser_config(&self) -> Result<BrowserConfig, DriverError> {
        let b = &self.cfg.browser;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(b.window_width, b.window_height)
            .args(b.extra_args.iter().cloned());
        if !b.headless.is_headless() {
            builder = builder.with_head();
        }
        if let Some(exe) = &b.executable {
            builder = builder.chrome_executable(exe);
        }
        builder.build().map_err(DriverError::Launch)
    }

    async fn eval_bool(&self, js: &str) -> Result<bool, DriverError> {
        let value = self.page()?.evaluate(js).await?;
        value
            .into_value::<bool>()
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    /// Polls `js` until it evaluates to `true` or `timeout` passes.
    async fn wait_for_js(&self, js: &str, timeout: Duration) -> bool {
        let started = Instant::now();
        let interval = self.ms(self.cfg.timing.poll_interval_ms.max(10));
        loop {
            match self.eval_bool(js).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => debug!("condition poll failed: {err}"),
            }
            if started.elapsed() >= timeout {
                return false;
            }
            sleep(interval).await;
        }
    }

    async fn wait_for_element(&self, css: &str, timeout: Duration) -> Result<Element, DriverError> {
        let started = Instant::now();
        let interval = self.ms(self.cfg.timing.poll_interval_ms.max(10));
        loop {
            if let Ok(el) = self.page()?.find_element(css).await {
                return Ok(el);
            }
            if started.elapsed() >= timeout {
                return Err(DriverError::ElementMissing {
                    selector: css.to_string(),
                    waited: timeout,
                });
            }
            sleep(interval).await;
        }
    }

    /// JS that turns true once the results table or a no-results message has rendered.
    fn results_marker_js(&self) -> String {
        let det = &self.cfg.detection;
        let id = serde_json::to_string(&det.table_id).unwrap_or_else(|_| "\"\"".into());
        let phrases: Vec<String> = det
            .no_result_phrases
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        let phrases = serde_json::to_string(&phrases).unwrap_or_else(|_| "[]".into());
        format!(
            "(() => {{ if (document.getElementById({id})) return true; \
             const t = ((document.body && document.body.innerText) || '').toLowerCase(); \
             return {phrases}.some(p => t.includes(p)); }})()"
        )
    }

    fn clear_field_js(&self) -> String {
        let id =
            serde_json::to_string(&self.cfg.site.search_field_id).unwrap_or_else(|_| "\"\"".into());
        format!(
            "(() => {{ const el = document.getElementById({id}); if (!el) return false; \
             el.value = ''; el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()"
        )
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn open(&mut self) -> Result<(), DriverError> {
        let config = self.browser_config()?;
        info!(
            headless = self.cfg.browser.headless.is_headless(),
            "launching browser"
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(e.to_string()));
            }
        };

        self.session = Some(Session {
            browser,
            page,
            handler_task,
        });
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let ready = self
            .wait_for_js(
                "document.readyState === 'complete'",
                self.ms(self.cfg.timing.ready_timeout_ms),
            )
            .await;
        if !ready {
            warn!(%url, "page did not report readyState=complete in time");
        }
        // Client-side rendering continues after readyState; give it a fixed grace.
        sleep(self.ms(self.cfg.timing.settle_ms)).await;
        Ok(())
    }

    async fn dismiss_popup(&mut self) -> Result<(), BestEffortError> {
        let popup = format!(".{}", self.cfg.site.popup_class);
        let confirm = format!(".{}", self.cfg.site.popup_confirm_class);
        self.wait_for_element(&popup, self.ms(self.cfg.timing.popup_wait_ms))
            .await
            .map_err(|e| BestEffortError::new("popup dismissal", e))?;

        let page = self
            .page()
            .map_err(|e| BestEffortError::new("popup dismissal", e))?;
        let button = page
            .find_element(confirm.as_str())
            .await
            .map_err(|e| BestEffortError::new("popup dismissal", e.into()))?;
        button
            .click()
            .await
            .map_err(|e| BestEffortError::new("popup dismissal", e.into()))?;
        sleep(self.ms(self.cfg.timing.popup_close_pause_ms)).await;
        Ok(())
    }

    async fn submit_plate(&mut self, plate: &str) -> Result<(), DriverError> {
        let t = self.cfg.timing.clone();
        let field_css = format!("#{}", self.cfg.site.search_field_id);
        let field = self
            .wait_for_element(&field_css, self.ms(t.field_wait_ms))
            .await?;

        field.click().await?;
        self.page()?.evaluate(self.clear_field_js()).await?;
        sleep(self.ms(t.clear_pause_ms)).await;

        field.type_str(plate).await?;
        sleep(self.ms(t.type_pause_ms)).await;
        field.press_key("Enter").await?;

        let rendered = self
            .wait_for_js(&self.results_marker_js(), self.ms(t.results_wait_ms))
            .await;
        if !rendered {
            debug!(%plate, "no results marker seen; continuing after grace delay");
        }
        sleep(self.ms(t.results_settle_ms)).await;
        Ok(())
    }

    async fn page_html(&mut self) -> Result<String, DriverError> {
        Ok(self.page()?.content().await?)
    }

    async fn capture_screenshot(&mut self, path: &Path) -> Result<PathBuf, BestEffortError> {
        let fail = |e: DriverError| BestEffortError::new("screenshot", e);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.into()))?;
        }
        let page = self.page().map_err(fail)?;
        page.evaluate("window.scrollTo(0, 0)")
            .await
            .map_err(|e| fail(e.into()))?;
        sleep(self.ms(self.cfg.timing.scroll_pause_ms)).await;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        page.save_screenshot(params, path)
            .await
            .map_err(|e| fail(e.into()))?;

        if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(fail(DriverError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("screenshot not written: {}", path.display()),
            ))))
        }
    }

    async fn close(&mut self) -> Result<(), BestEffortError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let closed = session.browser.close().await;
        let _ = session.browser.wait().await;
        session.handler_task.abort();
        closed
            .map(|_| ())
            .map_err(|e| BestEffortError::new("session teardown", e.into()))
    }
}
