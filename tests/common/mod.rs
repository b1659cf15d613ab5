#![allow(dead_code)]

use async_trait::async_trait;
use simit_check::config::Config;
use simit_check::driver::{BestEffortError, DriverError, PageDriver};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 1x1 transparent PNG.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

pub const NO_FINES_PAGE: &str =
    "<html><body><div class='alert'>No hay multas registradas</div></body></html>";

pub fn fines_table(rows: &[Vec<&str>]) -> String {
    let body: String = rows
        .iter()
        .map(|cells| {
            let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
            format!("<tr>{tds}</tr>")
        })
        .collect();
    format!(
        "<html><body><table id='multaTable'><thead><tr><th>Tipo</th></tr></thead>\
         <tbody>{body}</tbody></table></body></html>"
    )
}

pub fn fine_row() -> Vec<&'static str> {
    vec![
        "Comparendo",
        "11001000000012345678",
        "ABC123",
        "Bogotá D.C.",
        "C02",
        "Pendiente",
        "$ 468.500",
        "$ 468.500",
    ]
}

/// Config rooted in `dir` with no pause between plates and no log file.
pub fn test_config(dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.screenshots_dir = dir.join("captures");
    cfg.paths.reports_dir = dir.join("reports");
    cfg.timing.between_plates_ms = 0;
    cfg.logging.write_to_file = false;
    cfg
}

/// In-memory stand-in for the browser: each plate maps to a canned page.
#[derive(Default)]
pub struct ScriptedDriver {
    pub pages: HashMap<String, String>,
    pub failing_plates: HashSet<String>,
    pub fail_open: bool,
    pub panic_on: Option<String>,
    pub write_screenshots: bool,
    pub closed: Arc<AtomicBool>,
    current: Option<String>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, plate: &str, html: impl Into<String>) -> Self {
        self.pages.insert(plate.to_string(), html.into());
        self
    }

    pub fn failing(mut self, plate: &str) -> Self {
        self.failing_plates.insert(plate.to_string());
        self
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn open(&mut self) -> Result<(), DriverError> {
        if self.fail_open {
            return Err(DriverError::Launch("no browser in test".into()));
        }
        Ok(())
    }

    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn dismiss_popup(&mut self) -> Result<(), BestEffortError> {
        Err(BestEffortError::new(
            "popup dismissal",
            DriverError::ElementMissing {
                selector: ".swal2-popup".into(),
                waited: std::time::Duration::ZERO,
            },
        ))
    }

    async fn submit_plate(&mut self, plate: &str) -> Result<(), DriverError> {
        if self.panic_on.as_deref() == Some(plate) {
            panic!("scripted driver crash on {plate}");
        }
        if self.failing_plates.contains(plate) {
            return Err(DriverError::ElementMissing {
                selector: "#txtBusqueda".into(),
                waited: std::time::Duration::from_secs(10),
            });
        }
        self.current = Some(plate.to_string());
        Ok(())
    }

    async fn page_html(&mut self) -> Result<String, DriverError> {
        let plate = self.current.as_deref().ok_or(DriverError::NotOpen)?;
        Ok(self
            .pages
            .get(plate)
            .cloned()
            .unwrap_or_else(|| NO_FINES_PAGE.to_string()))
    }

    async fn capture_screenshot(&mut self, path: &Path) -> Result<PathBuf, BestEffortError> {
        if !self.write_screenshots {
            return Err(BestEffortError::new(
                "screenshot",
                DriverError::Protocol("capture disabled".into()),
            ));
        }
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, TINY_PNG)
        };
        write().map_err(|e| BestEffortError::new("screenshot", e.into()))?;
        Ok(path.to_path_buf())
    }

    async fn close(&mut self) -> Result<(), BestEffortError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
