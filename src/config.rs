use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub site: Site,
    #[serde(default)]
    pub browser: Browser,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub detection: Detection,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Loads `path` when given, otherwise falls back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

impl Server {
    /// Port precedence: explicit flag, then the `PORT` variable, then the file.
    pub fn resolve_port(&self, flag: Option<u16>, env_port: Option<&str>) -> u16 {
        if let Some(p) = flag {
            return p;
        }
        env_port
            .and_then(|raw| raw.trim().parse::<u16>().ok())
            .unwrap_or(self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    pub url: String,
    pub search_field_id: String,
    pub popup_class: String,
    pub popup_confirm_class: String,
}
impl Default for Site {
    fn default() -> Self {
        Self {
            url: "https://www.fcm.org.co/simit/#/home-public".into(),
            search_field_id: "txtBusqueda".into(),
            popup_class: "swal2-popup".into(),
            popup_confirm_class: "swal2-confirm".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadlessMode {
    Auto,
    Always,
    Never,
}

impl HeadlessMode {
    /// `Auto` runs headless on Linux, where deployments have no display.
    pub fn is_headless(self) -> bool {
        match self {
            HeadlessMode::Auto => cfg!(target_os = "linux"),
            HeadlessMode::Always => true,
            HeadlessMode::Never => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Browser {
    pub headless: HeadlessMode,
    pub executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub extra_args: Vec<String>,
}
impl Default for Browser {
    fn default() -> Self {
        Self {
            headless: HeadlessMode::Auto,
            executable: None,
            window_width: 1920,
            window_height: 1080,
            extra_args: vec![
                "--disable-dev-shm-usage".into(),
                "--disable-gpu".into(),
                "--disable-extensions".into(),
            ],
        }
    }
}

/// Every wait the browser session performs, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub ready_timeout_ms: u64,
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub popup_wait_ms: u64,
    pub popup_close_pause_ms: u64,
    pub field_wait_ms: u64,
    pub clear_pause_ms: u64,
    pub type_pause_ms: u64,
    pub results_wait_ms: u64,
    pub results_settle_ms: u64,
    pub scroll_pause_ms: u64,
    pub between_plates_ms: u64,
}
impl Default for Timing {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 20_000,
            settle_ms: 5_000,
            poll_interval_ms: 250,
            popup_wait_ms: 2_000,
            popup_close_pause_ms: 1_000,
            field_wait_ms: 10_000,
            clear_pause_ms: 500,
            type_pause_ms: 1_000,
            results_wait_ms: 8_000,
            results_settle_ms: 2_000,
            scroll_pause_ms: 1_000,
            between_plates_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub screenshots_dir: PathBuf,
    pub reports_dir: PathBuf,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            screenshots_dir: "captures".into(),
            reports_dir: "reports".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Detection {
    pub table_id: String,
    pub min_cells: usize,
    /// Row texts (lowercased) that mark a "nothing found" placeholder row.
    pub no_result_phrases: Vec<String>,
    /// Matched case-sensitively against an element's own text nodes.
    pub negative_messages: Vec<String>,
    pub negative_phrases: Vec<String>,
    pub positive_phrases: Vec<String>,
}
impl Default for Detection {
    fn default() -> Self {
        Self {
            table_id: "multaTable".into(),
            min_cells: 6,
            no_result_phrases: vec![
                "no se encontraron".into(),
                "sin multas".into(),
                "no hay multas".into(),
                "no tiene multas".into(),
            ],
            negative_messages: vec![
                "No se encontraron".into(),
                "sin multas".into(),
                "No hay multas".into(),
            ],
            negative_phrases: vec![
                "no se encontraron multas".into(),
                "sin multas registradas".into(),
                "no hay multas".into(),
                "no tiene multas".into(),
                "sin infracciones".into(),
                "no se encontraron infracciones".into(),
            ],
            positive_phrases: vec![
                "valor a pagar".into(),
                "cobro coactivo".into(),
                "secretaría".into(),
                "infracción".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub min_bytes: u64,
    pub image_width: u32,
    pub image_height: u32,
    pub image_row_height: f64,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            min_bytes: 1000,
            image_width: 300,
            image_height: 150,
            image_row_height: 120.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "logs/simit-check.log".into(),
        }
    }
}
