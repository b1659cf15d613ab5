pub mod chrome;
pub mod types;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use types::{BestEffortError, DriverError};

/// A controlled browser session pointed at the lookup site.
///
/// One value drives one job; it is opened once, used for every plate in
/// order, and closed on every exit path.
#[async_trait]
pub trait PageDriver: Send {
    async fn open(&mut self) -> Result<(), DriverError>;
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;
    async fn dismiss_popup(&mut self) -> Result<(), BestEffortError>;
    async fn submit_plate(&mut self, plate: &str) -> Result<(), DriverError>;
    async fn page_html(&mut self) -> Result<String, DriverError>;
    async fn capture_screenshot(&mut self, path: &Path) -> Result<PathBuf, BestEffortError>;
    async fn close(&mut self) -> Result<(), BestEffortError>;
}

pub type DriverFactory = std::sync::Arc<dyn Fn() -> Box<dyn PageDriver> + Send + Sync>;
