//! Dashboard application state.

use std::time::{Duration, Instant};

use crate::cache::SnapshotCache;
use crate::config::DashboardSettings;
use crate::display::WidgetData;
use crate::ui::Theme;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Main dashboard state.
pub struct App {
    pub running: bool,

    // Data
    cache: Box<dyn SnapshotCache>,
    settings: DashboardSettings,
    height: Option<u32>,
    pub data: Option<WidgetData>,
    pub load_error: Option<String>,
    pub last_loaded: Option<Instant>,

    // UI
    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a dashboard over `cache`. `height` overrides the configured
    /// widget height.
    pub fn new(
        cache: Box<dyn SnapshotCache>,
        settings: DashboardSettings,
        height: Option<u32>,
        theme: Theme,
    ) -> Self {
        Self {
            running: true,
            cache,
            settings,
            height,
            data: None,
            load_error: None,
            last_loaded: None,
            theme,
            status_message: None,
        }
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    /// Re-read the cached snapshot.
    ///
    /// Returns true if the cache was read. On failure the previous data is
    /// kept and the error is shown in the status bar.
    pub fn reload_data(&mut self) -> bool {
        match WidgetData::load(&self.settings, self.cache.as_ref()) {
            Ok(data) => {
                let data = match self.height {
                    Some(height) => data.with_height(height),
                    None => data,
                };
                self.data = Some(data);
                self.load_error = None;
                self.last_loaded = Some(Instant::now());
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cached snapshot");
                self.load_error = Some(e.to_string());
                false
            }
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}
