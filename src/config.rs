use crate::error::DocweaveError;
use crate::types::{FontSpec, Margins, PageLayout};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_MAX_WORKERS: &str = "DOCWEAVE_MAX_WORKERS";
pub const ENV_CHUNK_SIZE: &str = "DOCWEAVE_CHUNK_SIZE";
pub const ENV_PERF_LOG: &str = "DOCWEAVE_PERF_LOG";

pub const DEFAULT_TABLE_STYLE: &str = "Table Grid";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Session configuration. Read-only once a render starts.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub page_layout: PageLayout,
    pub font: FontSpec,
    pub error_font: FontSpec,
    pub table_style: String,
    pub heading_levels: u8,
    pub max_workers: usize,
    /// Row count above which a loaded table is rendered in chunks.
    pub chunk_size: usize,
    pub api_timeout: Duration,
    pub margins: Margins,
    /// Points.
    pub title_font_size: f32,
    /// Inches.
    pub base64_image_width: f32,
    /// Inches.
    pub header_logo_height: f32,
    pub perf_log: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_layout: PageLayout::default(),
            font: FontSpec::default(),
            error_font: FontSpec::error_default(),
            table_style: DEFAULT_TABLE_STYLE.to_string(),
            heading_levels: 6,
            max_workers: rayon::current_num_threads().max(1),
            chunk_size: DEFAULT_CHUNK_SIZE,
            api_timeout: DEFAULT_API_TIMEOUT,
            margins: Margins::all(1.0),
            title_font_size: 16.0,
            base64_image_width: 4.0,
            header_logo_height: 0.5,
            perf_log: None,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), DocweaveError> {
        if self.max_workers == 0 {
            return Err(DocweaveError::InvalidConfiguration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(DocweaveError::InvalidConfiguration(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.heading_levels == 0 {
            return Err(DocweaveError::InvalidConfiguration(
                "heading_levels must be at least 1".to_string(),
            ));
        }
        let dims = self.page_layout.dimensions();
        if !(dims.width > 0.0 && dims.height > 0.0) {
            return Err(DocweaveError::InvalidConfiguration(
                "page dimensions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies `DOCWEAVE_*` overrides. Unparseable values are rejected rather than ignored.
    pub fn apply_env(&mut self) -> Result<(), DocweaveError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), DocweaveError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_WORKERS) {
            self.max_workers = parse_count(ENV_MAX_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = parse_count(ENV_CHUNK_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PERF_LOG) {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.perf_log = Some(PathBuf::from(raw));
            }
        }
        Ok(())
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, DocweaveError> {
    raw.trim().parse::<usize>().map_err(|_| {
        DocweaveError::InvalidConfiguration(format!("{key} must be a positive integer, got {raw:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_replace_pool_and_chunk_settings() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_WORKERS, "3"),
            (ENV_CHUNK_SIZE, " 250 "),
            (ENV_PERF_LOG, "/tmp/perf.log"),
        ]
        .into_iter()
        .collect();
        let mut config = RenderConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("overrides");
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.perf_log, Some(PathBuf::from("/tmp/perf.log")));
    }

    #[test]
    fn non_numeric_override_is_invalid_configuration() {
        let mut config = RenderConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_CHUNK_SIZE).then(|| "lots".to_string()))
            .expect_err("should reject");
        assert!(matches!(err, DocweaveError::InvalidConfiguration(_)));
    }

    #[test]
    fn zero_workers_fail_validation() {
        let config = RenderConfig {
            max_workers: 0,
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RenderConfig::default().validate().is_ok());
    }
}
