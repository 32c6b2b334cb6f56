use std::path::PathBuf;

/// Runtime settings, read from `CHAIRSIDE_*` environment variables by
/// embedding binaries. Tests construct this directly.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding one WAL file per tenant.
    pub data_dir: PathBuf,
    /// WAL appends since last compaction before the compactor rewrites the log.
    pub compact_threshold: u64,
    /// Prometheus exporter port; `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("CHAIRSIDE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            compact_threshold: std::env::var("CHAIRSIDE_COMPACT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: std::env::var("CHAIRSIDE_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.data_dir, PathBuf::from("./data"));
        assert_eq!(s.compact_threshold, 1000);
        assert!(s.metrics_port.is_none());
    }
}
