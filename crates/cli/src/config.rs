use std::path::PathBuf;

use scrapefin_metadata::EngineConfig;

/// Settings for one `scrapefin` run.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: String,
    pub library: Option<PathBuf>,
    pub catalog_dir: PathBuf,
    pub engine: EngineConfig,
}

impl CliConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any `SCRAPEFIN_*` variable source; unset or unparsable
    /// values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineConfig::default();

        let archive_hosts = lookup("SCRAPEFIN_ARCHIVE_HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.archive_hosts);

        let engine = EngineConfig {
            asset_dir: lookup("SCRAPEFIN_ASSET_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.asset_dir),
            archive_hosts,
            default_language: lookup("SCRAPEFIN_LANGUAGE").unwrap_or(defaults.default_language),
            http_timeout_secs: lookup("SCRAPEFIN_HTTP_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
        };

        Self {
            db_path: lookup("SCRAPEFIN_DB").unwrap_or_else(|| "scrapefin.db".to_string()),
            library: lookup("SCRAPEFIN_LIBRARY").map(PathBuf::from),
            catalog_dir: lookup("SCRAPEFIN_CATALOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("catalog")),
            engine,
        }
    }
}
