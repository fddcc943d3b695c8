use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` provides one.
///
/// wgpu and naga log adapter and shader details at info; keep them at warn.
pub const DEFAULT_FILTER: &str = "warn,gxtex_engine=info,gxtex_studio=info";

/// Modules that log per-texture cache traffic (loads, reloads, copies, evictions).
const CACHE_TRAFFIC_MODULES: [&str; 2] = ["gxtex_engine::cache", "gxtex_engine::resources"];

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax and overrides both
/// `RUST_LOG` and [`DEFAULT_FILTER`]. `cache_traffic` raises the cache modules
/// to debug on top of whichever filter is in effect.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub cache_traffic: bool,
    /// Millisecond timestamps; off by default since replays are frame-driven.
    pub timestamps: bool,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            cache_traffic: false,
            timestamps: false,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Default filter plus cache traffic.
    pub fn verbose() -> Self {
        Self { cache_traffic: true, ..Self::default() }
    }

    /// Filter directives in effect given the value of `RUST_LOG`.
    pub fn filter_directives(&self, rust_log: Option<String>) -> String {
        let mut directives = self
            .env_filter
            .clone()
            .or(rust_log.filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        if self.cache_traffic {
            for module in CACHE_TRAFFIC_MODULES {
                directives.push_str(&format!(",{module}=debug"));
            }
        }
        directives
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let directives = config.filter_directives(std::env::var("RUST_LOG").ok());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&directives);
        if config.timestamps {
            builder.format_timestamp_millis();
        } else {
            builder.format_timestamp(None);
        }
        builder.write_style(config.write_style);
        builder.init();

        log::debug!("logging initialized: {directives}");
    });
}
