/// The filter used when neither the configuration nor the environment names one.
pub const DEFAULT_LOG_FILTER: &str = "pane_host=info,pane_example=info,wasmi=warn";

/// How the bridge's diagnostics are printed. `filter` and the contents of
/// `env_var` use the `env_logger` directive syntax, for example
/// `"pane_host=trace,wasmi=warn"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub env_var: &'static str,
    pub timestamps: bool,
    pub write_style: env_logger::WriteStyle
}

impl LoggingConfig {
    /// The directives that will be applied: the explicit filter, then the
    /// environment variable, then [`DEFAULT_LOG_FILTER`].
    pub fn resolve_filter(&self) -> String {
        self.filter.clone()
            .or_else(|| std::env::var(self.env_var).ok().filter(|x| !x.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            env_var: "PANE_LOG",
            timestamps: true,
            write_style: env_logger::WriteStyle::Auto
        }
    }
}

/// Installs `env_logger` as the global logger. Returns `false` if a logger
/// was already installed, in which case nothing changes.
pub fn init_logging(config: LoggingConfig) -> bool {
    let filter = config.resolve_filter();
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter)
        .write_style(config.write_style)
        .format_target(true);

    if config.timestamps {
        builder.format_timestamp_millis();
    }
    else {
        builder.format_timestamp(None);
    }

    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!("Logging to stderr with filter '{filter}'");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            filter: Some("pane_host=trace".to_string()),
            env_var: "PANE_LOG_UNSET_FOR_TESTS",
            ..Default::default()
        };
        assert_eq!(config.resolve_filter(), "pane_host=trace");
    }

    #[test]
    fn falls_back_to_project_targets() {
        let config = LoggingConfig {
            env_var: "PANE_LOG_UNSET_FOR_TESTS",
            ..Default::default()
        };
        assert_eq!(config.resolve_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn second_install_is_ignored() {
        init_logging(LoggingConfig::default());
        assert!(!init_logging(LoggingConfig::default()));
    }
}
