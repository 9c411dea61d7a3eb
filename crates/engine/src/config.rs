use crate::Error;
use clap::Parser;

/// Process configuration, sourced entirely from the environment (SPEC_FULL.md §6 / §4.12).
/// Parsed once at startup; `validate` rejects missing/non-positive values before any
/// connection attempt.
#[derive(Parser, Debug)]
#[command(author, version, about = "CDC ingestion and projection engine", long_about = None)]
pub struct Config {
    #[arg(long, env = "SOURCE_DSN")]
    pub source_dsn: String,

    #[arg(long, env = "SERVING_DSN")]
    pub serving_dsn: String,

    #[arg(long, env = "SOURCE_NAME", default_value = "source1")]
    pub source_name: String,

    #[arg(long, env = "POLL_INTERVAL_SECONDS", default_value_t = 5)]
    pub poll_interval_seconds: u64,

    #[arg(long, env = "CDC_BATCH_MAX_ROWS", default_value_t = 5000)]
    pub cdc_batch_max_rows: i64,

    #[arg(long, env = "PROJECTION_INTERVAL_SECONDS", default_value_t = 15)]
    pub projection_interval_seconds: u64,

    #[arg(long, env = "PROJECTION_RECOMPUTE_WINDOW_MINUTES", default_value_t = 15)]
    pub projection_recompute_window_minutes: i64,

    #[arg(long, env = "ENABLE_PROJ_ORDERS_KPI", default_value_t = true)]
    pub enable_proj_orders_kpi: bool,

    #[arg(long, env = "ENABLE_PROJ_ORDERS_LATEST", default_value_t = false)]
    pub enable_proj_orders_latest: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.source_dsn.is_empty() {
            return Err(Error::Configuration("SOURCE_DSN must not be empty".into()));
        }
        if self.serving_dsn.is_empty() {
            return Err(Error::Configuration("SERVING_DSN must not be empty".into()));
        }
        if self.poll_interval_seconds == 0 {
            return Err(Error::Configuration(
                "POLL_INTERVAL_SECONDS must be positive".into(),
            ));
        }
        if self.cdc_batch_max_rows <= 0 {
            return Err(Error::Configuration(
                "CDC_BATCH_MAX_ROWS must be positive".into(),
            ));
        }
        if self.projection_interval_seconds == 0 {
            return Err(Error::Configuration(
                "PROJECTION_INTERVAL_SECONDS must be positive".into(),
            ));
        }
        if self.projection_recompute_window_minutes <= 0 {
            return Err(Error::Configuration(
                "PROJECTION_RECOMPUTE_WINDOW_MINUTES must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            source_dsn: "postgres://localhost/source".into(),
            serving_dsn: "postgres://localhost/serving".into(),
            source_name: "source1".into(),
            poll_interval_seconds: 5,
            cdc_batch_max_rows: 5000,
            projection_interval_seconds: 15,
            projection_recompute_window_minutes: 15,
            enable_proj_orders_kpi: true,
            enable_proj_orders_latest: false,
            log_level: "info".into(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = base();
        config.poll_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_batch_size_is_rejected() {
        let mut config = base();
        config.cdc_batch_max_rows = 0;
        assert!(config.validate().is_err());
    }
}
