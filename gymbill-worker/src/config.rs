/// Configuration management for the billing worker
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `BILLING_TIMEZONE`: IANA time zone of the business date (default: UTC)
/// - `BILLING_RUN_AT`: Local time of the daily run, `HH:MM` (default: 02:00)
/// - `BILLING_RUN_ON_START`: Run once immediately at startup (default: false)
/// - `RUST_LOG`: Log level (default: gymbill_worker=debug)
///
/// # Example
///
/// ```no_run
/// use gymbill_worker::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Billing runs daily at {} {}", config.schedule.run_at, config.schedule.timezone);
/// # Ok(())
/// # }
/// ```

use chrono::NaiveTime;
use chrono_tz::Tz;
use std::env;

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// When the daily billing run fires
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Time zone that defines the business date
    pub timezone: Tz,

    /// Local time of the daily run
    pub run_at: NaiveTime,

    /// Run once at startup before waiting for the first tick
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            timezone: Tz::UTC,
            run_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
            run_on_start: false,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` is missing
    /// - A variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let defaults = ScheduleConfig::default();
        let timezone = match env::var("BILLING_TIMEZONE") {
            Ok(name) => parse_timezone(&name)?,
            Err(_) => defaults.timezone,
        };
        let run_at = match env::var("BILLING_RUN_AT") {
            Ok(value) => parse_run_at(&value)?,
            Err(_) => defaults.run_at,
        };
        let run_on_start = match env::var("BILLING_RUN_ON_START") {
            Ok(value) => parse_flag(&value)?,
            Err(_) => defaults.run_on_start,
        };

        Ok(Self {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            schedule: ScheduleConfig {
                timezone,
                run_at,
                run_on_start,
            },
        })
    }
}

/// Parses an IANA time zone name such as `America/Sao_Paulo`
pub fn parse_timezone(name: &str) -> anyhow::Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("Invalid BILLING_TIMEZONE '{}': {}", name, e))
}

/// Parses an `HH:MM` time of day
pub fn parse_run_at(value: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| anyhow::anyhow!("BILLING_RUN_AT must be HH:MM, got '{}'", value))
}

/// Parses a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`)
pub fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => anyhow::bail!("Invalid boolean value '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("America/Sao_Paulo").unwrap(), chrono_tz::America::Sao_Paulo);
        assert_eq!(parse_timezone(" UTC ").unwrap(), Tz::UTC);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_parse_run_at() {
        assert_eq!(parse_run_at("02:30").unwrap(), NaiveTime::from_hms_opt(2, 30, 0).unwrap());
        assert!(parse_run_at("25:00").is_err());
        assert!(parse_run_at("2am").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag("YES").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_default_schedule() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.timezone, Tz::UTC);
        assert_eq!(schedule.run_at, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
        assert!(!schedule.run_on_start);
    }
}
