//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use herald_bluesky::{
    DEFAULT_PROVIDER_CAP_FALLBACK_SECS, MAX_PROVIDER_CAP_FALLBACK_SECS, Strategy,
};
use herald_compose::ComposeConfig;
use herald_outreach::{OutreachConfig, OutreachError, QuotaPolicy};

use crate::parse_bool_env;

/// Where quota and ledger files live.
#[derive(Debug, Clone, Args)]
pub struct StateArgs {
    /// State directory (defaults to the platform data directory + /herald)
    #[arg(long, env = "HERALD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl StateArgs {
    pub fn resolve(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("herald")
        })
    }
}

/// Daily target and spacing.
#[derive(Debug, Clone, Args)]
pub struct QuotaArgs {
    /// Messages to send per UTC day
    #[arg(long, env = "HERALD_DAILY_TARGET", default_value = "30")]
    pub daily_target: u32,

    /// Minimum seconds between two scheduled messages
    #[arg(long, env = "HERALD_MIN_INTERVAL_SECS", default_value = "1440")]
    pub min_interval_secs: u64,
}

impl QuotaArgs {
    pub fn policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            daily_target: self.daily_target,
            // Out-of-range values saturate and are then rejected by validation.
            min_interval: i64::try_from(self.min_interval_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .unwrap_or(chrono::Duration::MAX),
        }
    }
}

/// Everything `herald run` needs.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// PDS URL
    #[arg(long, env = "HERALD_PDS_URL", default_value = "https://bsky.social")]
    pub pds_url: String,

    /// Account handle
    #[arg(long, env = "HERALD_HANDLE")]
    pub handle: String,

    /// App password
    #[arg(long, env = "HERALD_APP_PASSWORD", hide_env_values = true)]
    pub app_password: String,

    /// Candidate selection strategy: targets, search or mentions
    #[arg(long, env = "HERALD_STRATEGY", default_value = "search")]
    pub strategy: Strategy,

    /// Newline-delimited handles or DIDs (targets strategy)
    #[arg(long, env = "HERALD_TARGET_FILE")]
    pub target_file: Option<PathBuf>,

    /// Post search query (search strategy)
    #[arg(long, env = "HERALD_SEARCH_QUERY")]
    pub query: Option<String>,

    /// Chat completions base URL
    #[arg(long, env = "HERALD_LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    /// Chat completions API key
    #[arg(long, env = "HERALD_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Chat completions model
    #[arg(long, env = "HERALD_LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    /// System prompt for message composition
    #[arg(long, env = "HERALD_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    #[command(flatten)]
    pub state: StateArgs,

    #[command(flatten)]
    pub quota: QuotaArgs,

    /// Control surface port
    #[arg(long, env = "HERALD_PORT", default_value = "8080")]
    pub port: u16,

    /// Disable the HTTP control surface.
    /// Accepts "1", "true", "yes", "on".
    #[arg(
        long,
        env = "HERALD_NO_CONTROL",
        value_parser = parse_bool_env,
        default_value = "false",
        default_missing_value = "true",
        num_args = 0..=1
    )]
    pub no_control: bool,

    /// Scheduler tick in seconds (must be shorter than the minimum interval)
    #[arg(long, env = "HERALD_TICK_SECS", default_value = "300")]
    pub tick_secs: u64,

    /// Timeout for each search, generation or send call, in seconds
    #[arg(long, env = "HERALD_CALL_TIMEOUT_SECS", default_value = "60")]
    pub call_timeout_secs: u64,

    /// Pause applied when a provider cap carries no reset time, in seconds
    #[arg(long, env = "HERALD_PROVIDER_CAP_FALLBACK_SECS", default_value_t = DEFAULT_PROVIDER_CAP_FALLBACK_SECS)]
    pub provider_cap_fallback_secs: i64,

    /// Shortest acceptable message, in characters
    #[arg(long, env = "HERALD_MIN_CONTENT_CHARS", default_value = "20")]
    pub min_content_chars: usize,

    /// Longest acceptable message, in characters
    #[arg(long, env = "HERALD_MAX_CONTENT_CHARS", default_value = "1000")]
    pub max_content_chars: usize,
}

impl RunArgs {
    /// Executor settings, validated.
    pub fn outreach_config(&self) -> Result<OutreachConfig, OutreachError> {
        let config = OutreachConfig {
            policy: self.quota.policy(),
            tick_interval: Duration::from_secs(self.tick_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            min_content_chars: self.min_content_chars,
            max_content_chars: self.max_content_chars,
        };
        config.validate()?;

        if self.provider_cap_fallback_secs <= 0
            || self.provider_cap_fallback_secs > MAX_PROVIDER_CAP_FALLBACK_SECS
        {
            return Err(OutreachError::InvalidConfig(format!(
                "provider cap fallback must be between 1 and {MAX_PROVIDER_CAP_FALLBACK_SECS} seconds"
            )));
        }

        match self.strategy {
            Strategy::Targets if self.target_file.is_none() => Err(OutreachError::InvalidConfig(
                "the targets strategy needs --target-file".to_string(),
            )),
            Strategy::Search if self.query.as_deref().is_none_or(|q| q.trim().is_empty()) => {
                Err(OutreachError::InvalidConfig(
                    "the search strategy needs --query".to_string(),
                ))
            }
            _ => Ok(config),
        }
    }

    pub fn compose_config(&self) -> ComposeConfig {
        let mut config = ComposeConfig::new(&self.llm_base_url, &self.llm_model);
        if let Some(key) = &self.llm_api_key {
            config = config.with_api_key(key);
        }
        if let Some(prompt) = &self.system_prompt {
            config = config.with_system_prompt(prompt);
        }
        config
    }

    pub fn provider_cap_fallback(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.provider_cap_fallback_secs)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(extra: &[&str]) -> RunArgs {
        let mut argv = vec![
            "herald",
            "--handle",
            "herald.test",
            "--app-password",
            "secret",
            "--state-dir",
            "/tmp/herald-test",
        ];
        argv.extend_from_slice(extra);
        TestCli::try_parse_from(argv).unwrap().run
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--query", "rustlang"]);

        assert_eq!(args.strategy, Strategy::Search);
        assert_eq!(args.port, 8080);
        assert!(!args.no_control);
        let config = args.outreach_config().unwrap();
        assert_eq!(config.policy.daily_target, 30);
        assert_eq!(config.policy.min_interval, chrono::Duration::minutes(24));
        assert_eq!(config.tick_interval, Duration::from_secs(300));
        assert_eq!(args.provider_cap_fallback(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_no_control_flag_forms() {
        assert!(parse(&["--no-control"]).no_control);
        assert!(parse(&["--no-control", "yes"]).no_control);
        assert!(!parse(&["--no-control", "off"]).no_control);
    }

    #[test]
    fn test_tick_not_shorter_than_interval_rejected() {
        let args = parse(&["--query", "rust", "--tick-secs", "1440"]);
        assert!(args.outreach_config().is_err());
    }

    #[test]
    fn test_out_of_range_durations_rejected_without_panicking() {
        let args = parse(&["--query", "rust", "--min-interval-secs", "18446744073709551615"]);
        assert!(args.outreach_config().is_err());

        let args = parse(&["--query", "rust", "--min-interval-secs", "1000000000000000"]);
        assert!(args.outreach_config().is_err());

        let args = parse(&[
            "--query",
            "rust",
            "--provider-cap-fallback-secs",
            "9223372036854775807",
        ]);
        assert!(args.outreach_config().is_err());
        assert_eq!(args.provider_cap_fallback(), chrono::Duration::MAX);

        let args = parse(&["--query", "rust", "--provider-cap-fallback-secs", "0"]);
        assert!(args.outreach_config().is_err());
    }

    #[test]
    fn test_search_needs_query() {
        assert!(parse(&[]).outreach_config().is_err());
        assert!(parse(&["--query", "  "]).outreach_config().is_err());
    }

    #[test]
    fn test_targets_need_file() {
        let args = parse(&["--strategy", "targets"]);
        assert!(args.outreach_config().is_err());

        let args = parse(&["--strategy", "targets", "--target-file", "targets.txt"]);
        assert!(args.outreach_config().is_ok());
    }

    #[test]
    fn test_mentions_need_nothing_extra() {
        assert!(parse(&["--strategy", "mentions"]).outreach_config().is_ok());
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let result = TestCli::try_parse_from([
            "herald",
            "--handle",
            "h",
            "--app-password",
            "p",
            "--strategy",
            "followers",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compose_config_carries_overrides() {
        let args = parse(&[
            "--query",
            "rust",
            "--llm-api-key",
            "k",
            "--system-prompt",
            "be nice",
        ]);
        let config = args.compose_config();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.system_prompt, "be nice");
    }
}
