pub mod analytics;
pub mod dashboard;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod remediation;
pub mod report;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::str::FromStr;

    const DEFAULT_DB_PATH: &str = "data/savings_tracker.db";
    const DEFAULT_DEMO_DB_PATH: &str = "data/demo_savings_tracker.db";
    const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
    const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/responses";
    const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
    const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
    const DEFAULT_BILLING_PATH: &str = "/v1/daily_costs";

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum RunMode {
        Demo,
        Live,
    }

    impl RunMode {
        pub fn as_str(&self) -> &'static str {
            match self {
                RunMode::Demo => "demo",
                RunMode::Live => "live",
            }
        }
    }

    impl FromStr for RunMode {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.trim().to_ascii_lowercase().as_str() {
                "demo" => Ok(RunMode::Demo),
                "live" | "aws" => Ok(RunMode::Live),
                other => anyhow::bail!("unknown mode {other:?} (expected demo or live)"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_path: PathBuf,
        pub demo_database_path: PathBuf,
        pub llm_provider: String,
        pub openai_api_key: Option<String>,
        pub openai_model: String,
        pub openai_base_url: String,
        pub anthropic_api_key: Option<String>,
        pub anthropic_model: String,
        pub anthropic_base_url: String,
        pub llm_max_tokens: u32,
        pub llm_timeout_secs: u64,
        pub billing_base_url: Option<String>,
        pub billing_api_key: Option<String>,
        pub billing_path: String,
        pub billing_timeout_secs: u64,
        pub billing_retries: u32,
        pub accounts: String,
        pub days_to_analyze: u32,
        pub monthly_budget: f64,
        pub dashboard_mode: RunMode,
        pub summary_cache_ttl_secs: u64,
        pub port: u16,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
            let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

            let days_to_analyze: u32 = parse_or(get("DAYS_TO_ANALYZE"), "DAYS_TO_ANALYZE", 7)?;
            anyhow::ensure!(
                (1..=crate::time::MAX_WINDOW_DAYS).contains(&days_to_analyze),
                "DAYS_TO_ANALYZE must be between 1 and {}",
                crate::time::MAX_WINDOW_DAYS
            );

            let dashboard_mode = match get("DASHBOARD_MODE") {
                Some(raw) => raw.parse().context("invalid DASHBOARD_MODE")?,
                None => RunMode::Demo,
            };

            Ok(Self {
                database_path: PathBuf::from(text("SAVINGS_DB_PATH", DEFAULT_DB_PATH)),
                demo_database_path: PathBuf::from(text("DEMO_DB_PATH", DEFAULT_DEMO_DB_PATH)),
                llm_provider: text("LLM_PROVIDER", "openai").to_ascii_lowercase(),
                openai_api_key: get("OPENAI_API_KEY"),
                openai_model: text("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
                openai_base_url: text("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                anthropic_api_key: get("CLAUDE_API_KEY").or_else(|| get("ANTHROPIC_API_KEY")),
                anthropic_model: get("ANTHROPIC_MODEL")
                    .or_else(|| get("CLAUDE_MODEL"))
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                anthropic_base_url: text("ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL),
                llm_max_tokens: parse_or(get("LLM_MAX_TOKENS"), "LLM_MAX_TOKENS", 2000)?,
                llm_timeout_secs: parse_or(get("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 60)?,
                billing_base_url: get("BILLING_BASE_URL"),
                billing_api_key: get("BILLING_API_KEY"),
                billing_path: text("BILLING_PATH", DEFAULT_BILLING_PATH),
                billing_timeout_secs: parse_or(
                    get("BILLING_TIMEOUT_SECS"),
                    "BILLING_TIMEOUT_SECS",
                    30,
                )?,
                billing_retries: parse_or(get("BILLING_RETRIES"), "BILLING_RETRIES", 3)?,
                accounts: text("AWS_ACCOUNTS", "default:default"),
                days_to_analyze,
                monthly_budget: parse_or(get("MONTHLY_BUDGET"), "MONTHLY_BUDGET", 1000.0)?,
                dashboard_mode,
                summary_cache_ttl_secs: parse_or(
                    get("SUMMARY_CACHE_TTL_SECS"),
                    "SUMMARY_CACHE_TTL_SECS",
                    60,
                )?,
                port: parse_or(get("PORT"), "PORT", 5000)?,
                sentry_dsn: get("SENTRY_DSN"),
            })
        }

        pub fn require_billing_base_url(&self) -> anyhow::Result<&str> {
            self.billing_base_url
                .as_deref()
                .context("BILLING_BASE_URL is required in live mode")
        }

        pub fn ledger_path(&self, mode: RunMode) -> &std::path::Path {
            match mode {
                RunMode::Demo => &self.demo_database_path,
                RunMode::Live => &self.database_path,
            }
        }
    }

    fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match raw {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{key} is not a valid value: {raw:?}")),
            None => Ok(default),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        fn settings_from(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
            let vars: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Settings::from_lookup(|key| vars.get(key).cloned())
        }

        #[test]
        fn defaults_apply_when_unset() {
            let s = settings_from(&[]).unwrap();
            assert_eq!(s.days_to_analyze, 7);
            assert_eq!(s.monthly_budget, 1000.0);
            assert_eq!(s.dashboard_mode, RunMode::Demo);
            assert_eq!(s.llm_provider, "openai");
            assert_eq!(s.accounts, "default:default");
            assert_eq!(s.port, 5000);
            assert!(s.anthropic_api_key.is_none());
        }

        #[test]
        fn claude_key_takes_precedence_and_blank_is_unset() {
            let s = settings_from(&[
                ("CLAUDE_API_KEY", "sk-claude"),
                ("ANTHROPIC_API_KEY", "sk-other"),
                ("OPENAI_API_KEY", "  "),
                ("LLM_PROVIDER", "Anthropic"),
            ])
            .unwrap();
            assert_eq!(s.anthropic_api_key.as_deref(), Some("sk-claude"));
            assert!(s.openai_api_key.is_none());
            assert_eq!(s.llm_provider, "anthropic");
        }

        #[test]
        fn rejects_malformed_numbers() {
            assert!(settings_from(&[("MONTHLY_BUDGET", "lots")]).is_err());
            assert!(settings_from(&[("DAYS_TO_ANALYZE", "0")]).is_err());
            assert!(settings_from(&[("DAYS_TO_ANALYZE", "367")]).is_err());
            assert!(settings_from(&[("DAYS_TO_ANALYZE", "366")]).is_ok());
            assert!(settings_from(&[("DASHBOARD_MODE", "staging")]).is_err());
        }

        #[test]
        fn ledger_path_follows_mode() {
            let s = settings_from(&[("DASHBOARD_MODE", "live")]).unwrap();
            assert_eq!(s.dashboard_mode, RunMode::Live);
            assert_eq!(
                s.ledger_path(RunMode::Demo),
                std::path::Path::new(DEFAULT_DEMO_DB_PATH)
            );
            assert_eq!(
                s.ledger_path(RunMode::Live),
                std::path::Path::new(DEFAULT_DB_PATH)
            );
        }
    }
}
