use crate::config::Settings;
use crate::domain::cost::NamedSource;
use crate::ingest::accounts::AccountSpec;
use crate::ingest::types::{DailyCostRecord, DailyCostResponse};
use crate::time::AnalysisWindow;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

#[async_trait::async_trait]
pub trait BillingSource: Send + Sync {
    fn source_name(&self) -> &str;

    async fn fetch_daily_costs(&self, window: &AnalysisWindow) -> Result<DailyCostResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonBillingSource {
    http: reqwest::Client,
    account: AccountSpec,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonBillingSource {
    pub fn from_settings(settings: &Settings, account: AccountSpec) -> Result<Self> {
        let base_url = settings.require_billing_base_url()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.billing_timeout_secs))
            .build()
            .context("failed to build billing http client")?;

        Ok(Self {
            http,
            account,
            base_url,
            api_key: settings.billing_api_key.clone(),
            path: settings.billing_path.clone(),
            retries: settings.billing_retries.max(1),
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, window: &AnalysisWindow) -> Result<DailyCostResponse> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[
                ("start_date", window.start.to_string()),
                ("end_date", window.end.to_string()),
                ("account", self.account.name.clone()),
                ("profile", self.account.profile.clone()),
            ])
            .send()
            .await
            .context("billing request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read billing response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("billing response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("billing HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<DailyCostResponse>(raw_json)
            .context("failed to parse billing response into DailyCostResponse")
    }
}

#[async_trait::async_trait]
impl BillingSource for HttpJsonBillingSource {
    fn source_name(&self) -> &str {
        &self.account.name
    }

    async fn fetch_daily_costs(&self, window: &AnalysisWindow) -> Result<DailyCostResponse> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(window).await {
                Ok(parsed) => {
                    validate(&parsed, window)?;
                    return Ok(parsed);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        account = %self.account.name,
                        attempt,
                        ?backoff,
                        error = %err,
                        "billing fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

pub fn validate(resp: &DailyCostResponse, window: &AnalysisWindow) -> Result<()> {
    anyhow::ensure!(
        resp.start_date == window.start && resp.end_date == window.end,
        "billing window mismatch: expected {}..{}, got {}..{}",
        window.start,
        window.end,
        resp.start_date,
        resp.end_date
    );

    for day in &resp.days {
        validate_record(day, window)?;
    }

    Ok(())
}

fn validate_record(day: &DailyCostRecord, window: &AnalysisWindow) -> Result<()> {
    anyhow::ensure!(
        window.contains(day.date),
        "billing day {} is outside {}..{}",
        day.date,
        window.start,
        window.end
    );
    for (name, amount) in &day.costs {
        anyhow::ensure!(!name.trim().is_empty(), "contributor name must be non-empty");
        anyhow::ensure!(
            amount.is_finite(),
            "amount for {name} on {} is not finite",
            day.date
        );
    }
    Ok(())
}

/// Fetches every source in order. A failing source becomes an `Unavailable` entry; the
/// others are unaffected.
pub async fn collect(
    sources: &[Box<dyn BillingSource>],
    window: &AnalysisWindow,
) -> Vec<NamedSource> {
    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        let name = source.source_name().to_string();
        match source.fetch_daily_costs(window).await {
            Ok(resp) => {
                let series = resp.into_series();
                tracing::info!(
                    account = %name,
                    total = series.total,
                    services = series.contributors.len(),
                    "fetched account costs"
                );
                out.push(NamedSource::available(name, series));
            }
            Err(err) => {
                tracing::error!(account = %name, error = %format!("{err:#}"), "billing source failed");
                out.push(NamedSource::unavailable(name, format!("{err:#}")));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn window() -> AnalysisWindow {
        AnalysisWindow::ending_on(NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(), 7).unwrap()
    }

    fn response(days: Vec<DailyCostRecord>) -> DailyCostResponse {
        DailyCostResponse {
            start_date: window().start,
            end_date: window().end,
            days,
        }
    }

    fn record(date: NaiveDate, amount: f64) -> DailyCostRecord {
        let mut costs = BTreeMap::new();
        costs.insert("Amazon EC2".to_string(), amount);
        DailyCostRecord { date, costs }
    }

    struct Fixed(&'static str, Option<DailyCostResponse>);

    #[async_trait::async_trait]
    impl BillingSource for Fixed {
        fn source_name(&self) -> &str {
            self.0
        }

        async fn fetch_daily_costs(&self, _window: &AnalysisWindow) -> Result<DailyCostResponse> {
            self.1.clone().context("access denied")
        }
    }

    #[test]
    fn validation_rejects_days_outside_window() {
        let w = window();
        assert!(validate(&response(vec![record(w.start, 1.0)]), &w).is_ok());
        assert!(validate(&response(vec![record(w.end, 1.0)]), &w).is_err());
        assert!(validate(&response(vec![record(w.start, f64::NAN)]), &w).is_err());

        let mut shifted = response(Vec::new());
        shifted.end_date = w.end.succ_opt().unwrap();
        assert!(validate(&shifted, &w).is_err());
    }

    #[test]
    fn parses_export_shape() {
        let v = json!({
            "start_date": "2026-03-01",
            "end_date": "2026-03-08",
            "days": [{"date": "2026-03-01", "costs": {"Amazon EC2": 3.5}}]
        });
        let parsed: DailyCostResponse = serde_json::from_value(v).unwrap();
        assert!(validate(&parsed, &window()).is_ok());
    }

    #[tokio::test]
    async fn collect_keeps_order_and_tags_failures() {
        let w = window();
        let sources: Vec<Box<dyn BillingSource>> = vec![
            Box::new(Fixed("prod", Some(response(vec![record(w.start, 10.0)])))),
            Box::new(Fixed("legacy", None)),
        ];

        let results = collect(&sources, &w).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "prod");
        assert_eq!(results[0].result.series().map(|s| s.total), Some(10.0));
        assert_eq!(results[1].result.error(), Some("access denied"));
    }
}
