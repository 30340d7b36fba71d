use chrono::Local;
use serde_json::Value;

use crate::config::BAIDU_FINANCE_URL;
use crate::error::ProviderError;
use crate::providers::{feed_client, value_as_f64, value_as_string, ProviderBackend};
use crate::types::{MacroEvent, MetricKind, MetricPayload};

/// Baidu finance economic calendar, grouped by day with per-event
/// announcement/forecast/prior readings.
pub struct BaiduProvider {
    client: reqwest::Client,
}

impl BaiduProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: feed_client()?,
        })
    }

    async fn fetch_calendar(&self) -> Result<MetricPayload, ProviderError> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let url = format!(
            "{BAIDU_FINANCE_URL}/api/financecalendar?start_date={today}&end_date={today}&market=&cate=economic_data"
        );
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status()));
        }
        let v: Value = resp.json().await?;
        let blocks = v
            .get("Result")
            .and_then(|r| r.as_array())
            .ok_or(ProviderError::Shape("financecalendar: missing Result"))?;

        let mut events = Vec::new();
        for block in blocks {
            let date = value_as_string(block.get("date"));
            let Some(list) = block.get("list").and_then(|l| l.as_array()) else {
                continue;
            };
            for item in list {
                let event = value_as_string(item.get("title"));
                if event.is_empty() {
                    continue;
                }
                events.push(MacroEvent {
                    date: date.clone(),
                    time: value_as_string(item.get("time")),
                    region: value_as_string(item.get("region")),
                    event,
                    actual: value_as_string(item.get("public")),
                    forecast: value_as_string(item.get("forecast")),
                    previous: value_as_string(item.get("former")),
                    importance: value_as_f64(item.get("importance")) as u8,
                });
            }
        }

        Ok(MetricPayload::MacroCalendar(events))
    }
}

#[async_trait::async_trait]
impl ProviderBackend for BaiduProvider {
    fn name(&self) -> &'static str {
        "baidu"
    }

    async fn fetch(&self, kind: MetricKind) -> Result<MetricPayload, ProviderError> {
        match kind {
            MetricKind::MacroCalendar => self.fetch_calendar().await,
            _ => Err(ProviderError::Unsupported {
                backend: self.name(),
                metric: kind.as_str(),
            }),
        }
    }
}
