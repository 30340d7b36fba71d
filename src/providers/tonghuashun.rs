use chrono::Local;
use serde_json::Value;

use crate::config::TONGHUASHUN_DATA_URL;
use crate::error::ProviderError;
use crate::providers::{feed_client, value_as_f64, value_as_string, ProviderBackend};
use crate::types::{MetricKind, MetricPayload, SectorRow, SentimentStats};

/// Tonghuashun data API. Primary source for the industry heatmap, secondary
/// for the limit-up sentiment counts (it has no prior-day pool, so the
/// premium and promotion rates degrade to zero on failover).
pub struct TonghuashunProvider {
    client: reqwest::Client,
}

impl TonghuashunProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: feed_client()?,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_heatmap(&self) -> Result<MetricPayload, ProviderError> {
        let url = format!(
            "{TONGHUASHUN_DATA_URL}/dataapi/block/industry_rank?page=1&size=90&order_field=change&order_type=desc"
        );
        let v = self.get_json(&url).await?;
        let list = v
            .get("data")
            .and_then(|d| d.get("list"))
            .and_then(|l| l.as_array())
            .ok_or(ProviderError::Shape("industry_rank: missing data.list"))?;

        let mut rows: Vec<SectorRow> = list
            .iter()
            .map(|b| SectorRow {
                name: value_as_string(b.get("name")),
                change_pct: value_as_f64(b.get("change")),
                turnover: value_as_f64(b.get("amount")),
                leader: value_as_string(b.get("leader_stock_name")),
                leader_change_pct: value_as_f64(b.get("leader_stock_change")),
            })
            .filter(|r| !r.name.is_empty())
            .collect();
        rows.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));

        Ok(MetricPayload::SectorHeatmap(rows))
    }

    /// Pool sizes only. The pool endpoints are paged; `page.total` is the
    /// full pool size regardless of the requested page.
    async fn pool_total(&self, endpoint: &str, date: &str) -> Result<u32, ProviderError> {
        let url = format!(
            "{TONGHUASHUN_DATA_URL}/dataapi/limit_up/{endpoint}?page=1&limit=1&filter=HS,GEM2STAR&order_field=330329&order_type=0&date={date}"
        );
        let v = self.get_json(&url).await?;
        v.get("data")
            .and_then(|d| d.get("page"))
            .and_then(|p| p.get("total"))
            .and_then(|t| t.as_u64())
            .map(|t| t as u32)
            .ok_or(ProviderError::Shape("limit_up pool: missing page.total"))
    }

    async fn fetch_sentiment(&self) -> Result<MetricPayload, ProviderError> {
        let date = Local::now().format("%Y%m%d").to_string();
        let limit_up_count = self.pool_total("limit_up_pool", &date).await?;
        let fried_board_count = self.pool_total("limit_up_broken_pool", &date).await?;

        Ok(MetricPayload::Sentiment(SentimentStats {
            limit_up_count,
            fried_board_count,
            premium_rate: 0.0,
            promotion_rate: 0.0,
        }))
    }
}

#[async_trait::async_trait]
impl ProviderBackend for TonghuashunProvider {
    fn name(&self) -> &'static str {
        "tonghuashun"
    }

    async fn fetch(&self, kind: MetricKind) -> Result<MetricPayload, ProviderError> {
        match kind {
            MetricKind::SectorHeatmap => self.fetch_heatmap().await,
            MetricKind::Sentiment => self.fetch_sentiment().await,
            _ => Err(ProviderError::Unsupported {
                backend: self.name(),
                metric: kind.as_str(),
            }),
        }
    }
}
