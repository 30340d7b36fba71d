use serde_json::Value;

use crate::config::LEGU_URL;
use crate::error::ProviderError;
use crate::providers::{feed_client, value_as_string, value_as_u32, ProviderBackend};
use crate::types::{BreadthStats, MetricKind, MetricPayload};

/// Legu market-activity endpoint: advance/decline/flat counts, limit counts
/// and the source's composite activity gauge, delivered as item/value pairs
/// with Chinese item names.
pub struct LeguProvider {
    client: reqwest::Client,
}

impl LeguProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: feed_client()?,
        })
    }

    async fn fetch_breadth(&self) -> Result<MetricPayload, ProviderError> {
        let url = format!("{LEGU_URL}/api/stock-activity");
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status()));
        }
        let v: Value = resp.json().await?;
        let items = v
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or(ProviderError::Shape("stock-activity: missing data array"))?;

        let mut stats = BreadthStats::default();
        let mut saw_counts = false;
        for entry in items {
            let item = value_as_string(entry.get("item"));
            let value = entry.get("value");
            match item.as_str() {
                "上涨" => {
                    stats.up_count = value_as_u32(value);
                    saw_counts = true;
                }
                "下跌" => stats.down_count = value_as_u32(value),
                "平盘" => stats.flat_count = value_as_u32(value),
                "涨停" => stats.limit_up_count = value_as_u32(value),
                "跌停" => stats.limit_down_count = value_as_u32(value),
                // Arrives as "78.33%".
                "活跃度" => {
                    stats.activity = value_as_string(value)
                        .trim_end_matches('%')
                        .parse()
                        .unwrap_or(0.0)
                }
                _ => {}
            }
        }
        if !saw_counts {
            return Err(ProviderError::Shape("stock-activity: no count items"));
        }

        Ok(MetricPayload::Breadth(stats))
    }
}

#[async_trait::async_trait]
impl ProviderBackend for LeguProvider {
    fn name(&self) -> &'static str {
        "legu"
    }

    async fn fetch(&self, kind: MetricKind) -> Result<MetricPayload, ProviderError> {
        match kind {
            MetricKind::Breadth => self.fetch_breadth().await,
            _ => Err(ProviderError::Unsupported {
                backend: self.name(),
                metric: kind.as_str(),
            }),
        }
    }
}
