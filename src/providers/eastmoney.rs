use chrono::Local;
use serde_json::Value;

use crate::config::{EASTMONEY_PUSH_EX_URL, EASTMONEY_PUSH_URL, EASTMONEY_RANK_URL};
use crate::config::{LEADER_LIMIT, LEADER_MIN_CHANGE_PCT};
use crate::error::ProviderError;
use crate::providers::{feed_client, value_as_f64, value_as_string, value_as_u32, ProviderBackend};
use crate::types::{
    BreadthStats, LeaderRow, MetricKind, MetricPayload, RawAnomaly, SectorRow, SentimentStats,
};

const UT_POOL: &str = "7eea3edcaed734bea9cbfc24409ed989";
const UT_QUOTE: &str = "fa5fd1943c7b386f172d6893dbfba10b";

/// Intraday change categories requested from the change stream, with the
/// upstream's numeric code for each label. Unknown codes pass through as the
/// bare number and fall to the classifier's default.
const CHANGE_LABELS: &[(u32, &str)] = &[
    (4, "封涨停板"),
    (8, "封跌停板"),
    (16, "打开涨停板"),
    (32, "打开跌停板"),
    (64, "有大买盘"),
    (128, "有大卖盘"),
    (8193, "大笔买入"),
    (8194, "大笔卖出"),
    (8201, "火箭发射"),
    (8202, "快速反弹"),
    (8203, "高台跳水"),
    (8204, "加速下跌"),
    (8207, "竞价上涨"),
    (8208, "竞价下跌"),
    (8209, "高开5日线"),
    (8210, "低开5日线"),
    (8211, "向上缺口"),
    (8212, "向下缺口"),
    (8213, "60日新高"),
    (8214, "60日新低"),
    (8215, "60日大幅上涨"),
    (8216, "60日大幅下跌"),
];

/// Primary backend: EastMoney push endpoints. Serves the limit-up pools, the
/// intraday change stream, popularity-ranked leaders, and fallback variants
/// of the sector and breadth metrics.
pub struct EastMoneyProvider {
    client: reqwest::Client,
}

impl EastMoneyProvider {
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

    /// One of the topic pools (limit-up / fried-board / yesterday's pool).
    /// `data` is null outside trading sessions; that is an empty pool, not an
    /// error.
    async fn fetch_pool(&self, endpoint: &str, date: &str) -> Result<Vec<Value>, ProviderError> {
        let url = format!(
            "{EASTMONEY_PUSH_EX_URL}/{endpoint}?ut={UT_POOL}&dpt=wz.ztzt&Pageindex=0&pagesize=1000&sort=fbt%3Aasc&date={date}"
        );
        let v = self.get_json(&url).await?;
        Ok(v.get("data")
            .and_then(|d| d.get("pool"))
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_sentiment(&self) -> Result<MetricPayload, ProviderError> {
        let date = Local::now().format("%Y%m%d").to_string();

        let limit_up = self.fetch_pool("getTopicZTPool", &date).await?;
        let fried = self.fetch_pool("getTopicZBPool", &date).await?;
        let previous = self.fetch_pool("getYesterdayZTPool", &date).await?;

        let prev_changes: Vec<f64> = previous
            .iter()
            .map(|row| value_as_f64(row.get("zdp")))
            .collect();
        let (premium_rate, promotion_rate) = if prev_changes.is_empty() {
            (0.0, 0.0)
        } else {
            let mean = prev_changes.iter().sum::<f64>() / prev_changes.len() as f64;
            let promoted = prev_changes.iter().filter(|c| **c > 9.5).count();
            (mean, promoted as f64 / prev_changes.len() as f64 * 100.0)
        };

        Ok(MetricPayload::Sentiment(SentimentStats {
            limit_up_count: limit_up.len() as u32,
            fried_board_count: fried.len() as u32,
            premium_rate,
            promotion_rate,
        }))
    }

    async fn fetch_anomalies(&self) -> Result<MetricPayload, ProviderError> {
        let types = CHANGE_LABELS
            .iter()
            .map(|(code, _)| code.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{EASTMONEY_PUSH_EX_URL}/getAllStockChanges?type={types}&ut={UT_POOL}&pageindex=0&pagesize=1000&dpt=wzchanges"
        );
        let v = self.get_json(&url).await?;
        let rows = v
            .get("data")
            .and_then(|d| d.get("allstock"))
            .and_then(|a| a.as_array())
            .cloned()
            .unwrap_or_default();

        let anomalies = rows
            .iter()
            .map(|row| {
                let code_num = row.get("t").and_then(|t| t.as_u64()).unwrap_or(0) as u32;
                RawAnomaly {
                    code: value_as_string(row.get("c")),
                    name: value_as_string(row.get("n")),
                    raw_label: change_label(code_num),
                    info: value_as_string(row.get("i")),
                    event_time: format_event_time(
                        row.get("tm").and_then(|t| t.as_u64()).unwrap_or(0) as u32,
                    ),
                }
            })
            .filter(|a| !a.code.is_empty())
            .collect();

        Ok(MetricPayload::Anomalies(anomalies))
    }

    /// Popularity leaders in two steps: the rank list (codes only), then a
    /// batch quote lookup for price and change.
    async fn fetch_leaders(&self) -> Result<MetricPayload, ProviderError> {
        let body = serde_json::json!({
            "appId": "appId01",
            "globalId": "786e4c21-70dc-435a-93bb-38",
            "marketType": "",
            "pageNo": 1,
            "pageSize": 100,
        });
        let resp = self
            .client
            .post(format!("{EASTMONEY_RANK_URL}/stockrank/getAllCurrentList"))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status()));
        }
        let rank: Value = resp.json().await?;
        let entries = rank
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or(ProviderError::Shape("stockrank: missing data array"))?;

        // sc is "SZ000913" / "SH600519"; ulist secids want "0.000913" / "1.600519".
        let mut ranks: Vec<(String, u32)> = Vec::new();
        let mut secids: Vec<String> = Vec::new();
        for e in entries {
            let sc = value_as_string(e.get("sc"));
            if sc.len() < 3 {
                continue;
            }
            let (prefix, code) = sc.split_at(2);
            let market = if prefix == "SH" { "1" } else { "0" };
            ranks.push((code.to_string(), value_as_u32(e.get("rk"))));
            secids.push(format!("{market}.{code}"));
        }
        if secids.is_empty() {
            return Err(ProviderError::Shape("stockrank: empty rank list"));
        }

        let url = format!(
            "{EASTMONEY_PUSH_URL}/api/qt/ulist.np/get?ut={UT_QUOTE}&fltt=2&invt=2&fields=f2,f3,f12,f14&secids={}",
            secids.join(",")
        );
        let quotes = self.get_json(&url).await?;
        let diff = quotes
            .get("data")
            .and_then(|d| d.get("diff"))
            .and_then(|d| d.as_array())
            .ok_or(ProviderError::Shape("ulist: missing data.diff"))?;

        let mut leaders: Vec<LeaderRow> = Vec::new();
        for q in diff {
            let code = value_as_string(q.get("f12"));
            let change_pct = value_as_f64(q.get("f3"));
            if change_pct < LEADER_MIN_CHANGE_PCT {
                continue;
            }
            let rank = ranks
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, r)| *r)
                .unwrap_or(0);
            leaders.push(LeaderRow {
                code,
                name: value_as_string(q.get("f14")),
                price: value_as_f64(q.get("f2")),
                change_pct,
                rank,
            });
        }
        leaders.sort_by_key(|l| l.rank);
        leaders.truncate(LEADER_LIMIT);

        Ok(MetricPayload::LeaderStocks(leaders))
    }

    /// Industry board list, used as the heatmap fallback. po=1/fid=f3 sorts
    /// by change descending upstream.
    async fn fetch_heatmap(&self) -> Result<MetricPayload, ProviderError> {
        let url = format!(
            "{EASTMONEY_PUSH_URL}/api/qt/clist/get?pn=1&pz=90&po=1&np=1&ut={UT_QUOTE}&fltt=2&invt=2&fid=f3&fs=m:90+t:2+f:!50&fields=f3,f6,f12,f14,f128,f136"
        );
        let v = self.get_json(&url).await?;
        let diff = v
            .get("data")
            .and_then(|d| d.get("diff"))
            .and_then(|d| d.as_array())
            .ok_or(ProviderError::Shape("clist: missing data.diff"))?;

        let rows = diff
            .iter()
            .map(|q| SectorRow {
                name: value_as_string(q.get("f14")),
                change_pct: value_as_f64(q.get("f3")),
                turnover: value_as_f64(q.get("f6")),
                leader: value_as_string(q.get("f128")),
                leader_change_pct: value_as_f64(q.get("f136")),
            })
            .filter(|r| !r.name.is_empty())
            .collect();

        Ok(MetricPayload::SectorHeatmap(rows))
    }

    /// Advance/decline counts off the index quote boards (f104/f105/f106),
    /// summed over Shanghai and Shenzhen. Limit counts and the activity gauge
    /// are not available here; this is the degraded fallback for the primary
    /// breadth source.
    async fn fetch_breadth(&self) -> Result<MetricPayload, ProviderError> {
        let url = format!(
            "{EASTMONEY_PUSH_URL}/api/qt/ulist.np/get?ut={UT_QUOTE}&fltt=2&invt=2&fields=f104,f105,f106&secids=1.000001,0.399001"
        );
        let v = self.get_json(&url).await?;
        let diff = v
            .get("data")
            .and_then(|d| d.get("diff"))
            .and_then(|d| d.as_array())
            .ok_or(ProviderError::Shape("ulist: missing data.diff"))?;

        let mut stats = BreadthStats::default();
        for q in diff {
            stats.up_count += value_as_u32(q.get("f104"));
            stats.down_count += value_as_u32(q.get("f105"));
            stats.flat_count += value_as_u32(q.get("f106"));
        }
        Ok(MetricPayload::Breadth(stats))
    }
}

#[async_trait::async_trait]
impl ProviderBackend for EastMoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn fetch(&self, kind: MetricKind) -> Result<MetricPayload, ProviderError> {
        match kind {
            MetricKind::Sentiment => self.fetch_sentiment().await,
            MetricKind::Anomalies => self.fetch_anomalies().await,
            MetricKind::LeaderStocks => self.fetch_leaders().await,
            MetricKind::SectorHeatmap => self.fetch_heatmap().await,
            MetricKind::Breadth => self.fetch_breadth().await,
            MetricKind::MacroCalendar => Err(ProviderError::Unsupported {
                backend: self.name(),
                metric: kind.as_str(),
            }),
        }
    }
}

fn change_label(code: u32) -> String {
    CHANGE_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// The stream encodes event time as HHMMSS, e.g. 93005 → "09:30:05".
fn format_event_time(tm: u32) -> String {
    format!("{:02}:{:02}:{:02}", tm / 10000, tm / 100 % 100, tm % 100)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
