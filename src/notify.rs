use std::time::Duration;

use serde_json::{json, Value};

use crate::error::NotifyError;
use crate::types::{Signal, SignalLevel};

/// Delivers an escalated signal to one external channel. Failures are
/// logged by the escalation pipeline and never block the monitor loop.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, signal: &Signal) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// FeishuWebhook
// ---------------------------------------------------------------------------

/// Feishu group-bot webhook posting an interactive card per signal.
pub struct FeishuWebhook {
    client: reqwest::Client,
    webhook_url: String,
}

impl FeishuWebhook {
    pub fn new(webhook_url: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl NotificationChannel for FeishuWebhook {
    fn name(&self) -> &'static str {
        "feishu"
    }

    async fn send(&self, signal: &Signal) -> Result<(), NotifyError> {
        let payload = json!({
            "msg_type": "interactive",
            "card": build_card(signal),
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        Ok(())
    }
}

/// Card header color by signal level.
fn level_color(level: SignalLevel) -> &'static str {
    match level {
        SignalLevel::Critical => "red",
        SignalLevel::Warning => "yellow",
        SignalLevel::Info => "blue",
    }
}

fn build_card(signal: &Signal) -> Value {
    let when = chrono::DateTime::from_timestamp(signal.created_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();
    let content = format!(
        "**级别**: {level}\n**类型**: {kind}\n**内容**: {message}\n**时间**: {when}",
        level = signal.level.as_str().to_uppercase(),
        kind = signal.kind,
        message = signal.message,
    );

    json!({
        "config": {"wide_screen_mode": true},
        "header": {
            "title": {"tag": "plain_text", "content": format!("📡 市场信号: {}", signal.kind)},
            "template": level_color(signal.level),
        },
        "elements": [
            {"tag": "div", "text": {"tag": "lark_md", "content": content}},
            {"tag": "note", "elements": [{"tag": "plain_text", "content": "来自 market-sentinel"}]},
        ],
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(level: SignalLevel) -> Signal {
        Signal {
            id: 3,
            kind: "sentiment_spike".to_string(),
            level,
            message: "Market overheating: mood index above 80".to_string(),
            analysis: None,
            metadata: json!({"mood_index": 85.2}),
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn card_color_follows_the_level() {
        assert_eq!(level_color(SignalLevel::Critical), "red");
        assert_eq!(level_color(SignalLevel::Warning), "yellow");
        assert_eq!(level_color(SignalLevel::Info), "blue");
    }

    #[test]
    fn card_carries_level_kind_and_message() {
        let card = build_card(&signal(SignalLevel::Warning));

        assert_eq!(card["header"]["template"], "yellow");
        let title = card["header"]["title"]["content"].as_str().unwrap();
        assert!(title.contains("sentiment_spike"));

        let content = card["elements"][0]["text"]["content"].as_str().unwrap();
        assert!(content.contains("WARNING"));
        assert!(content.contains("mood index above 80"));
        assert!(content.contains("2023-11-14"));
    }
}
