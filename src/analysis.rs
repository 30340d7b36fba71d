use std::time::Duration;

use serde_json::{json, Value};

use crate::config::ANALYSIS_TIMEOUT_SECS;
use crate::error::AnalysisError;
use crate::types::Signal;

const SYSTEM_PROMPT: &str =
    "You are a rational A-share trading assistant. Always answer in Chinese.";

/// Produces deep-analysis text for an escalated signal.
///
/// Implementations block; the escalation pipeline runs them on a blocking
/// thread so a slow upstream never stalls the monitor loop.
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &'static str;
    fn analyze(&self, signal: &Signal) -> Result<String, AnalysisError>;
}

// ---------------------------------------------------------------------------
// ChatCompletionEngine
// ---------------------------------------------------------------------------

/// Analysis via an OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionEngine {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionEngine {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(ANALYSIS_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

impl AnalysisEngine for ChatCompletionEngine {
    fn name(&self) -> &'static str {
        "chat_completion"
    }

    fn analyze(&self, signal: &Signal) -> Result<String, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(signal)},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status));
        }

        let value: Value = response.json()?;
        extract_content(&value).ok_or(AnalysisError::EmptyResponse)
    }
}

/// Chinese analyst prompt: importance, risk, and a concrete suggested action,
/// grounded in the numbers carried in the signal's metadata.
fn build_prompt(signal: &Signal) -> String {
    format!(
        "角色：资深市场分析师（理性、敏锐）\n\
         任务：分析监控系统生成的以下市场信号。\n\n\
         [信号信息]\n\
         - 类型: {kind}\n\
         - 级别: {level}\n\
         - 消息: {message}\n\
         - 元数据: {metadata}\n\n\
         [数据字典]\n\
         - mood_index: 情绪指数\n\
         - limit_up_count: 涨停家数\n\
         - fried_rate: 炸板率(%)\n\
         - premium_rate: 昨日涨停今日溢价(%)\n\
         - count: 异动数量\n\n\
         [指令]\n\
         1. 重要性：解释为什么这个信号值得关注，准确引用元数据中的数字。\n\
         2. 风险提示：潜在的市场风险是什么？\n\
         3. 操作建议：减仓、对冲、观望或寻找机会，要具体。\n\
         4. 使用 Markdown，必须用中文，字数控制在 200 字以内。",
        kind = signal.kind,
        level = signal.level.as_str().to_uppercase(),
        message = signal.message,
        metadata = signal.metadata,
    )
}

fn extract_content(value: &Value) -> Option<String> {
    let content = value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::SignalLevel;

    fn signal() -> Signal {
        Signal {
            id: 7,
            kind: "risk_alert".to_string(),
            level: SignalLevel::Critical,
            message: "High risk: fried-board rate above 30%".to_string(),
            analysis: None,
            metadata: json!({"fried_rate": 34.5, "limit_up_count": 40}),
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn prompt_carries_the_signal_and_its_metadata() {
        let prompt = build_prompt(&signal());
        assert!(prompt.contains("risk_alert"));
        assert!(prompt.contains("CRITICAL"));
        assert!(prompt.contains("fried-board rate above 30%"));
        assert!(prompt.contains("34.5"));
    }

    #[test]
    fn content_is_extracted_from_the_first_choice() {
        let value = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "  市场过热，建议减仓。  "}}
            ]
        });
        assert_eq!(
            extract_content(&value).as_deref(),
            Some("市场过热，建议减仓。")
        );
    }

    #[test]
    fn missing_or_blank_content_yields_none() {
        assert!(extract_content(&json!({})).is_none());
        assert!(extract_content(&json!({"choices": []})).is_none());
        let blank = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(extract_content(&blank).is_none());
    }
}
