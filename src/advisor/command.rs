use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::TextGenerator;
use crate::domain::SimulationState;
use crate::settings::{ChangeOrigin, ConfigStore, SettingsDelta};

/// Structured reply requested from the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub delta: Option<SettingsDelta>,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome {
    pub feedback: String,
    pub delta: Option<SettingsDelta>,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Best-effort extraction of a [`CommandReply`] from free-form model text.
///
/// Tries the outermost `{...}` as JSON, then a bare `"feedback": "..."` field,
/// then the first line.
pub fn extract_reply(raw: &str) -> CommandReply {
    let (Some(first), Some(last)) = (raw.find('{'), raw.rfind('}')) else {
        return CommandReply {
            delta: None,
            feedback: raw.trim().to_string(),
        };
    };

    if first < last {
        if let Ok(reply) = serde_json::from_str::<CommandReply>(&raw[first..=last]) {
            return reply;
        }
    }

    warn!("advisor reply is not valid JSON, salvaging feedback");
    CommandReply {
        delta: None,
        feedback: scan_feedback(raw)
            .unwrap_or_else(|| raw.lines().next().unwrap_or_default().trim().to_string()),
    }
}

/// Value of the first `"feedback": "<non-empty>"` pair
fn scan_feedback(raw: &str) -> Option<String> {
    const KEY: &str = "\"feedback\"";
    let mut search_from = 0;
    while let Some(pos) = raw[search_from..].find(KEY) {
        let after_key = search_from + pos + KEY.len();
        search_from = after_key;

        let rest = raw[after_key..].trim_start();
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let Some(rest) = rest.trim_start().strip_prefix('"') else {
            continue;
        };
        if let Some(end) = rest.find('"') {
            if end > 0 {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

/// Turns natural-language commands into settings changes
pub struct CommandInterpreter {
    generator: Arc<dyn TextGenerator>,
    store: Arc<ConfigStore>,
}

impl CommandInterpreter {
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<ConfigStore>) -> Self {
        Self { generator, store }
    }

    pub fn prompt(
        &self,
        command: &str,
        telemetry: Option<&SimulationState>,
        forecast: &str,
    ) -> String {
        let settings = serde_json::to_string(&self.store.snapshot()).unwrap_or_default();
        let telemetry = telemetry
            .map(|s| {
                json!({
                    "solar": s.solar_pv_kw,
                    "pv_day": s.daily_pv_kwh,
                    "load_day": s.daily_load_kwh,
                    "batt": s.battery_soc_percent,
                    "load": s.total_load_kw,
                })
            })
            .unwrap_or(serde_json::Value::Null);

        format!(
            r#"You are AURA, the core energy controller.
USER INPUT: "{command}"

CONTEXT:
- Persistent Config: {settings}
- Live Telemetry: {telemetry}
- 24h Forecast: {forecast}

RULES:
1. If asking about data, answer using thermal or economic terms (COP, Entropy, ToU, Peak Shaving) if relevant.
2. Valid keys: field.base_load_kw, field.habit, field.autopilot, space.indoor_target, space.override, time.peak_price, time.offpeak_price.
3. If the user wants to save money, suggest lowering time.peak_price and explain the "Peak Shaving" strategy.
4. CRITICAL: Return ONLY a JSON object. No Markdown.

SCHEMA:
{{
  "delta": {{ "category": {{ "key": "value" }} }} or null,
  "feedback": "A single concise expert sentence in English."
}}"#
        )
    }

    /// Ask the model, then apply any returned delta as a user change
    pub async fn execute(
        &self,
        command: &str,
        telemetry: Option<&SimulationState>,
        forecast: &str,
    ) -> CommandOutcome {
        let raw = match self
            .generator
            .generate(&self.prompt(command, telemetry, forecast))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "advisor command failed");
                return CommandOutcome {
                    feedback: format!("Neural link severance: {e}"),
                    delta: None,
                    applied: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let reply = extract_reply(&raw);
        let Some(delta) = reply.delta.filter(|d| !d.is_empty()) else {
            return CommandOutcome {
                feedback: reply.feedback,
                delta: None,
                applied: false,
                error: None,
            };
        };

        match self.store.apply_delta(&delta, ChangeOrigin::User) {
            Ok(_) => {
                info!(feedback = %reply.feedback, "advisor command applied");
                CommandOutcome {
                    feedback: reply.feedback,
                    delta: Some(delta),
                    applied: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "advisor delta rejected");
                CommandOutcome {
                    feedback: reply.feedback,
                    delta: Some(delta),
                    applied: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
