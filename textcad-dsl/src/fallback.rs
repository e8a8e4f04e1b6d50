use serde_json::Value;
use tracing::{info, warn};

use crate::command::Command;
use crate::errors::{ParseError, ValidationIssue};
use crate::provider::{Generated, GenerationContext, TextGenerator};
use crate::schema::{command_schema, validate_payload};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

const PROMPT_TEMPLATE: &str = "\
You are a CAD command extraction assistant.
Extract drawing commands from the user utterance below.
Return **only** JSON that satisfies this schema: {schema}
Use the command types draw_circle, draw_line, draw_rect, draw_polyline, draw_arc, draw_ellipse, draw_text.
Coerce numeric strings to numbers. Use null when data is missing.
User utterance: {utterance}";

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn issues_value(issues: &[ValidationIssue]) -> Value {
    Value::Array(issues.iter().map(ValidationIssue::to_value).collect())
}

/// 去掉模型常见的 ```json 代码块包裹。
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// 生成式兜底解析器：把原句与命令 Schema 发给协作方，
/// 校验失败时带上问题列表重试，最多 `max_attempts` 次。
pub struct GenerativeParser {
    generator: Box<dyn TextGenerator>,
    max_attempts: usize,
    schema: Value,
}

impl GenerativeParser {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            schema: command_schema(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn format_prompt(&self, utterance: &str, issues: &[ValidationIssue]) -> String {
        let mut prompt = PROMPT_TEMPLATE
            .replace("{schema}", &pretty(&self.schema))
            .replace("{utterance}", utterance);
        if !issues.is_empty() {
            prompt.push_str("\nPrevious response failed validation with these issues:\n");
            prompt.push_str(&pretty(&issues_value(issues)));
            prompt.push_str("\nPlease fix them in the next response.");
        }
        prompt
    }

    /// 结果可能是部分命令（字段为 `None`），由澄清引擎补齐。
    pub fn parse(
        &mut self,
        utterance: &str,
        context: &GenerationContext,
    ) -> Result<Vec<Command>, ParseError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        for attempt in 0..self.max_attempts {
            let prompt = self.format_prompt(utterance, &issues);

            // 调用方上下文先放入，保留键总是以本次尝试的值为准。
            let mut request = context.clone();
            request.insert("attempt".to_string(), Value::from(attempt));
            request.insert("utterance".to_string(), Value::from(utterance));
            request.remove("errors");
            if !issues.is_empty() {
                request.insert("errors".to_string(), issues_value(&issues));
            }

            let response = self
                .generator
                .generate(&prompt, &self.schema, &request)
                .map_err(|reason| ParseError::ProviderUnavailable { reason })?;

            let payload = match response {
                Generated::Structured(value) => value,
                Generated::Text(text) => match serde_json::from_str::<Value>(strip_code_fence(&text)) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(attempt, error = %err, "生成结果不是合法 JSON");
                        issues = vec![ValidationIssue::new("$", err.to_string(), "json_parse_error")];
                        continue;
                    }
                },
            };

            match validate_payload(&payload) {
                Ok(commands) => {
                    info!(
                        provider = self.generator.name(),
                        attempt,
                        commands = commands.len(),
                        "生成式解析成功"
                    );
                    return Ok(commands);
                }
                Err(found) => {
                    warn!(attempt, issues = found.len(), "生成结果未通过校验");
                    issues = found;
                }
            }
        }

        Err(ParseError::SchemaValidationFailed { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Anchor, Command};
    use crate::provider::MockGenerator;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// 依次返回预设响应并记录每次请求的上下文。
    struct Scripted {
        responses: Vec<Generated>,
        seen: Arc<Mutex<Vec<GenerationContext>>>,
    }

    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(
            &mut self,
            _prompt: &str,
            _schema: &Value,
            context: &GenerationContext,
        ) -> Result<Generated, String> {
            self.seen.lock().unwrap().push(context.clone());
            if self.responses.is_empty() {
                return Err("script exhausted".to_string());
            }
            Ok(self.responses.remove(0))
        }
    }

    fn scripted(responses: Vec<Generated>) -> (GenerativeParser, Arc<Mutex<Vec<GenerationContext>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let generator = Scripted {
            responses,
            seen: Arc::clone(&seen),
        };
        (GenerativeParser::new(Box::new(generator)), seen)
    }

    fn valid_rect() -> Value {
        json!({"commands": [{"type": "draw_rect", "width": 20, "height": 30,
                             "position": {"x": 0, "y": 0}}]})
    }

    #[test]
    fn retry_feeds_back_issues() {
        let (mut parser, seen) = scripted(vec![
            Generated::Structured(json!({"commands": [{"type": "draw_rect", "width": -3}]})),
            Generated::Structured(valid_rect()),
        ]);
        let retried = parser.parse("draw a rectangle", &GenerationContext::new()).unwrap();

        let (mut direct, _) = scripted(vec![Generated::Structured(valid_rect())]);
        let immediate = direct.parse("draw a rectangle", &GenerationContext::new()).unwrap();
        assert_eq!(retried, immediate);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].contains_key("errors"));
        assert_eq!(seen[1]["attempt"], 1);
        assert_eq!(seen[1]["errors"][0]["loc"], "commands.0.width");
    }

    #[test]
    fn text_responses_are_parsed() {
        let (mut parser, _) = scripted(vec![
            Generated::Text("not json".to_string()),
            Generated::Text(format!("```json\n{}\n```", valid_rect())),
        ]);
        let commands = parser.parse("rect", &GenerationContext::new()).unwrap();
        assert!(matches!(&commands[0], Command::Rect(r) if r.anchor == Anchor::Corner));
    }

    #[test]
    fn exhausted_retries_carry_last_issues() {
        let bad = Generated::Structured(json!({"commands": [{"type": "draw_blob"}]}));
        let (mut parser, seen) = scripted(vec![bad.clone(), bad.clone(), bad]);
        let err = parser.parse("blob", &GenerationContext::new()).unwrap_err();
        match err {
            ParseError::SchemaValidationFailed { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].kind, "schema");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(seen.lock().unwrap().len(), DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn generator_failure_is_provider_unavailable() {
        let (parser, _) = scripted(Vec::new());
        let mut parser = parser.with_max_attempts(0);
        assert_eq!(parser.max_attempts(), 1);
        let err = parser.parse("anything", &GenerationContext::new()).unwrap_err();
        assert_eq!(err.code(), "E200");
    }

    #[test]
    fn caller_context_is_forwarded() {
        let (mut parser, seen) = scripted(vec![Generated::Structured(json!({"commands": []}))]);
        let mut context = GenerationContext::new();
        context.insert("project".to_string(), json!("demo"));
        parser.parse("nothing", &context).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["project"], "demo");
        assert_eq!(seen[0]["utterance"], "nothing");
    }

    #[test]
    fn mock_round_trips_json_utterance() {
        let mut parser = GenerativeParser::new(Box::new(MockGenerator::new()));
        let utterance = valid_rect().to_string();
        let commands = parser.parse(&utterance, &GenerationContext::new()).unwrap();
        assert_eq!(commands.len(), 1);
        assert!(parser.format_prompt("x", &[]).contains("draw_ellipse"));
    }

    #[test]
    fn caller_context_cannot_shadow_attempt_fields() {
        let (mut parser, seen) = scripted(vec![
            Generated::Structured(json!({"commands": [{"type": "draw_rect", "width": -3}]})),
            Generated::Structured(valid_rect()),
        ]);
        let mut context = GenerationContext::new();
        context.insert("attempt".to_string(), json!("x"));
        context.insert("utterance".to_string(), json!("y"));
        context.insert("errors".to_string(), json!("stale"));
        context.insert("project".to_string(), json!("site-a"));
        parser.parse("draw a rectangle", &context).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["attempt"], json!(0));
        assert_eq!(seen[0]["utterance"], json!("draw a rectangle"));
        assert!(!seen[0].contains_key("errors"));
        assert_eq!(seen[0]["project"], json!("site-a"));
        assert_eq!(seen[1]["attempt"], json!(1));
        assert!(seen[1]["errors"].is_array());
    }
}
