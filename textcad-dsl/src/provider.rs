//! 文本生成协作方接口与提供方注册表。

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ParseError;

/// 每次请求附带的上下文（`attempt`、`utterance`、调用方键、`errors`）。
pub type GenerationContext = BTreeMap<String, Value>;

/// 协作方的返回：原始文本（将被解析为 JSON）或已结构化的数据。
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Text(String),
    Structured(Value),
}

/// 外部文本生成协作方。每次调用都是独立请求，可安全重试。
pub trait TextGenerator: Send {
    fn name(&self) -> &str;

    /// 请求失败时返回可读的原因。
    fn generate(
        &mut self,
        prompt: &str,
        schema: &Value,
        context: &GenerationContext,
    ) -> Result<Generated, String>;
}

/// 开发与测试用的提供方：若原句本身是 JSON 对象则原样返回，
/// 否则返回空命令列表。
#[derive(Debug, Default, Clone)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl TextGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate(
        &mut self,
        _prompt: &str,
        _schema: &Value,
        context: &GenerationContext,
    ) -> Result<Generated, String> {
        let utterance = context
            .get("utterance")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match serde_json::from_str::<Value>(utterance) {
            Ok(payload @ Value::Object(_)) => Ok(Generated::Structured(payload)),
            _ => {
                let mut empty = Map::new();
                empty.insert("commands".to_string(), Value::Array(Vec::new()));
                Ok(Generated::Structured(Value::Object(empty)))
            }
        }
    }
}

/// 构造提供方时使用的设置。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSettings {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub api_key: Option<String>,
    pub extra: BTreeMap<String, String>,
}

pub type ProviderFactory =
    Box<dyn Fn(&ProviderSettings) -> Result<Box<dyn TextGenerator>, ParseError> + Send + Sync>;

/// 表示“不使用生成式解析”的提供方名称。
pub fn is_disabled(name: &str) -> bool {
    matches!(
        name.trim().to_ascii_lowercase().as_str(),
        "" | "none" | "off" | "disabled"
    )
}

/// 按名称解析提供方。启动时构造一次，按引用传给需要的组件。
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// 内置 `mock` 提供方的注册表。
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("mock", |_settings| {
            Ok(Box::new(MockGenerator::new()) as Box<dyn TextGenerator>)
        });
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ProviderSettings) -> Result<Box<dyn TextGenerator>, ParseError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(name.trim().to_ascii_lowercase(), Box::new(factory));
    }

    pub fn resolve(
        &self,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn TextGenerator>, ParseError> {
        if is_disabled(name) {
            return Err(ParseError::ProviderUnavailable {
                reason: "text generation provider disabled".to_string(),
            });
        }
        let key = name.trim().to_ascii_lowercase();
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| ParseError::ProviderUnavailable {
                reason: format!("unknown provider '{name}'"),
            })?;
        debug!(provider = %key, model = ?settings.model, "构造文本生成提供方");
        factory(settings)
    }

    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
