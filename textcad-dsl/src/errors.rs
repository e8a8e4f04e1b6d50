use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use textcad_core::units::UnitError;
use thiserror::Error;

/// 结构校验失败时的单条问题，`loc` 为点分路径。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub loc: String,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationIssue {
    pub fn new(loc: impl Into<String>, msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            msg: msg.into(),
            kind: kind.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("loc".to_string(), Value::String(self.loc.clone()));
        map.insert("msg".to_string(), Value::String(self.msg.clone()));
        map.insert("type".to_string(), Value::String(self.kind.clone()));
        Value::Object(map)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.loc, self.msg, self.kind)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no canonical rule matched the sentence. Input: {input}")]
    UnrecognizedUtterance { input: String },
    #[error("coordinate must be in the form (x,y) with numeric values. Problematic token: {token}")]
    CoordinateSyntax { token: String },
    #[error("circle radius is required for this utterance: {clause}")]
    RadiusRequired { clause: String },
    #[error("rectangle width and height are required: {clause}")]
    DimensionRequired { clause: String },
    #[error("text generation provider is unavailable: {reason}")]
    ProviderUnavailable { reason: String },
    #[error("provider response did not satisfy the command schema: {}", join_issues(.issues))]
    SchemaValidationFailed { issues: Vec<ValidationIssue> },
    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnrecognizedUtterance { .. } => "E100",
            ParseError::CoordinateSyntax { .. } => "E101",
            ParseError::RadiusRequired { .. } => "E102",
            ParseError::DimensionRequired { .. } => "E103",
            ParseError::ProviderUnavailable { .. } => "E200",
            ParseError::SchemaValidationFailed { .. } => "E201",
            ParseError::Unit(err) => err.code(),
        }
    }

    pub(crate) fn invalid_value(loc: &str, msg: impl Into<String>, kind: &str) -> Self {
        ParseError::SchemaValidationFailed {
            issues: vec![ValidationIssue::new(loc, msg, kind)],
        }
    }
}
