//! 规范句式目录。
//!
//! 规则按顺序尝试，首个匹配生效。任意两条规则不得接受同一输入，
//! 新增句式时需同时补充 `example`，由测试做两两互斥检查。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::Anchor;

const NUMBER: &str = r"-?\d+(?:\.\d+)?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Circle,
    Line,
    Rect(Anchor),
}

#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub kind: RuleKind,
    /// 该规则的规范例句。
    pub example: &'static str,
    pub pattern: Regex,
}

fn coord(prefix: &str) -> String {
    format!(
        r"(?:(?P<{prefix}rel>rel(?:ative)?)\s*)?\(\s*(?P<{prefix}x>{NUMBER})\s*,\s*(?P<{prefix}y>{NUMBER})\s*\)"
    )
}

/// 带可选单位后缀的量值，例如 `50`、`2in`、`12.5 mm`。
fn magnitude(name: &str) -> String {
    format!(r"(?P<{name}>{NUMBER})(?:\s*(?P<{name}_unit>mm|in)\b)?")
}

fn dims() -> String {
    format!(
        r"(?:\s+w\s*=\s*{})?(?:\s+h\s*=\s*{})?",
        magnitude("width"),
        magnitude("height")
    )
}

fn rule(name: &'static str, kind: RuleKind, example: &'static str, body: String) -> Rule {
    let source = format!(r"(?i)^\s*{body}\s*$");
    let pattern = Regex::new(&source)
        .unwrap_or_else(|err| panic!("rule `{name}` has an invalid pattern: {err}"));
    Rule {
        name,
        kind,
        example,
        pattern,
    }
}

pub static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let center = coord("center_");
    let start = coord("start_");
    let end = coord("end_");
    let position = coord("position_");
    let radius = magnitude("radius");
    let dims = dims();

    vec![
        rule(
            "circle_at",
            RuleKind::Circle,
            "draw circle r=50 at (100,100)",
            format!(r"draw\s+circle(?:\s+r\s*=\s*{radius})?\s+at\s+{center}"),
        ),
        rule(
            "circle_radius_center",
            RuleKind::Circle,
            "draw circle radius=25 center rel(10,-5)",
            format!(r"draw\s+circle(?:\s+radius\s*=\s*{radius})?\s+center\s+{center}"),
        ),
        rule(
            "circle_at_center",
            RuleKind::Circle,
            "circle radius 40 at relative (0,0)",
            format!(r"circle(?:\s+radius\s+{radius})?\s+at\s+{center}"),
        ),
        rule(
            "line_from_to",
            RuleKind::Line,
            "draw line from (0,0) to (10,0)",
            format!(r"draw\s+line\s+from\s+{start}\s+to\s+{end}"),
        ),
        rule(
            "line_connect",
            RuleKind::Line,
            "connect (1.5,2) to rel(3,4)",
            format!(r"connect\s+{start}\s+to\s+{end}"),
        ),
        rule(
            "rect_at",
            RuleKind::Rect(Anchor::Corner),
            "draw rect w=20 h=30 at (0,0)",
            format!(r"draw\s+rect{dims}\s+at\s+{position}"),
        ),
        rule(
            "rect_corner",
            RuleKind::Rect(Anchor::Corner),
            "rect w=20 h=30 corner (5,5)",
            format!(r"rect{dims}\s+corner\s+{position}"),
        ),
        rule(
            "rect_center",
            RuleKind::Rect(Anchor::Center),
            "draw rect w=20 h=30 center (10,10)",
            format!(r"draw\s+rect{dims}\s+center\s+{position}"),
        ),
        rule(
            "rect_make_center",
            RuleKind::Rect(Anchor::Center),
            "make rectangle w=2in h=1in center rel(0,0)",
            format!(r"make\s+rectangle{dims}\s+center\s+{position}"),
        ),
        rule(
            "rect_make_at",
            RuleKind::Rect(Anchor::Corner),
            "make rectangle w=40 h=10 at (-5,-5)",
            format!(r"make\s+rectangle{dims}\s+at\s+{position}"),
        ),
    ]
});

/// 子句分隔符：`;` 或独立的 `and`。
pub static CONNECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:;|\band\b)\s*").unwrap_or_else(|err| panic!("connector: {err}"))
});

/// 句中所有括号片段，用于坐标语法检查。
pub static PAREN_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap_or_else(|err| panic!("paren token: {err}")));

pub static COORDINATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*\(\s*{NUMBER}\s*,\s*{NUMBER}\s*\)\s*$"))
        .unwrap_or_else(|err| panic!("coordinate token: {err}"))
});

pub fn rules() -> &'static [Rule] {
    &RULES
}
