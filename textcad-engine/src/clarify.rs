//! 澄清引擎。
//!
//! 对每条命令的每个必填字段依次尝试：已给出值、待消费的回答、
//! 记忆中的默认值，都没有时生成追问。一次调用返回全部未决问题。
//! 输入命令不会被修改，补齐结果总是新值。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use textcad_core::store::MemoryValue;
use textcad_dsl::{Command, Coordinate};
use tracing::{debug, warn};

use crate::errors::MemoryError;
use crate::memory::SessionMemory;

/// 表示“沿用上一次的值”的回答（忽略大小写）。
pub const REUSE_PHRASES: &[&str] = &[
    "use previous value",
    "use previous",
    "reuse previous",
    "previous",
    "same",
    "last",
    "prior",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    /// 回答需写入会话记忆的键。
    pub id: String,
    pub command_index: usize,
    /// 字段键，例如 `circle.radius`。
    pub field: String,
    pub prompt: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(Vec<Command>),
    FollowUps(Vec<FollowUpQuestion>),
}

/// 必须为正数的字段名（字段键的最后一段）。
const MAGNITUDE_FIELDS: &[&str] = &["radius", "width", "height", "rx", "ry"];

fn is_magnitude(field: &str) -> bool {
    field
        .rsplit('.')
        .next()
        .is_some_and(|name| MAGNITUDE_FIELDS.contains(&name))
}

pub fn answer_key(command_index: usize, field: &str) -> String {
    format!("answer.{command_index}.{field}")
}

enum Answer {
    Reuse,
    Number(Decimal),
    Unparsed(String),
}

fn interpret(value: &MemoryValue) -> Answer {
    match value {
        MemoryValue::Number(number) => Answer::Number(*number),
        MemoryValue::Text(text) => {
            let normalized = text.trim().to_lowercase();
            if REUSE_PHRASES.contains(&normalized.as_str()) {
                Answer::Reuse
            } else if let Ok(number) = Decimal::from_str(text.trim()) {
                Answer::Number(number)
            } else {
                Answer::Unparsed(text.clone())
            }
        }
    }
}

struct Resolver<'a> {
    session: &'a mut SessionMemory,
    followups: Vec<FollowUpQuestion>,
}

impl Resolver<'_> {
    fn ask(&mut self, index: usize, field: &str, prompt: String) {
        self.followups.push(FollowUpQuestion {
            id: answer_key(index, field),
            command_index: index,
            field: field.to_string(),
            prompt,
            expected: "number".to_string(),
        });
    }

    fn stored_default(&self, field: &str) -> Option<Decimal> {
        self.session
            .get_default(field)
            .and_then(MemoryValue::as_decimal)
    }

    fn number(
        &mut self,
        index: usize,
        field: &str,
        current: Option<Decimal>,
        prompt: &str,
    ) -> Result<Option<Decimal>, MemoryError> {
        if let Some(value) = current {
            self.session
                .remember_default(field, MemoryValue::Number(value))?;
            return Ok(Some(value));
        }

        let key = answer_key(index, field);
        let answer = match self.session.pop(&key) {
            Ok(answer) => answer,
            Err(MemoryError::Expired { .. }) => {
                warn!(key = %key, "回答已过期，重新追问");
                None
            }
            Err(err) => return Err(err),
        };

        if let Some(answer) = answer {
            match interpret(&answer) {
                Answer::Reuse => {
                    if let Some(previous) = self.stored_default(field) {
                        debug!(field, value = %previous, "沿用上一次的值");
                        return Ok(Some(previous));
                    }
                }
                Answer::Number(value) if is_magnitude(field) && value <= Decimal::ZERO => {
                    warn!(field, value = %value, "尺寸回答必须为正数，重新追问");
                    self.ask(index, field, format!("{prompt} (must be positive, got {value})"));
                    return Ok(None);
                }
                Answer::Number(value) => {
                    self.session
                        .remember_default(field, MemoryValue::Number(value))?;
                    return Ok(Some(value));
                }
                Answer::Unparsed(raw) => {
                    self.ask(index, field, format!("{prompt} (could not interpret '{raw}')"));
                    return Ok(None);
                }
            }
        }

        if let Some(previous) = self.stored_default(field) {
            return Ok(Some(previous));
        }

        self.ask(index, field, prompt.to_string());
        Ok(None)
    }

    /// 坐标两个分量一起解析；只有一个分量的坐标按完全未知处理。
    fn point(
        &mut self,
        index: usize,
        base: &str,
        coordinate: &Coordinate,
        noun: &str,
    ) -> Result<Coordinate, MemoryError> {
        let (x, y) = if coordinate.is_complete() {
            (coordinate.x, coordinate.y)
        } else {
            (None, None)
        };
        let x = self.number(
            index,
            &format!("{base}.x"),
            x,
            &format!("Provide the {noun} X coordinate."),
        )?;
        let y = self.number(
            index,
            &format!("{base}.y"),
            y,
            &format!("Provide the {noun} Y coordinate."),
        )?;
        Ok(match (x, y) {
            (Some(x), Some(y)) => coordinate.with_components(x, y),
            _ => *coordinate,
        })
    }

    fn command(&mut self, index: usize, command: &Command) -> Result<Command, MemoryError> {
        let resolved = match command {
            Command::Circle(circle) => {
                let radius = self.number(
                    index,
                    "circle.radius",
                    circle.radius,
                    "What radius should the circle have?",
                )?;
                let center = self.point(index, "circle.center", &circle.center, "circle centre")?;
                let mut next = circle.with_center(center);
                if let Some(radius) = radius {
                    next = next.with_radius(radius);
                }
                Command::Circle(next)
            }
            Command::Line(line) => {
                let start = self.point(index, "line.start", &line.start, "line start")?;
                let end = self.point(index, "line.end", &line.end, "line end")?;
                Command::Line(line.with_start(start).with_end(end))
            }
            Command::Rect(rect) => {
                let width = self.number(
                    index,
                    "rect.width",
                    rect.width,
                    "What width should the rectangle have?",
                )?;
                let height = self.number(
                    index,
                    "rect.height",
                    rect.height,
                    "What height should the rectangle have?",
                )?;
                let anchor = rect.anchor.as_str();
                let position = self.point(
                    index,
                    &format!("rect.{anchor}"),
                    &rect.position,
                    &format!("rectangle {anchor}"),
                )?;
                let mut next = rect.with_position(position);
                if let Some(width) = width {
                    next = next.with_width(width);
                }
                if let Some(height) = height {
                    next = next.with_height(height);
                }
                Command::Rect(next)
            }
            Command::Polyline(polyline) => {
                let mut next = polyline.clone();
                for (point_index, point) in polyline.points.iter().enumerate() {
                    let resolved = self.point(
                        index,
                        &format!("polyline.point{point_index}"),
                        point,
                        &format!("polyline point {}", point_index + 1),
                    )?;
                    next = next.with_point(point_index, resolved);
                }
                Command::Polyline(next)
            }
            Command::Arc(arc) => {
                let radius = self.number(
                    index,
                    "arc.radius",
                    arc.radius,
                    "What radius should the arc have?",
                )?;
                let center = self.point(index, "arc.center", &arc.center, "arc centre")?;
                let mut next = arc.with_center(center);
                if let Some(radius) = radius {
                    next = next.with_radius(radius);
                }
                Command::Arc(next)
            }
            Command::Ellipse(ellipse) => {
                let rx = self.number(
                    index,
                    "ellipse.rx",
                    ellipse.rx,
                    "What X semi-axis should the ellipse have?",
                )?;
                let ry = self.number(
                    index,
                    "ellipse.ry",
                    ellipse.ry,
                    "What Y semi-axis should the ellipse have?",
                )?;
                let center =
                    self.point(index, "ellipse.center", &ellipse.center, "ellipse centre")?;
                let mut next = ellipse.with_center(center);
                if let Some(rx) = rx {
                    next = next.with_rx(rx);
                }
                if let Some(ry) = ry {
                    next = next.with_ry(ry);
                }
                Command::Ellipse(next)
            }
            Command::Text(text) => {
                let position =
                    self.point(index, "text.position", &text.position, "text position")?;
                Command::Text(text.with_position(position))
            }
        };
        Ok(resolved)
    }
}

/// 执行一轮澄清。缺失数据永远表示为追问，只有存储故障会返回错误。
pub fn clarify(
    commands: &[Command],
    session: &mut SessionMemory,
) -> Result<Resolution, MemoryError> {
    let mut resolver = Resolver {
        session,
        followups: Vec::new(),
    };
    let mut resolved = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        resolved.push(resolver.command(index, command)?);
    }

    if resolver.followups.is_empty() {
        debug!(commands = resolved.len(), "澄清完成");
        Ok(Resolution::Ready(resolved))
    } else {
        debug!(questions = resolver.followups.len(), "仍需追问");
        Ok(Resolution::FollowUps(resolver.followups))
    }
}
