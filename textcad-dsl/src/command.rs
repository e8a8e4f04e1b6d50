//! 绘图命令模型。
//!
//! 七种命令组成封闭的和类型，所有数值字段都可以缺省（`None`），
//! 由澄清引擎补齐。命令值不可原地修改：补齐字段时通过 `with_*`
//! 构造新值，原始的部分命令始终可用于重试。

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use textcad_core::units::LengthUnit;

/// `null` 与缺省字段一样按默认值处理。
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Absolute,
    Relative,
}

/// 坐标对。`relative` 坐标在编译时相对光标解析。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Coordinate {
    pub x: Option<Decimal>,
    pub y: Option<Decimal>,
    #[serde(deserialize_with = "null_as_default")]
    pub system: CoordinateSystem,
    pub unit: Option<LengthUnit>,
}

impl Coordinate {
    pub fn absolute(x: Decimal, y: Decimal) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn relative(x: Decimal, y: Decimal) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            system: CoordinateSystem::Relative,
            unit: None,
        }
    }

    /// 仅有一个分量的坐标视为完全未知。
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    #[inline]
    pub fn is_relative(&self) -> bool {
        self.system == CoordinateSystem::Relative
    }

    pub fn with_components(self, x: Decimal, y: Decimal) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..self
        }
    }

    pub fn with_unit(self, unit: Option<LengthUnit>) -> Self {
        Self { unit, ..self }
    }
}

/// 矩形 `position` 的语义：左下角或中心。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    #[default]
    Corner,
    Center,
}

impl Anchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::Corner => "corner",
            Anchor::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawCircle {
    #[serde(deserialize_with = "null_as_default")]
    pub center: Coordinate,
    pub radius: Option<Decimal>,
    pub radius_unit: Option<LengthUnit>,
}

impl DrawCircle {
    pub fn with_center(&self, center: Coordinate) -> Self {
        Self {
            center,
            ..self.clone()
        }
    }

    pub fn with_radius(&self, radius: Decimal) -> Self {
        Self {
            radius: Some(radius),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawLine {
    #[serde(deserialize_with = "null_as_default")]
    pub start: Coordinate,
    #[serde(deserialize_with = "null_as_default")]
    pub end: Coordinate,
}

impl DrawLine {
    pub fn with_start(&self, start: Coordinate) -> Self {
        Self {
            start,
            ..self.clone()
        }
    }

    pub fn with_end(&self, end: Coordinate) -> Self {
        Self {
            end,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawRect {
    #[serde(deserialize_with = "null_as_default")]
    pub anchor: Anchor,
    #[serde(deserialize_with = "null_as_default")]
    pub position: Coordinate,
    pub width: Option<Decimal>,
    pub width_unit: Option<LengthUnit>,
    pub height: Option<Decimal>,
    pub height_unit: Option<LengthUnit>,
}

impl DrawRect {
    pub fn with_position(&self, position: Coordinate) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn with_width(&self, width: Decimal) -> Self {
        Self {
            width: Some(width),
            ..self.clone()
        }
    }

    pub fn with_height(&self, height: Decimal) -> Self {
        Self {
            height: Some(height),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawPolyline {
    #[serde(deserialize_with = "null_as_default")]
    pub points: Vec<Coordinate>,
    #[serde(deserialize_with = "null_as_default")]
    pub closed: bool,
}

impl DrawPolyline {
    /// 替换第 `index` 个点；越界时原样返回副本。
    pub fn with_point(&self, index: usize, point: Coordinate) -> Self {
        let mut points = self.points.clone();
        if let Some(slot) = points.get_mut(index) {
            *slot = point;
        }
        Self {
            points,
            closed: self.closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawArc {
    #[serde(deserialize_with = "null_as_default")]
    pub center: Coordinate,
    pub radius: Option<Decimal>,
    pub radius_unit: Option<LengthUnit>,
    pub start_angle: Option<Decimal>,
    pub end_angle: Option<Decimal>,
}

impl DrawArc {
    pub fn with_center(&self, center: Coordinate) -> Self {
        Self {
            center,
            ..self.clone()
        }
    }

    pub fn with_radius(&self, radius: Decimal) -> Self {
        Self {
            radius: Some(radius),
            ..self.clone()
        }
    }

    pub fn with_angles(&self, start_angle: Decimal, end_angle: Decimal) -> Self {
        Self {
            start_angle: Some(start_angle),
            end_angle: Some(end_angle),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawEllipse {
    #[serde(deserialize_with = "null_as_default")]
    pub center: Coordinate,
    pub rx: Option<Decimal>,
    pub rx_unit: Option<LengthUnit>,
    pub ry: Option<Decimal>,
    pub ry_unit: Option<LengthUnit>,
    pub rotation: Option<Decimal>,
}

impl DrawEllipse {
    pub fn with_center(&self, center: Coordinate) -> Self {
        Self {
            center,
            ..self.clone()
        }
    }

    pub fn with_rx(&self, rx: Decimal) -> Self {
        Self {
            rx: Some(rx),
            ..self.clone()
        }
    }

    pub fn with_ry(&self, ry: Decimal) -> Self {
        Self {
            ry: Some(ry),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrawText {
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(deserialize_with = "null_as_default")]
    pub position: Coordinate,
    pub height: Option<Decimal>,
    pub height_unit: Option<LengthUnit>,
}

impl DrawText {
    pub fn with_position(&self, position: Coordinate) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn with_height(&self, height: Decimal) -> Self {
        Self {
            height: Some(height),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Circle,
    Line,
    Rect,
    Polyline,
    Arc,
    Ellipse,
    Text,
}

impl CommandKind {
    /// 字段键前缀，例如 `circle.radius` 中的 `circle`。
    pub fn prefix(self) -> &'static str {
        match self {
            CommandKind::Circle => "circle",
            CommandKind::Line => "line",
            CommandKind::Rect => "rect",
            CommandKind::Polyline => "polyline",
            CommandKind::Arc => "arc",
            CommandKind::Ellipse => "ellipse",
            CommandKind::Text => "text",
        }
    }

    pub fn type_tag(self) -> &'static str {
        match self {
            CommandKind::Circle => "draw_circle",
            CommandKind::Line => "draw_line",
            CommandKind::Rect => "draw_rect",
            CommandKind::Polyline => "draw_polyline",
            CommandKind::Arc => "draw_arc",
            CommandKind::Ellipse => "draw_ellipse",
            CommandKind::Text => "draw_text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "draw_circle")]
    Circle(DrawCircle),
    #[serde(rename = "draw_line")]
    Line(DrawLine),
    #[serde(rename = "draw_rect")]
    Rect(DrawRect),
    #[serde(rename = "draw_polyline")]
    Polyline(DrawPolyline),
    #[serde(rename = "draw_arc")]
    Arc(DrawArc),
    #[serde(rename = "draw_ellipse")]
    Ellipse(DrawEllipse),
    #[serde(rename = "draw_text")]
    Text(DrawText),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Circle(_) => CommandKind::Circle,
            Command::Line(_) => CommandKind::Line,
            Command::Rect(_) => CommandKind::Rect,
            Command::Polyline(_) => CommandKind::Polyline,
            Command::Arc(_) => CommandKind::Arc,
            Command::Ellipse(_) => CommandKind::Ellipse,
            Command::Text(_) => CommandKind::Text,
        }
    }

    /// 所有必填字段均已给出。
    pub fn is_ready(&self) -> bool {
        match self {
            Command::Circle(c) => c.radius.is_some() && c.center.is_complete(),
            Command::Line(l) => l.start.is_complete() && l.end.is_complete(),
            Command::Rect(r) => {
                r.width.is_some() && r.height.is_some() && r.position.is_complete()
            }
            Command::Polyline(p) => p.points.iter().all(Coordinate::is_complete),
            Command::Arc(a) => a.radius.is_some() && a.center.is_complete(),
            Command::Ellipse(e) => e.rx.is_some() && e.ry.is_some() && e.center.is_complete(),
            Command::Text(t) => t.position.is_complete(),
        }
    }

    /// 需要非负校验的长度字段。
    pub fn magnitudes(&self) -> Vec<(&'static str, Option<Decimal>)> {
        match self {
            Command::Circle(c) => vec![("radius", c.radius)],
            Command::Rect(r) => vec![("width", r.width), ("height", r.height)],
            Command::Arc(a) => vec![("radius", a.radius)],
            Command::Ellipse(e) => vec![("rx", e.rx), ("ry", e.ry)],
            Command::Text(t) => vec![("height", t.height)],
            Command::Line(_) | Command::Polyline(_) => Vec::new(),
        }
    }
}

impl From<DrawCircle> for Command {
    fn from(value: DrawCircle) -> Self {
        Command::Circle(value)
    }
}

impl From<DrawLine> for Command {
    fn from(value: DrawLine) -> Self {
        Command::Line(value)
    }
}

impl From<DrawRect> for Command {
    fn from(value: DrawRect) -> Self {
        Command::Rect(value)
    }
}

/// 生成式解析器返回的外层结构 `{ "commands": [...] }`。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandList {
    pub commands: Vec<Command>,
}
