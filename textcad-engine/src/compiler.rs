use rust_decimal::Decimal;
use textcad_core::bundle::DrawingBundle;
use textcad_core::geometry::{
    Arc, Circle, DEFAULT_LAYER, Ellipse, Line, Point, Polyline, Rectangle, TextLabel,
};
use textcad_core::units::{LengthUnit, to_canonical};
use textcad_dsl::{Anchor, Command, Coordinate};
use tracing::debug;

use crate::errors::CompileError;

// 澄清后仍缺失的字段使用以下毫米值。
const CIRCLE_RADIUS_MM: i64 = 10;
const RECT_SIDE_MM: i64 = 100;
const ARC_RADIUS_MM: i64 = 10;
const ELLIPSE_RX_MM: i64 = 25;
const ELLIPSE_RY_MM: i64 = 15;
const TEXT_HEIGHT_MM: i64 = 5;
const FULL_SWEEP_DEG: i64 = 360;

/// 命令编译器：把命令转换为毫米单位的几何实体。
///
/// 维护一个光标，初始为原点；每个解析出的坐标（绝对或相对）都会
/// 把光标移到自身位置，相对坐标据此按命令顺序累加。
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    default_unit: LengthUnit,
    layer: String,
    cursor: Point,
}

impl CommandCompiler {
    pub fn new(default_unit: LengthUnit) -> Self {
        Self {
            default_unit,
            layer: DEFAULT_LAYER.to_string(),
            cursor: Point::ORIGIN,
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    pub fn default_unit(&self) -> LengthUnit {
        self.default_unit
    }

    #[inline]
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    fn length(&self, value: Decimal, unit: Option<LengthUnit>) -> Result<Decimal, CompileError> {
        Ok(to_canonical(value, unit.unwrap_or(self.default_unit))?)
    }

    fn magnitude(
        &self,
        value: Option<Decimal>,
        unit: Option<LengthUnit>,
        fallback_mm: i64,
    ) -> Result<Decimal, CompileError> {
        match value {
            Some(value) => self.length(value, unit),
            None => Ok(Decimal::from(fallback_mm)),
        }
    }

    fn resolve(
        &self,
        cursor: &mut Point,
        coordinate: &Coordinate,
        field: &str,
    ) -> Result<Point, CompileError> {
        let dx = self.length(coordinate.x.unwrap_or_default(), coordinate.unit)?;
        let dy = self.length(coordinate.y.unwrap_or_default(), coordinate.unit)?;
        let point = if coordinate.is_relative() {
            cursor.offset(dx, dy).ok_or_else(|| overflow(field))?
        } else {
            Point::new(dx, dy)
        };
        *cursor = point;
        Ok(point)
    }

    /// 编译一组命令。任一命令失败时不产出实体，光标保持调用前的位置。
    pub fn compile(&mut self, commands: &[Command]) -> Result<DrawingBundle, CompileError> {
        let mut bundle = DrawingBundle::new();
        let mut cursor = self.cursor;
        let layer = self.layer.clone();

        for command in commands {
            match command {
                Command::Circle(circle) => {
                    let radius =
                        self.magnitude(circle.radius, circle.radius_unit, CIRCLE_RADIUS_MM)?;
                    let center = self.resolve(&mut cursor, &circle.center, "circle.center")?;
                    bundle.circles.push(Circle {
                        center,
                        radius,
                        layer: layer.clone(),
                    });
                }
                Command::Line(line) => {
                    let start = self.resolve(&mut cursor, &line.start, "line.start")?;
                    let end = self.resolve(&mut cursor, &line.end, "line.end")?;
                    bundle.lines.push(Line {
                        start,
                        end,
                        layer: layer.clone(),
                    });
                }
                Command::Rect(rect) => {
                    let width = self.magnitude(rect.width, rect.width_unit, RECT_SIDE_MM)?;
                    let height = self.magnitude(rect.height, rect.height_unit, RECT_SIDE_MM)?;
                    let position = self.resolve(&mut cursor, &rect.position, "rect.position")?;
                    let origin = match rect.anchor {
                        Anchor::Corner => position,
                        Anchor::Center => position
                            .offset(-width / Decimal::TWO, -height / Decimal::TWO)
                            .ok_or_else(|| overflow("rect.position"))?,
                    };
                    let rectangle = Rectangle {
                        origin,
                        width,
                        height,
                        layer: layer.clone(),
                    };
                    rectangle.far_corner().ok_or_else(|| overflow("rect.size"))?;
                    bundle.rectangles.push(rectangle);
                }
                Command::Polyline(polyline) => {
                    let points = polyline
                        .points
                        .iter()
                        .map(|p| self.resolve(&mut cursor, p, "polyline.points"))
                        .collect::<Result<Vec<_>, _>>()?;
                    if !points.is_empty() {
                        bundle.polylines.push(Polyline {
                            points,
                            closed: polyline.closed,
                            layer: layer.clone(),
                        });
                    }
                }
                Command::Arc(arc) => {
                    let radius = self.magnitude(arc.radius, arc.radius_unit, ARC_RADIUS_MM)?;
                    let center = self.resolve(&mut cursor, &arc.center, "arc.center")?;
                    bundle.arcs.push(Arc {
                        center,
                        radius,
                        start_angle: arc.start_angle.unwrap_or(Decimal::ZERO),
                        end_angle: arc
                            .end_angle
                            .unwrap_or_else(|| Decimal::from(FULL_SWEEP_DEG)),
                        layer: layer.clone(),
                    });
                }
                Command::Ellipse(ellipse) => {
                    let rx = self.magnitude(ellipse.rx, ellipse.rx_unit, ELLIPSE_RX_MM)?;
                    let ry = self.magnitude(ellipse.ry, ellipse.ry_unit, ELLIPSE_RY_MM)?;
                    let center = self.resolve(&mut cursor, &ellipse.center, "ellipse.center")?;
                    bundle.ellipses.push(Ellipse {
                        center,
                        rx,
                        ry,
                        rotation: ellipse.rotation.unwrap_or(Decimal::ZERO),
                        layer: layer.clone(),
                    });
                }
                Command::Text(text) => {
                    let position = self.resolve(&mut cursor, &text.position, "text.position")?;
                    let height =
                        self.magnitude(text.height, text.height_unit, TEXT_HEIGHT_MM)?;
                    bundle.texts.push(TextLabel {
                        text: text.text.clone(),
                        position,
                        height,
                        layer: layer.clone(),
                    });
                }
            }
        }

        self.cursor = cursor;
        debug!(
            commands = commands.len(),
            entities = bundle.len(),
            cursor_x = %self.cursor.x,
            cursor_y = %self.cursor.y,
            "命令编译完成"
        );
        Ok(bundle)
    }
}

fn overflow(field: &str) -> CompileError {
    CompileError::CoordinateOverflow {
        field: field.to_string(),
    }
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::new(LengthUnit::Millimeter)
    }
}
