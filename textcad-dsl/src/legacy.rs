//! 旧版自由文本匹配器。
//!
//! 语法比规范句式宽松（支持 cm / m、圆弧、椭圆、多段线、文字与
//! `save as`），但不保证完备。产出的命令已全部换算为毫米，
//! 字段齐全，可直接编译，不经过澄清引擎。

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use textcad_core::units::{LengthUnit, legacy_to_mm, quantize};
use tracing::debug;

use crate::command::{
    Anchor, Command, Coordinate, DrawArc, DrawCircle, DrawEllipse, DrawLine, DrawPolyline,
    DrawRect, DrawText,
};
use crate::errors::ParseError;

const COORD: &str = r"\(?\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)?";
const UNIT_WORD: &str = r"(?:mm|millimeters?|inch(?:es)?|in|cm|centimeters?|m|meters?)";
const NUMBER: &str = r"(-?\d+(?:\.\d+)?)";

/// 旧版矩形未给尺寸时的边长（毫米）。
const RECT_FALLBACK_MM: i64 = 100;
/// 旧版文字未给高度时的字高（毫米）。
const TEXT_FALLBACK_MM: i64 = 100;

fn float_unit() -> String {
    format!(r"{NUMBER}(?:\s*({UNIT_WORD}))?")
}

fn compile(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|err| panic!("legacy pattern `{source}`: {err}"))
}

static SEPARATORS: Lazy<Regex> = Lazy::new(|| compile(r"[;\n]+"));
static SAVE: Lazy<Regex> = Lazy::new(|| compile(r"(?i)save\s+as\s+([^\s]+\.dxf)"));
static CIRCLE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)(?:\b(\d+(?:\.\d+)?)\s*({UNIT_WORD})\s*circle\b|\bcircle\b.*?\bradius\s*{fu}).*?(?:at|center)\s*{COORD}",
        fu = float_unit()
    ))
});
static LINE: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"(?i)\bline\s+from\s+{COORD}\s+to\s+{COORD}")));
static RECT_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(?:circle|line|arc|polyline|ellipse|text|save|rectangle)\b")
});
static WIDTH: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"(?i)\bwidth\s*{}", float_unit())));
static HEIGHT: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"(?i)\bheight\s*{}", float_unit())));
static SHORTHAND: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i){fu}\s*(?:x|×|by)\s*{fu}",
        fu = float_unit()
    ))
});
static CENTER: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)(?:with\s+)?cent(?:er|re)(?:ed)?(?:\s+(?:at|on))?\s*{COORD}"
    ))
});
static AT: Lazy<Regex> = Lazy::new(|| compile(&format!(r"(?i)\bat\s*{COORD}")));
static ARC: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\barc\b.*?\bradius\s*{fu}.*?\bat\s*{COORD}.*?\bfrom\s*{NUMBER}\s*\bto\s*{NUMBER}",
        fu = float_unit()
    ))
});
static POLYLINE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\bpolyline\b\s*(closed)?\s*points?:\s*"));
static POLYLINE_STOP: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\band\b|\bsave\b"));
static POINT: Lazy<Regex> = Lazy::new(|| compile(COORD));
static ELLIPSE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)\bellipse\b.*?\bcenter\s*{COORD}.*?\brx\s*{fu}.*?\bry\s*{fu}(?:.*?\brot\s*{NUMBER})?",
        fu = float_unit()
    ))
});
static TEXT: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r#"(?i)\btext\s+"([^"]+)"\s*\bat\s*{COORD}(?:.*?\bheight\s*{fu})?"#,
        fu = float_unit()
    ))
});

/// 自由文本解析结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyProgram {
    pub commands: Vec<Command>,
    /// `save as xxx.dxf` 指定的输出文件。
    pub save_path: Option<String>,
}

impl LegacyProgram {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> Option<&'t str> {
    caps.get(index).map(|m| m.as_str())
}

fn exact(raw: &str) -> Result<Decimal, ParseError> {
    Decimal::from_str(raw).map_err(|_| ParseError::CoordinateSyntax {
        token: raw.to_string(),
    })
}

fn point(raw_x: &str, raw_y: &str) -> Result<Coordinate, ParseError> {
    Ok(Coordinate::absolute(exact(raw_x)?, exact(raw_y)?).with_unit(Some(LengthUnit::Millimeter)))
}

fn caps_point(caps: &Captures<'_>, x: usize, y: usize) -> Result<Coordinate, ParseError> {
    match (group(caps, x), group(caps, y)) {
        (Some(raw_x), Some(raw_y)) => point(raw_x, raw_y),
        _ => Err(ParseError::CoordinateSyntax {
            token: caps[0].to_string(),
        }),
    }
}

/// 浮点换算后按规范精度量化为十进制毫米。
fn length(raw: &str, unit: Option<&str>, loc: &str) -> Result<Decimal, ParseError> {
    let value: f64 = raw.parse().map_err(|_| ParseError::CoordinateSyntax {
        token: raw.to_string(),
    })?;
    let millimeters = legacy_to_mm(value, unit)?;
    Decimal::try_from(millimeters).map(quantize).map_err(|_| {
        ParseError::invalid_value(loc, format!("{millimeters} is not representable"), "decimal_parsing")
    })
}

fn circles(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    for caps in CIRCLE.captures_iter(t) {
        let radius = match (group(&caps, 3), group(&caps, 1)) {
            (Some(raw), _) => length(raw, group(&caps, 4), "radius")?,
            (None, Some(raw)) => length(raw, group(&caps, 2), "radius")?,
            (None, None) => continue,
        };
        out.push(Command::Circle(DrawCircle {
            center: caps_point(&caps, 5, 6)?,
            radius: Some(radius),
            radius_unit: Some(LengthUnit::Millimeter),
        }));
    }
    Ok(())
}

fn lines(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    for caps in LINE.captures_iter(t) {
        out.push(Command::Line(DrawLine {
            start: caps_point(&caps, 1, 2)?,
            end: caps_point(&caps, 3, 4)?,
        }));
    }
    Ok(())
}

fn rectangle(chunk: &str) -> Result<Command, ParseError> {
    let mut width = WIDTH
        .captures(chunk)
        .and_then(|caps| group(&caps, 1).map(|raw| length(raw, group(&caps, 2), "width")))
        .transpose()?;
    let mut height = HEIGHT
        .captures(chunk)
        .and_then(|caps| group(&caps, 1).map(|raw| length(raw, group(&caps, 2), "height")))
        .transpose()?;

    if width.is_none() || height.is_none() {
        if let Some(caps) = SHORTHAND.captures(chunk) {
            if width.is_none() {
                width = group(&caps, 1)
                    .map(|raw| length(raw, group(&caps, 2), "width"))
                    .transpose()?;
            }
            if height.is_none() {
                height = group(&caps, 3)
                    .map(|raw| length(raw, group(&caps, 4), "height"))
                    .transpose()?;
            }
        }
    }

    let fallback = Decimal::from(RECT_FALLBACK_MM);
    let mut anchor = Anchor::Corner;
    let mut position = point("0", "0")?;

    if let Some(caps) = CENTER.captures(chunk) {
        anchor = Anchor::Center;
        position = caps_point(&caps, 1, 2)?;
    } else if let Some(caps) = AT.captures(chunk) {
        position = caps_point(&caps, 1, 2)?;
    }

    Ok(Command::Rect(DrawRect {
        anchor,
        position,
        width: Some(width.unwrap_or(fallback)),
        width_unit: Some(LengthUnit::Millimeter),
        height: Some(height.unwrap_or(fallback)),
        height_unit: Some(LengthUnit::Millimeter),
    }))
}

/// 每个 `rectangle` 片段延伸到下一个实体关键字为止。
fn rectangles(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    let boundaries: Vec<_> = RECT_BOUNDARY.find_iter(t).collect();
    for (index, keyword) in boundaries.iter().enumerate() {
        if !keyword.as_str().eq_ignore_ascii_case("rectangle") {
            continue;
        }
        let end = boundaries
            .get(index + 1)
            .map_or(t.len(), |next| next.start());
        out.push(rectangle(&t[keyword.start()..end])?);
    }
    Ok(())
}

fn arcs(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    for caps in ARC.captures_iter(t) {
        let (Some(raw_radius), Some(start), Some(end)) =
            (group(&caps, 1), group(&caps, 5), group(&caps, 6))
        else {
            continue;
        };
        out.push(Command::Arc(DrawArc {
            center: caps_point(&caps, 3, 4)?,
            radius: Some(length(raw_radius, group(&caps, 2), "radius")?),
            radius_unit: Some(LengthUnit::Millimeter),
            start_angle: Some(exact(start)?),
            end_angle: Some(exact(end)?),
        }));
    }
    Ok(())
}

fn polylines(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    for header in POLYLINE.captures_iter(t) {
        let Some(whole) = header.get(0) else {
            continue;
        };
        let rest = &t[whole.end()..];
        let stop = POLYLINE_STOP.find(rest).map_or(rest.len(), |m| m.start());
        let points = POINT
            .captures_iter(&rest[..stop])
            .map(|caps| caps_point(&caps, 1, 2))
            .collect::<Result<Vec<_>, _>>()?;
        if points.is_empty() {
            continue;
        }
        out.push(Command::Polyline(DrawPolyline {
            points,
            closed: header.get(1).is_some(),
        }));
    }
    Ok(())
}

fn ellipses(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    for caps in ELLIPSE.captures_iter(t) {
        let (Some(raw_rx), Some(raw_ry)) = (group(&caps, 3), group(&caps, 5)) else {
            continue;
        };
        let rotation = group(&caps, 7).map(exact).transpose()?;
        out.push(Command::Ellipse(DrawEllipse {
            center: caps_point(&caps, 1, 2)?,
            rx: Some(length(raw_rx, group(&caps, 4), "rx")?),
            rx_unit: Some(LengthUnit::Millimeter),
            ry: Some(length(raw_ry, group(&caps, 6), "ry")?),
            ry_unit: Some(LengthUnit::Millimeter),
            rotation: Some(rotation.unwrap_or(Decimal::ZERO)),
        }));
    }
    Ok(())
}

fn texts(t: &str, out: &mut Vec<Command>) -> Result<(), ParseError> {
    for caps in TEXT.captures_iter(t) {
        let height = match group(&caps, 4) {
            Some(raw) => length(raw, group(&caps, 5), "height")?,
            None => Decimal::from(TEXT_FALLBACK_MM),
        };
        out.push(Command::Text(DrawText {
            text: group(&caps, 1).unwrap_or_default().to_string(),
            position: caps_point(&caps, 2, 3)?,
            height: Some(height),
            height_unit: Some(LengthUnit::Millimeter),
        }));
    }
    Ok(())
}

/// 解析自由文本。未识别任何实体时返回空程序，而不是错误。
pub fn parse_legacy(text: &str) -> Result<LegacyProgram, ParseError> {
    let padded = format!(" {} ", text.trim());
    let t = SEPARATORS.replace_all(&padded, " and ");

    let save_path = SAVE
        .captures(&t)
        .and_then(|caps| group(&caps, 1).map(str::to_string));

    let mut commands = Vec::new();
    circles(&t, &mut commands)?;
    lines(&t, &mut commands)?;
    rectangles(&t, &mut commands)?;
    arcs(&t, &mut commands)?;
    polylines(&t, &mut commands)?;
    ellipses(&t, &mut commands)?;
    texts(&t, &mut commands)?;

    debug!(
        entities = commands.len(),
        save = save_path.as_deref().unwrap_or("-"),
        "自由文本匹配完成"
    );
    Ok(LegacyProgram {
        commands,
        save_path,
    })
}
