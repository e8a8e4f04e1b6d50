pub mod units {
    use std::fmt;
    use std::str::FromStr;

    use rust_decimal::{Decimal, RoundingStrategy};
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    /// 每英寸对应的毫米数，使用精确十进制常量而非浮点近似。
    pub const MM_PER_INCH: Decimal = Decimal::from_parts(254, 0, 0, false, 1);

    /// 规范单位（毫米）保留的小数位数。
    pub const CANONICAL_SCALE: u32 = 6;

    const MILLIMETER_ALIASES: &[&str] = &[
        "mm",
        "millimeter",
        "millimeters",
        "millimetre",
        "millimetres",
    ];
    const INCH_ALIASES: &[&str] = &["in", "inch", "inches", "\""];

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum UnitError {
        #[error("unsupported unit '{0}'")]
        UnsupportedUnit(String),
        #[error("could not parse length expression '{0}'")]
        InvalidLength(String),
        #[error("length {0} is out of range after conversion to millimetres")]
        Overflow(Decimal),
    }

    impl UnitError {
        pub fn code(&self) -> &'static str {
            match self {
                UnitError::UnsupportedUnit(_) => "E400",
                UnitError::InvalidLength(_) => "E401",
                UnitError::Overflow(_) => "E402",
            }
        }
    }

    /// 规范流水线支持的长度单位。毫米为规范单位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum LengthUnit {
        #[default]
        #[serde(rename = "mm")]
        Millimeter,
        #[serde(rename = "in")]
        Inch,
    }

    impl LengthUnit {
        #[inline]
        pub fn symbol(self) -> &'static str {
            match self {
                LengthUnit::Millimeter => "mm",
                LengthUnit::Inch => "in",
            }
        }

        #[inline]
        pub fn aliases(self) -> &'static [&'static str] {
            match self {
                LengthUnit::Millimeter => MILLIMETER_ALIASES,
                LengthUnit::Inch => INCH_ALIASES,
            }
        }

        /// 按别名解析单位（忽略大小写与首尾空白）。
        pub fn from_alias(value: &str) -> Result<Self, UnitError> {
            let normalized = value.trim().to_ascii_lowercase();
            [LengthUnit::Millimeter, LengthUnit::Inch]
                .into_iter()
                .find(|unit| unit.aliases().contains(&normalized.as_str()))
                .ok_or_else(|| UnitError::UnsupportedUnit(value.to_string()))
        }

        /// 空值或空白字符串退化为 `default`。
        pub fn resolve(value: Option<&str>, default: LengthUnit) -> Result<Self, UnitError> {
            match value {
                Some(raw) if !raw.trim().is_empty() => Self::from_alias(raw),
                _ => Ok(default),
            }
        }
    }

    impl FromStr for LengthUnit {
        type Err = UnitError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Self::from_alias(s)
        }
    }

    impl fmt::Display for LengthUnit {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.symbol())
        }
    }

    /// 返回所有可识别的单位别名（已排序）。
    pub fn available_units() -> Vec<&'static str> {
        let mut all: Vec<&'static str> = MILLIMETER_ALIASES
            .iter()
            .chain(INCH_ALIASES.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all
    }

    /// 以四舍五入（远离零）量化到规范精度。
    #[inline]
    pub fn quantize(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(CANONICAL_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }

    /// 转换到毫米。毫米输入保持原值不变；超出十进制范围时返回 `Overflow`。
    pub fn to_canonical(value: Decimal, unit: LengthUnit) -> Result<Decimal, UnitError> {
        match unit {
            LengthUnit::Millimeter => Ok(value),
            LengthUnit::Inch => value
                .checked_mul(MM_PER_INCH)
                .map(quantize)
                .ok_or(UnitError::Overflow(value)),
        }
    }

    /// 从毫米转换回指定单位。
    pub fn from_canonical(value: Decimal, unit: LengthUnit) -> Decimal {
        match unit {
            LengthUnit::Millimeter => value,
            LengthUnit::Inch => quantize(value / MM_PER_INCH),
        }
    }

    pub fn convert(value: Decimal, from: LengthUnit, to: LengthUnit) -> Result<Decimal, UnitError> {
        if from == to {
            return Ok(value);
        }
        Ok(from_canonical(to_canonical(value, from)?, to))
    }

    /// 解析 `"12.5in"`、`"40"` 之类的长度表达式，返回毫米值。
    /// 无单位后缀时使用 `default_unit`。
    pub fn parse_length(text: &str, default_unit: LengthUnit) -> Result<Decimal, UnitError> {
        let trimmed = text.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
            .unwrap_or(trimmed.len());
        let (number, suffix) = trimmed.split_at(split);
        let magnitude =
            Decimal::from_str(number).map_err(|_| UnitError::InvalidLength(text.to_string()))?;
        let unit = LengthUnit::resolve(Some(suffix), default_unit)?;
        to_canonical(magnitude, unit)
    }

    /// 旧版自由文本匹配器使用的单位比例（浮点路径，额外支持 cm / m）。
    pub fn legacy_scale(word: &str) -> Option<f64> {
        match word.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Some(1.0),
            "in" | "inch" | "inches" | "\"" => Some(25.4),
            "cm" | "centimeter" | "centimeters" => Some(10.0),
            "m" | "meter" | "meters" => Some(1000.0),
            _ => None,
        }
    }

    pub fn legacy_to_mm(value: f64, word: Option<&str>) -> Result<f64, UnitError> {
        match word {
            None => Ok(value),
            Some(word) => legacy_scale(word)
                .map(|scale| value * scale)
                .ok_or_else(|| UnitError::UnsupportedUnit(word.to_string())),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn dec(value: &str) -> Decimal {
            Decimal::from_str(value).expect("valid decimal literal")
        }

        #[test]
        fn millimeters_are_identity() {
            for raw in ["0", "1", "12.345678", "0.0000001", "987654.321"] {
                let value = dec(raw);
                assert_eq!(to_canonical(value, LengthUnit::Millimeter), Ok(value));
                assert_eq!(from_canonical(value, LengthUnit::Millimeter), value);
            }
        }

        #[test]
        fn inch_uses_exact_factor() {
            assert_eq!(to_canonical(dec("1"), LengthUnit::Inch), Ok(dec("25.4")));
            assert_eq!(to_canonical(dec("2.5"), LengthUnit::Inch), Ok(dec("63.5")));
            assert_eq!(from_canonical(dec("25.4"), LengthUnit::Inch), dec("1"));
        }

        #[test]
        fn inch_round_trip_stays_within_one_step() {
            let step = Decimal::new(1, CANONICAL_SCALE);
            for raw in ["0.1", "1.234567", "3.333333", "42", "0.000001", "1000.999999"] {
                let value = dec(raw);
                let mm = to_canonical(value, LengthUnit::Inch).unwrap();
                let back = from_canonical(mm, LengthUnit::Inch);
                assert!((back - value).abs() <= step, "{raw} came back as {back}");
            }
        }

        #[test]
        fn quantize_rounds_half_up() {
            assert_eq!(quantize(dec("0.0000005")), dec("0.000001"));
            assert_eq!(quantize(dec("-0.0000005")), dec("-0.000001"));
            assert_eq!(quantize(dec("1.0000004")), dec("1"));
        }

        #[test]
        fn convert_between_units() {
            assert_eq!(
                convert(dec("50.8"), LengthUnit::Millimeter, LengthUnit::Inch),
                Ok(dec("2"))
            );
            assert_eq!(
                convert(dec("3"), LengthUnit::Inch, LengthUnit::Millimeter),
                Ok(dec("76.2"))
            );
            assert_eq!(convert(dec("7"), LengthUnit::Inch, LengthUnit::Inch), Ok(dec("7")));
        }

        #[test]
        fn inch_beyond_decimal_range_is_rejected() {
            let err = to_canonical(Decimal::MAX, LengthUnit::Inch).unwrap_err();
            assert_eq!(err, UnitError::Overflow(Decimal::MAX));
            assert_eq!(err.code(), "E402");
            assert_eq!(
                to_canonical(Decimal::MAX, LengthUnit::Millimeter),
                Ok(Decimal::MAX)
            );
            assert!(matches!(
                parse_length("79228162514264337593543950335in", LengthUnit::Millimeter),
                Err(UnitError::Overflow(_))
            ));
        }

        #[test]
        fn aliases_resolve_case_insensitively() {
            assert_eq!(LengthUnit::from_alias("MM").unwrap(), LengthUnit::Millimeter);
            assert_eq!(LengthUnit::from_alias(" Inches ").unwrap(), LengthUnit::Inch);
            assert_eq!(LengthUnit::from_alias("\"").unwrap(), LengthUnit::Inch);
            let err = LengthUnit::from_alias("furlong").unwrap_err();
            assert!(matches!(err, UnitError::UnsupportedUnit(ref unit) if unit == "furlong"));
            assert_eq!(err.code(), "E400");
        }

        #[test]
        fn parse_length_uses_default_for_bare_numbers() {
            assert_eq!(
                parse_length("40", LengthUnit::Millimeter).unwrap(),
                dec("40")
            );
            assert_eq!(parse_length("2", LengthUnit::Inch).unwrap(), dec("50.8"));
            assert_eq!(
                parse_length("1.5 in", LengthUnit::Millimeter).unwrap(),
                dec("38.1")
            );
            assert!(matches!(
                parse_length("3 cubits", LengthUnit::Millimeter),
                Err(UnitError::UnsupportedUnit(_))
            ));
            assert!(matches!(
                parse_length("abc", LengthUnit::Millimeter),
                Err(UnitError::InvalidLength(_))
            ));
        }

        #[test]
        fn legacy_units_include_metric_words() {
            assert!((legacy_to_mm(2.0, Some("cm")).unwrap() - 20.0).abs() < 1e-9);
            assert!((legacy_to_mm(1.5, Some("meters")).unwrap() - 1500.0).abs() < 1e-9);
            assert!((legacy_to_mm(4.0, None).unwrap() - 4.0).abs() < 1e-9);
            assert!(legacy_to_mm(1.0, Some("yard")).is_err());
        }

        #[test]
        fn available_units_are_sorted() {
            let units = available_units();
            let mut sorted = units.clone();
            sorted.sort_unstable();
            assert_eq!(units, sorted);
            assert!(units.contains(&"mm"));
            assert!(units.contains(&"inch"));
        }
    }
}

pub mod geometry {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use glam::DVec2;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::ToPrimitive;
    use serde::{Deserialize, Serialize};

    /// 未指定图层时使用的默认图层名。
    pub const DEFAULT_LAYER: &str = "A-GEOM";

    /// 二维点，坐标均为毫米精确十进制。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Point {
        pub x: Decimal,
        pub y: Decimal,
    }

    impl Point {
        pub const ORIGIN: Point = Point {
            x: Decimal::ZERO,
            y: Decimal::ZERO,
        };

        #[inline]
        pub fn new(x: Decimal, y: Decimal) -> Self {
            Self { x, y }
        }

        /// 平移后的点；任一分量超出十进制范围时返回 `None`。
        #[inline]
        pub fn offset(self, dx: Decimal, dy: Decimal) -> Option<Self> {
            Some(Self {
                x: self.x.checked_add(dx)?,
                y: self.y.checked_add(dy)?,
            })
        }

        /// 转为双精度向量，仅用于包围盒与文件输出。
        #[inline]
        pub fn to_dvec2(self) -> DVec2 {
            DVec2::new(
                self.x.to_f64().unwrap_or_default(),
                self.y.to_f64().unwrap_or_default(),
            )
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point,
        pub end: Point,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point,
        pub radius: Decimal,
        pub layer: String,
    }

    /// 轴对齐矩形，`origin` 为左下角。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Rectangle {
        pub origin: Point,
        pub width: Decimal,
        pub height: Decimal,
        pub layer: String,
    }

    impl Rectangle {
        /// 右上角；超出十进制范围时返回 `None`。
        #[inline]
        pub fn far_corner(&self) -> Option<Point> {
            self.origin.offset(self.width, self.height)
        }

        /// 逆时针返回四个角点，从左下角开始。超出范围的分量按饱和值处理。
        pub fn corners(&self) -> [Point; 4] {
            let o = self.origin;
            let right = o.x.saturating_add(self.width);
            let top = o.y.saturating_add(self.height);
            [
                o,
                Point::new(right, o.y),
                Point::new(right, top),
                Point::new(o.x, top),
            ]
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub points: Vec<Point>,
        pub closed: bool,
        pub layer: String,
    }

    /// 圆弧，角度单位为度，逆时针从 `start_angle` 到 `end_angle`。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point,
        pub radius: Decimal,
        pub start_angle: Decimal,
        pub end_angle: Decimal,
        pub layer: String,
    }

    /// 椭圆，`rx` 沿旋转后的 X 轴，`rotation` 单位为度。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point,
        pub rx: Decimal,
        pub ry: Decimal,
        pub rotation: Decimal,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TextLabel {
        pub text: String,
        pub position: Point,
        pub height: Decimal,
        pub layer: String,
    }

    /// 轴对齐边界框，用于估算图纸范围。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Bounds2D {
        min: DVec2,
        max: DVec2,
    }

    impl Bounds2D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: DVec2::splat(f64::INFINITY),
                max: DVec2::splat(f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x > self.max.x || self.min.y > self.max.y
        }

        #[inline]
        pub fn min(&self) -> DVec2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> DVec2 {
            self.max
        }

        pub fn include(&mut self, point: DVec2) {
            self.min = self.min.min(point);
            self.max = self.max.max(point);
        }

        #[inline]
        pub fn include_point(&mut self, point: Point) {
            self.include(point.to_dvec2());
        }
    }

    fn to_f64(value: Decimal) -> f64 {
        value.to_f64().unwrap_or_default()
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = start.rem_euclid(TAU);
        let mut end = end.rem_euclid(TAU);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    pub(crate) fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let center = arc.center.to_dvec2();
        let radius = to_f64(arc.radius).abs();
        if radius <= f64::EPSILON {
            bounds.include(center);
            return;
        }

        let point_at = |angle: f64| center + DVec2::from_angle(angle) * radius;
        let (start, end) = canonical_interval(
            to_f64(arc.start_angle).to_radians(),
            to_f64(arc.end_angle).to_radians(),
        );
        bounds.include(point_at(start));
        bounds.include(point_at(end));

        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include(point_at(candidate));
            }
        }
    }

    pub(crate) fn ellipse_bounds(ellipse: &Ellipse, bounds: &mut Bounds2D) {
        let center = ellipse.center.to_dvec2();
        let rotation = DVec2::from_angle(to_f64(ellipse.rotation).to_radians());
        let major = rotation * to_f64(ellipse.rx);
        let minor = rotation.perp() * to_f64(ellipse.ry);
        // 闭合椭圆的轴对齐半宽/半高
        let half = DVec2::new(major.x.hypot(minor.x), major.y.hypot(minor.y));
        bounds.include(center - half);
        bounds.include(center + half);
    }

}

pub mod bundle {
    use glam::DVec2;
    use rust_decimal::prelude::ToPrimitive;
    use serde::{Deserialize, Serialize};

    use crate::geometry::{
        Arc, Bounds2D, Circle, Ellipse, Line, Polyline, Rectangle, TextLabel, arc_bounds,
        ellipse_bounds,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum EntityKind {
        Line,
        Circle,
        Rectangle,
        Polyline,
        Arc,
        Ellipse,
        Text,
    }

    /// 对图纸包中单个实体的借用视图。
    #[derive(Debug, Clone, Copy)]
    pub enum EntityRef<'a> {
        Line(&'a Line),
        Circle(&'a Circle),
        Rectangle(&'a Rectangle),
        Polyline(&'a Polyline),
        Arc(&'a Arc),
        Ellipse(&'a Ellipse),
        Text(&'a TextLabel),
    }

    impl<'a> EntityRef<'a> {
        pub fn kind(&self) -> EntityKind {
            match self {
                EntityRef::Line(_) => EntityKind::Line,
                EntityRef::Circle(_) => EntityKind::Circle,
                EntityRef::Rectangle(_) => EntityKind::Rectangle,
                EntityRef::Polyline(_) => EntityKind::Polyline,
                EntityRef::Arc(_) => EntityKind::Arc,
                EntityRef::Ellipse(_) => EntityKind::Ellipse,
                EntityRef::Text(_) => EntityKind::Text,
            }
        }

        pub fn layer(&self) -> &'a str {
            match self {
                EntityRef::Line(line) => &line.layer,
                EntityRef::Circle(circle) => &circle.layer,
                EntityRef::Rectangle(rect) => &rect.layer,
                EntityRef::Polyline(polyline) => &polyline.layer,
                EntityRef::Arc(arc) => &arc.layer,
                EntityRef::Ellipse(ellipse) => &ellipse.layer,
                EntityRef::Text(text) => &text.layer,
            }
        }

        /// 将实体范围并入 `bounds`；文字退化为插入点。
        pub fn include_in(&self, bounds: &mut Bounds2D) {
            match self {
                EntityRef::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                EntityRef::Circle(circle) => {
                    let center = circle.center.to_dvec2();
                    let radius = DVec2::splat(circle.radius.abs().to_f64().unwrap_or_default());
                    bounds.include(center - radius);
                    bounds.include(center + radius);
                }
                EntityRef::Rectangle(rect) => {
                    for corner in rect.corners() {
                        bounds.include_point(corner);
                    }
                }
                EntityRef::Polyline(polyline) => {
                    for point in &polyline.points {
                        bounds.include_point(*point);
                    }
                }
                EntityRef::Arc(arc) => arc_bounds(arc, bounds),
                EntityRef::Ellipse(ellipse) => ellipse_bounds(ellipse, bounds),
                EntityRef::Text(text) => bounds.include_point(text.position),
            }
        }
    }

    /// 已完全解析、单位归一化的实体集合，按种类分组。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct DrawingBundle {
        pub lines: Vec<Line>,
        pub circles: Vec<Circle>,
        pub rectangles: Vec<Rectangle>,
        pub polylines: Vec<Polyline>,
        pub arcs: Vec<Arc>,
        pub ellipses: Vec<Ellipse>,
        pub texts: Vec<TextLabel>,
    }

    impl DrawingBundle {
        pub fn new() -> Self {
            Self::default()
        }

        /// 按种类逐一拼接另一个图纸包。
        pub fn extend(&mut self, other: DrawingBundle) {
            self.lines.extend(other.lines);
            self.circles.extend(other.circles);
            self.rectangles.extend(other.rectangles);
            self.polylines.extend(other.polylines);
            self.arcs.extend(other.arcs);
            self.ellipses.extend(other.ellipses);
            self.texts.extend(other.texts);
        }

        pub fn len(&self) -> usize {
            self.lines.len()
                + self.circles.len()
                + self.rectangles.len()
                + self.polylines.len()
                + self.arcs.len()
                + self.ellipses.len()
                + self.texts.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn count(&self, kind: EntityKind) -> usize {
            match kind {
                EntityKind::Line => self.lines.len(),
                EntityKind::Circle => self.circles.len(),
                EntityKind::Rectangle => self.rectangles.len(),
                EntityKind::Polyline => self.polylines.len(),
                EntityKind::Arc => self.arcs.len(),
                EntityKind::Ellipse => self.ellipses.len(),
                EntityKind::Text => self.texts.len(),
            }
        }

        pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> + '_ {
            self.lines
                .iter()
                .map(EntityRef::Line)
                .chain(self.circles.iter().map(EntityRef::Circle))
                .chain(self.rectangles.iter().map(EntityRef::Rectangle))
                .chain(self.polylines.iter().map(EntityRef::Polyline))
                .chain(self.arcs.iter().map(EntityRef::Arc))
                .chain(self.ellipses.iter().map(EntityRef::Ellipse))
                .chain(self.texts.iter().map(EntityRef::Text))
        }

        /// 所有实体的联合包围盒；空图纸包返回 `None`。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for entity in self.entities() {
                entity.include_in(&mut bounds);
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    #[cfg(test)]
    mod tests {
        use rust_decimal::Decimal;

        use super::*;
        use crate::geometry::{DEFAULT_LAYER, Point};

        fn d(value: i64) -> Decimal {
            Decimal::from(value)
        }

        fn sample() -> DrawingBundle {
            let mut bundle = DrawingBundle::new();
            bundle.lines.push(Line {
                start: Point::new(d(0), d(0)),
                end: Point::new(d(100), d(0)),
                layer: DEFAULT_LAYER.to_string(),
            });
            bundle.circles.push(Circle {
                center: Point::new(d(50), d(25)),
                radius: d(12),
                layer: DEFAULT_LAYER.to_string(),
            });
            bundle
        }

        #[test]
        fn bundles_concatenate_per_kind() {
            let mut bundle = sample();
            bundle.extend(sample());
            assert_eq!(bundle.len(), 4);
            assert_eq!(bundle.count(EntityKind::Line), 2);
            assert_eq!(bundle.count(EntityKind::Circle), 2);
            assert_eq!(bundle.count(EntityKind::Text), 0);
            let kinds: Vec<_> = bundle.entities().map(|entity| entity.kind()).collect();
            assert_eq!(
                kinds,
                vec![
                    EntityKind::Line,
                    EntityKind::Line,
                    EntityKind::Circle,
                    EntityKind::Circle
                ]
            );
        }

        #[test]
        fn bounds_cover_all_entities() {
            let bundle = sample();
            let bounds = bundle.bounds().expect("bundle has entities");
            assert!((bounds.min().x - 0.0).abs() < 1e-9);
            assert!((bounds.min().y - 0.0).abs() < 1e-9);
            assert!((bounds.max().x - 100.0).abs() < 1e-9);
            assert!((bounds.max().y - 37.0).abs() < 1e-9);
            assert!(DrawingBundle::new().bounds().is_none());
            assert!(DrawingBundle::new().is_empty());
        }
    }
}

pub mod store {
    use std::collections::HashMap;
    use std::fmt;
    use std::path::PathBuf;
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    /// 会话/项目记忆中保存的值：数字或原始文本回答。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum MemoryValue {
        Number(Decimal),
        Text(String),
    }

    impl MemoryValue {
        /// 数值或可解析为数值的文本返回 `Some`。
        pub fn as_decimal(&self) -> Option<Decimal> {
            match self {
                MemoryValue::Number(value) => Some(*value),
                MemoryValue::Text(text) => Decimal::from_str(text.trim()).ok(),
            }
        }
    }

    impl From<Decimal> for MemoryValue {
        fn from(value: Decimal) -> Self {
            MemoryValue::Number(value)
        }
    }

    impl From<i64> for MemoryValue {
        fn from(value: i64) -> Self {
            MemoryValue::Number(Decimal::from(value))
        }
    }

    impl From<&str> for MemoryValue {
        fn from(value: &str) -> Self {
            MemoryValue::Text(value.to_string())
        }
    }

    impl From<String> for MemoryValue {
        fn from(value: String) -> Self {
            MemoryValue::Text(value)
        }
    }

    impl fmt::Display for MemoryValue {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                MemoryValue::Number(value) => write!(f, "{}", value.normalize()),
                MemoryValue::Text(text) => f.write_str(text),
            }
        }
    }

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("project store I/O failed for {path:?}: {source}")]
        Io {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("project store {path:?} is corrupt: {source}")]
        Corrupt {
            path: PathBuf,
            #[source]
            source: Box<dyn std::error::Error + Send + Sync>,
        },
    }

    /// 项目级持久键值存储。
    ///
    /// 同一 `project_id` 的读-改-写不是原子的：调用方需保证同一时刻
    /// 每个项目最多只有一个写入者（例如按项目加锁）。
    pub trait ProjectStore {
        fn load(&self, project_id: &str) -> Result<HashMap<String, MemoryValue>, StoreError>;
        fn set(&mut self, project_id: &str, key: &str, value: &MemoryValue)
        -> Result<(), StoreError>;
        fn delete(&mut self, project_id: &str, key: &str) -> Result<(), StoreError>;
    }

    /// 进程内存储，测试和无持久化场景使用。
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryProjectStore {
        projects: HashMap<String, HashMap<String, MemoryValue>>,
    }

    impl InMemoryProjectStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl ProjectStore for InMemoryProjectStore {
        fn load(&self, project_id: &str) -> Result<HashMap<String, MemoryValue>, StoreError> {
            Ok(self.projects.get(project_id).cloned().unwrap_or_default())
        }

        fn set(
            &mut self,
            project_id: &str,
            key: &str,
            value: &MemoryValue,
        ) -> Result<(), StoreError> {
            self.projects
                .entry(project_id.to_string())
                .or_default()
                .insert(key.to_string(), value.clone());
            Ok(())
        }

        fn delete(&mut self, project_id: &str, key: &str) -> Result<(), StoreError> {
            if let Some(project) = self.projects.get_mut(project_id) {
                project.remove(key);
            }
            Ok(())
        }
    }

}
