//! ASCII DXF 输出。
//!
//! 仅写入 HEADER（范围与单位）、LAYER 表和 ENTITIES 段；矩形与多段线
//! 都以 LWPOLYLINE 输出。

use std::collections::BTreeSet;
use std::f64::consts::TAU;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use textcad_core::bundle::DrawingBundle;
use textcad_core::geometry::{Arc, Circle, Ellipse, Line, Point, Polyline, Rectangle, TextLabel};
use tracing::{debug, info};

use crate::{GeometrySink, IoError};

/// `$INSUNITS` 中的毫米。
const INSUNITS_MM: i32 = 4;
const BASE_LAYER: &str = "0";

#[derive(Debug, Clone, Copy, Default)]
pub struct DxfSink;

impl DxfSink {
    pub fn new() -> Self {
        Self
    }

    /// 生成完整的 DXF 文本。
    pub fn render(&self, bundle: &DrawingBundle) -> String {
        let mut writer = DxfWriter::default();
        writer.header(bundle);
        writer.layers(bundle);

        writer.begin_section("ENTITIES");
        for line in &bundle.lines {
            writer.line(line);
        }
        for circle in &bundle.circles {
            writer.circle(circle);
        }
        for rect in &bundle.rectangles {
            writer.rectangle(rect);
        }
        for polyline in &bundle.polylines {
            writer.polyline(polyline);
        }
        for arc in &bundle.arcs {
            writer.arc(arc);
        }
        for ellipse in &bundle.ellipses {
            writer.ellipse(ellipse);
        }
        for text in &bundle.texts {
            writer.text(text);
        }
        writer.end_section();
        writer.pair(0, "EOF");
        writer.finish()
    }
}

impl GeometrySink for DxfSink {
    fn write(&self, bundle: &DrawingBundle, path: &Path) -> Result<(), IoError> {
        if path.as_os_str().is_empty() || path.file_name().is_none() {
            return Err(IoError::InvalidDestination(path.to_path_buf()));
        }
        let data = self.render(bundle);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| IoError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, data.as_bytes()).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), entities = bundle.len(), "DXF 已写入");
        Ok(())
    }
}

#[derive(Default)]
struct DxfWriter {
    out: String,
}

impl DxfWriter {
    fn pair(&mut self, code: i32, value: impl std::fmt::Display) {
        // 写入 String 不会失败
        let _ = write!(self.out, "{code}\n{value}\n");
    }

    fn decimal(&mut self, code: i32, value: Decimal) {
        self.pair(code, value.normalize());
    }

    fn point(&mut self, base: i32, point: Point) {
        self.decimal(base, point.x);
        self.decimal(base + 10, point.y);
    }

    fn begin_section(&mut self, name: &str) {
        self.pair(0, "SECTION");
        self.pair(2, name);
    }

    fn end_section(&mut self) {
        self.pair(0, "ENDSEC");
    }

    fn entity(&mut self, kind: &str, layer: &str) {
        self.pair(0, kind);
        self.pair(8, layer);
    }

    fn header(&mut self, bundle: &DrawingBundle) {
        let (min, max) = match bundle.bounds() {
            Some(bounds) => (bounds.min(), bounds.max()),
            None => Default::default(),
        };
        self.begin_section("HEADER");
        self.pair(9, "$ACADVER");
        self.pair(1, "AC1015");
        self.pair(9, "$INSUNITS");
        self.pair(70, INSUNITS_MM);
        self.pair(9, "$EXTMIN");
        self.pair(10, min.x);
        self.pair(20, min.y);
        self.pair(9, "$EXTMAX");
        self.pair(10, max.x);
        self.pair(20, max.y);
        self.end_section();
    }

    fn layers(&mut self, bundle: &DrawingBundle) {
        let mut names: BTreeSet<&str> = bundle.entities().map(|entity| entity.layer()).collect();
        names.insert(BASE_LAYER);
        debug!(layers = names.len(), "生成 LAYER 表");

        self.begin_section("TABLES");
        self.pair(0, "TABLE");
        self.pair(2, "LAYER");
        self.pair(70, names.len());
        for name in names {
            self.pair(0, "LAYER");
            self.pair(2, name);
            self.pair(70, 0);
            self.pair(62, 7);
            self.pair(6, "CONTINUOUS");
        }
        self.pair(0, "ENDTAB");
        self.end_section();
    }

    fn line(&mut self, line: &Line) {
        self.entity("LINE", &line.layer);
        self.point(10, line.start);
        self.point(11, line.end);
    }

    fn circle(&mut self, circle: &Circle) {
        self.entity("CIRCLE", &circle.layer);
        self.point(10, circle.center);
        self.decimal(40, circle.radius);
    }

    fn lwpolyline(&mut self, layer: &str, points: &[Point], closed: bool) {
        self.entity("LWPOLYLINE", layer);
        self.pair(90, points.len());
        self.pair(70, if closed { 1 } else { 0 });
        for point in points {
            self.point(10, *point);
        }
    }

    fn rectangle(&mut self, rect: &Rectangle) {
        self.lwpolyline(&rect.layer, &rect.corners(), true);
    }

    fn polyline(&mut self, polyline: &Polyline) {
        self.lwpolyline(&polyline.layer, &polyline.points, polyline.closed);
    }

    fn arc(&mut self, arc: &Arc) {
        self.entity("ARC", &arc.layer);
        self.point(10, arc.center);
        self.decimal(40, arc.radius);
        self.decimal(50, arc.start_angle);
        self.decimal(51, arc.end_angle);
    }

    /// DXF 椭圆以长轴端点（相对圆心）和短长轴比表示。
    fn ellipse(&mut self, ellipse: &Ellipse) {
        let rx = ellipse.rx.to_f64().unwrap_or_default().abs();
        let ry = ellipse.ry.to_f64().unwrap_or_default().abs();
        let rotation = ellipse.rotation.to_f64().unwrap_or_default().to_radians();
        let (major, minor, angle) = if rx >= ry {
            (rx, ry, rotation)
        } else {
            (ry, rx, rotation + std::f64::consts::FRAC_PI_2)
        };
        let ratio = if major > 0.0 { minor / major } else { 1.0 };

        self.entity("ELLIPSE", &ellipse.layer);
        self.point(10, ellipse.center);
        self.pair(11, major * angle.cos());
        self.pair(21, major * angle.sin());
        self.pair(40, ratio);
        self.pair(41, 0.0);
        self.pair(42, TAU);
    }

    fn text(&mut self, text: &TextLabel) {
        self.entity("TEXT", &text.layer);
        self.point(10, text.position);
        self.decimal(40, text.height);
        self.pair(1, text.text.replace(['\r', '\n'], " "));
    }

    fn finish(self) -> String {
        self.out
    }
}
