use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::command::{Command, CommandList};
use crate::errors::ValidationIssue;

fn nullable_number(description: &str) -> Value {
    json!({
        "anyOf": [{"type": "number"}, {"type": "string"}, {"type": "null"}],
        "description": description,
    })
}

fn nullable_magnitude(description: &str) -> Value {
    json!({
        "anyOf": [{"type": "number", "minimum": 0}, {"type": "string"}, {"type": "null"}],
        "description": description,
    })
}

fn unit_field() -> Value {
    json!({"anyOf": [{"enum": ["mm", "in"]}, {"type": "null"}]})
}

fn coordinate_ref() -> Value {
    json!({"anyOf": [{"$ref": "#/definitions/Coordinate"}, {"type": "null"}]})
}

fn variant(tag: &str, properties: Value) -> Value {
    let mut properties = properties;
    if let Value::Object(map) = &mut properties {
        map.insert("type".to_string(), json!({"const": tag}));
    }
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["type"],
        "properties": properties,
    })
}

/// 命令模型的 JSON Schema，发送给文本生成协作方。
pub fn command_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "CommandList",
        "type": "object",
        "additionalProperties": false,
        "required": ["commands"],
        "properties": {
            "commands": {
                "type": "array",
                "items": {"$ref": "#/definitions/Command"},
            }
        },
        "definitions": {
            "Coordinate": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "x": nullable_number("X component of the coordinate"),
                    "y": nullable_number("Y component of the coordinate"),
                    "system": {"enum": ["absolute", "relative", null], "default": "absolute"},
                    "unit": unit_field(),
                },
            },
            "Command": {
                "oneOf": [
                    {"$ref": "#/definitions/DrawCircle"},
                    {"$ref": "#/definitions/DrawLine"},
                    {"$ref": "#/definitions/DrawRect"},
                    {"$ref": "#/definitions/DrawPolyline"},
                    {"$ref": "#/definitions/DrawArc"},
                    {"$ref": "#/definitions/DrawEllipse"},
                    {"$ref": "#/definitions/DrawText"},
                ]
            },
            "DrawCircle": variant("draw_circle", json!({
                "center": coordinate_ref(),
                "radius": nullable_magnitude("Radius value"),
                "radius_unit": unit_field(),
            })),
            "DrawLine": variant("draw_line", json!({
                "start": coordinate_ref(),
                "end": coordinate_ref(),
            })),
            "DrawRect": variant("draw_rect", json!({
                "anchor": {"enum": ["corner", "center", null], "default": "corner"},
                "position": coordinate_ref(),
                "width": nullable_magnitude("Width value"),
                "width_unit": unit_field(),
                "height": nullable_magnitude("Height value"),
                "height_unit": unit_field(),
            })),
            "DrawPolyline": variant("draw_polyline", json!({
                "points": {"type": "array", "items": {"$ref": "#/definitions/Coordinate"}},
                "closed": {"type": ["boolean", "null"], "default": false},
            })),
            "DrawArc": variant("draw_arc", json!({
                "center": coordinate_ref(),
                "radius": nullable_magnitude("Radius value"),
                "radius_unit": unit_field(),
                "start_angle": nullable_number("Start angle in degrees"),
                "end_angle": nullable_number("End angle in degrees"),
            })),
            "DrawEllipse": variant("draw_ellipse", json!({
                "center": coordinate_ref(),
                "rx": nullable_magnitude("Semi-axis along the rotated X axis"),
                "rx_unit": unit_field(),
                "ry": nullable_magnitude("Semi-axis along the rotated Y axis"),
                "ry_unit": unit_field(),
                "rotation": nullable_number("Rotation in degrees"),
            })),
            "DrawText": variant("draw_text", json!({
                "text": {"type": ["string", "null"]},
                "position": coordinate_ref(),
                "height": nullable_magnitude("Text height"),
                "height_unit": unit_field(),
            })),
        }
    })
}

/// 单条命令的语义问题，`prefix` 为空时 `loc` 只含字段名。
pub fn command_issues(command: &Command, prefix: &str) -> Vec<ValidationIssue> {
    command
        .magnitudes()
        .into_iter()
        .filter_map(|(field, value)| match value {
            Some(value) if value < Decimal::ZERO => Some(ValidationIssue::new(
                if prefix.is_empty() {
                    field.to_string()
                } else {
                    format!("{prefix}.{field}")
                },
                "Input should be greater than or equal to 0",
                "greater_than_equal",
            )),
            _ => None,
        })
        .collect()
}

/// 结构 + 语义校验。失败时返回全部问题。
pub fn validate_payload(payload: &Value) -> Result<Vec<Command>, Vec<ValidationIssue>> {
    let list: CommandList = serde_json::from_value(payload.clone())
        .map_err(|err| vec![ValidationIssue::new("$", err.to_string(), "schema")])?;

    let issues: Vec<ValidationIssue> = list
        .commands
        .iter()
        .enumerate()
        .flat_map(|(index, command)| command_issues(command, &format!("commands.{index}")))
        .collect();

    if issues.is_empty() {
        Ok(list.commands)
    } else {
        Err(issues)
    }
}
