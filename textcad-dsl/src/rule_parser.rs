use std::str::FromStr;

use regex::Captures;
use rust_decimal::Decimal;
use textcad_core::units::LengthUnit;
use tracing::debug;

use crate::command::{Command, Coordinate, CoordinateSystem, DrawCircle, DrawLine, DrawRect};
use crate::errors::ParseError;
use crate::rules::{COORDINATE_TOKEN, CONNECTOR, PAREN_TOKEN, Rule, RuleKind, rules};
use crate::schema::command_issues;

fn clauses(text: &str) -> Vec<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    CONNECTOR
        .split(trimmed)
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect()
}

fn coordinate(caps: &Captures<'_>, prefix: &str) -> Result<Coordinate, ParseError> {
    let component = |axis: &str| -> Result<Decimal, ParseError> {
        let raw = caps
            .name(&format!("{prefix}{axis}"))
            .map(|m| m.as_str())
            .ok_or_else(|| ParseError::CoordinateSyntax {
                token: caps[0].to_string(),
            })?;
        Decimal::from_str(raw).map_err(|_| ParseError::CoordinateSyntax {
            token: raw.to_string(),
        })
    };

    let system = if caps.name(&format!("{prefix}rel")).is_some() {
        CoordinateSystem::Relative
    } else {
        CoordinateSystem::Absolute
    };

    Ok(Coordinate {
        x: Some(component("x")?),
        y: Some(component("y")?),
        system,
        unit: None,
    })
}

/// 读取量值与可选单位；量值缺失时返回 `None`。
fn magnitude(
    caps: &Captures<'_>,
    name: &str,
) -> Result<Option<(Decimal, Option<LengthUnit>)>, ParseError> {
    let Some(raw) = caps.name(name) else {
        return Ok(None);
    };
    let value = Decimal::from_str(raw.as_str()).map_err(|err| {
        ParseError::invalid_value(name, format!("invalid number: {err}"), "decimal_parsing")
    })?;
    let unit = caps
        .name(&format!("{name}_unit"))
        .map(|m| LengthUnit::from_alias(m.as_str()))
        .transpose()?;
    Ok(Some((value, unit)))
}

fn build(rule: &Rule, caps: &Captures<'_>, clause: &str) -> Result<Command, ParseError> {
    let command = match rule.kind {
        RuleKind::Circle => {
            let (radius, radius_unit) =
                magnitude(caps, "radius")?.ok_or_else(|| ParseError::RadiusRequired {
                    clause: clause.to_string(),
                })?;
            Command::Circle(DrawCircle {
                center: coordinate(caps, "center_")?,
                radius: Some(radius),
                radius_unit,
            })
        }
        RuleKind::Line => Command::Line(DrawLine {
            start: coordinate(caps, "start_")?,
            end: coordinate(caps, "end_")?,
        }),
        RuleKind::Rect(anchor) => {
            let width = magnitude(caps, "width")?;
            let height = magnitude(caps, "height")?;
            let (Some((width, width_unit)), Some((height, height_unit))) = (width, height) else {
                return Err(ParseError::DimensionRequired {
                    clause: clause.to_string(),
                });
            };
            Command::Rect(DrawRect {
                anchor,
                position: coordinate(caps, "position_")?,
                width: Some(width),
                width_unit,
                height: Some(height),
                height_unit,
            })
        }
    };

    let issues = command_issues(&command, "");
    if !issues.is_empty() {
        return Err(ParseError::SchemaValidationFailed { issues });
    }
    Ok(command)
}

fn check_coordinate_tokens(text: &str) -> Result<(), ParseError> {
    for token in PAREN_TOKEN.find_iter(text) {
        if !COORDINATE_TOKEN.is_match(token.as_str()) {
            return Err(ParseError::CoordinateSyntax {
                token: token.as_str().to_string(),
            });
        }
    }
    Ok(())
}

/// 按规范句式目录解析一句或多句（以 `;` / `and` 连接）指令。
///
/// 任一子句未匹配时整体失败；若未匹配文本中含有格式错误的坐标，
/// 优先报告 [`ParseError::CoordinateSyntax`]。
pub fn parse_rule(text: &str) -> Result<Vec<Command>, ParseError> {
    let mut commands = Vec::new();
    let mut unmatched = Vec::new();

    for clause in clauses(text) {
        match rules().iter().find_map(|rule| {
            rule.pattern.captures(clause).map(|caps| (rule, caps))
        }) {
            Some((rule, caps)) => {
                let command = build(rule, &caps, clause)?;
                debug!(rule = rule.name, clause, "规则匹配成功");
                commands.push(command);
            }
            None => unmatched.push(clause),
        }
    }

    if !unmatched.is_empty() {
        let candidate = unmatched.join(" and ");
        check_coordinate_tokens(&candidate)?;
        return Err(ParseError::UnrecognizedUtterance { input: candidate });
    }
    Ok(commands)
}
