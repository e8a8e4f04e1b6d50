pub mod command;
pub mod errors;
pub mod fallback;
pub mod legacy;
pub mod provider;
pub mod rule_parser;
pub mod rules;
pub mod schema;

pub use command::{
    Anchor, Command, CommandKind, CommandList, Coordinate, CoordinateSystem, DrawArc, DrawCircle,
    DrawEllipse, DrawLine, DrawPolyline, DrawRect, DrawText,
};
pub use errors::{ParseError, ValidationIssue};
pub use fallback::GenerativeParser;
pub use legacy::{LegacyProgram, parse_legacy};
pub use provider::{
    Generated, GenerationContext, MockGenerator, ProviderRegistry, ProviderSettings, TextGenerator,
};
pub use rule_parser::parse_rule;
