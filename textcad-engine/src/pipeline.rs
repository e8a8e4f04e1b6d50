//! 流水线驱动：规则解析 → 自由文本匹配 → 生成式兜底 → 澄清循环 → 编译。

use std::collections::HashMap;

use serde_json::Value;
use textcad_core::bundle::DrawingBundle;
use textcad_core::geometry::DEFAULT_LAYER;
use textcad_core::store::MemoryValue;
use textcad_core::units::LengthUnit;
use textcad_dsl::{
    Command, GenerationContext, GenerativeParser, ParseError, parse_legacy, parse_rule,
};
use tracing::{debug, info, warn};

use crate::clarify::{FollowUpQuestion, Resolution, clarify};
use crate::compiler::CommandCompiler;
use crate::errors::PipelineError;
use crate::memory::SessionMemory;

pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// 追问的回答来源（交互输入、固定默认值等）。
pub trait AnswerSource {
    /// 返回 `None` 表示无法再提供回答。
    fn answer(&mut self, question: &FollowUpQuestion) -> Option<MemoryValue>;
}

/// 非交互模式下按字段键提供固定回答；坐标分量缺省为 0。
#[derive(Debug, Clone)]
pub struct DefaultAnswers {
    values: HashMap<String, MemoryValue>,
}

impl DefaultAnswers {
    pub fn new() -> Self {
        let values = [
            ("circle.radius", 10_i64),
            ("rect.width", 100),
            ("rect.height", 100),
            ("arc.radius", 10),
            ("ellipse.rx", 25),
            ("ellipse.ry", 15),
        ]
        .into_iter()
        .map(|(field, value)| (field.to_string(), MemoryValue::from(value)))
        .collect();
        Self { values }
    }

    pub fn with(mut self, field: &str, value: impl Into<MemoryValue>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }
}

impl Default for DefaultAnswers {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerSource for DefaultAnswers {
    fn answer(&mut self, question: &FollowUpQuestion) -> Option<MemoryValue> {
        if let Some(value) = self.values.get(&question.field) {
            return Some(value.clone());
        }
        if question.field.ends_with(".x") || question.field.ends_with(".y") {
            return Some(MemoryValue::from(0_i64));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub use_rules: bool,
    pub legacy_matcher: bool,
    pub max_rounds: usize,
    pub default_unit: LengthUnit,
    pub layer: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            use_rules: true,
            legacy_matcher: true,
            max_rounds: DEFAULT_MAX_ROUNDS,
            default_unit: LengthUnit::Millimeter,
            layer: DEFAULT_LAYER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Rules,
    Legacy,
    Generative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUtterance {
    pub source: CommandSource,
    pub commands: Vec<Command>,
    pub save_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceFailure {
    pub utterance: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 至少产出一个实体。
    Completed,
    /// 没有实体，也没有失败。
    Empty,
    /// 没有实体，且存在失败的语句。
    Failed,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub bundle: DrawingBundle,
    pub processed: usize,
    pub failures: Vec<UtteranceFailure>,
    /// 自由文本中 `save as` 指定的最后一个输出路径。
    pub save_path: Option<String>,
}

impl BatchReport {
    pub fn status(&self) -> RunStatus {
        if !self.bundle.is_empty() {
            RunStatus::Completed
        } else if self.failures.is_empty() {
            RunStatus::Empty
        } else {
            RunStatus::Failed
        }
    }
}

pub struct Pipeline {
    options: PipelineOptions,
    memory: SessionMemory,
    generator: Option<GenerativeParser>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, memory: SessionMemory) -> Self {
        Self {
            options,
            memory,
            generator: None,
        }
    }

    pub fn with_generator(mut self, parser: GenerativeParser) -> Self {
        self.generator = Some(parser);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut SessionMemory {
        &mut self.memory
    }

    pub fn compiler(&self) -> CommandCompiler {
        CommandCompiler::new(self.options.default_unit).with_layer(self.options.layer.clone())
    }

    /// 依次尝试规则解析、自由文本匹配与生成式兜底。
    ///
    /// 没有配置生成式解析器时，规则解析的 `UnrecognizedUtterance`
    /// 原样返回；规则被关闭且无生成器时返回 `ProviderUnavailable`。
    pub fn parse(&mut self, utterance: &str) -> Result<ParsedUtterance, PipelineError> {
        let mut rule_error = None;
        if self.options.use_rules {
            match parse_rule(utterance) {
                Ok(commands) => {
                    return Ok(ParsedUtterance {
                        source: CommandSource::Rules,
                        commands,
                        save_path: None,
                    });
                }
                Err(err @ ParseError::UnrecognizedUtterance { .. }) => rule_error = Some(err),
                Err(err) => return Err(err.into()),
            }
        }

        if self.options.legacy_matcher {
            let program = parse_legacy(utterance)?;
            if !program.is_empty() {
                debug!(commands = program.commands.len(), "使用自由文本匹配结果");
                return Ok(ParsedUtterance {
                    source: CommandSource::Legacy,
                    commands: program.commands,
                    save_path: program.save_path,
                });
            }
        }

        let Some(parser) = self.generator.as_mut() else {
            let err = rule_error.unwrap_or_else(|| ParseError::ProviderUnavailable {
                reason: "no text generation provider configured".to_string(),
            });
            return Err(err.into());
        };

        let mut context = GenerationContext::new();
        context.insert(
            "project_id".to_string(),
            Value::from(self.memory.project_id()),
        );
        let commands = parser.parse(utterance, &context)?;
        Ok(ParsedUtterance {
            source: CommandSource::Generative,
            commands,
            save_path: None,
        })
    }

    /// 澄清循环：每轮把全部追问交给回答来源，直到命令就绪。
    pub fn resolve(
        &mut self,
        commands: &[Command],
        answers: &mut dyn AnswerSource,
    ) -> Result<Vec<Command>, PipelineError> {
        let rounds = self.options.max_rounds.max(1);
        let mut outstanding = Vec::new();

        for round in 0..rounds {
            match clarify(commands, &mut self.memory)? {
                Resolution::Ready(ready) => {
                    debug!(round, commands = ready.len(), "命令已就绪");
                    return Ok(ready);
                }
                Resolution::FollowUps(questions) => {
                    info!(round, questions = questions.len(), "需要补充信息");
                    if round + 1 < rounds {
                        for question in &questions {
                            let answer = answers.answer(question).ok_or_else(|| {
                                PipelineError::AnswersExhausted {
                                    question: question.id.clone(),
                                }
                            })?;
                            self.memory.set(&question.id, answer);
                        }
                    }
                    outstanding = questions;
                }
            }
        }

        Err(PipelineError::Unresolved {
            questions: outstanding,
        })
    }

    /// 处理一句指令并用给定编译器（共享光标）编译。
    pub fn process(
        &mut self,
        utterance: &str,
        compiler: &mut CommandCompiler,
        answers: &mut dyn AnswerSource,
    ) -> Result<(DrawingBundle, Option<String>), PipelineError> {
        let parsed = self.parse(utterance)?;
        let commands = match parsed.source {
            CommandSource::Legacy => parsed.commands,
            CommandSource::Rules | CommandSource::Generative => {
                self.resolve(&parsed.commands, answers)?
            }
        };
        let bundle = compiler.compile(&commands)?;
        Ok((bundle, parsed.save_path))
    }

    /// 逐句处理，单句失败只记录并继续；整批共享一个编译器。
    pub fn process_batch<I, S>(&mut self, utterances: I, answers: &mut dyn AnswerSource) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiler = self.compiler();
        let mut report = BatchReport::default();

        for utterance in utterances {
            let utterance = utterance.as_ref().trim();
            if utterance.is_empty() {
                continue;
            }
            report.processed += 1;
            match self.process(utterance, &mut compiler, answers) {
                Ok((bundle, save_path)) => {
                    report.bundle.extend(bundle);
                    if save_path.is_some() {
                        report.save_path = save_path;
                    }
                }
                Err(err) => {
                    warn!(utterance, code = err.code(), error = %err, "语句处理失败");
                    report.failures.push(UtteranceFailure {
                        utterance: utterance.to_string(),
                        code: err.code(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.processed,
            entities = report.bundle.len(),
            failures = report.failures.len(),
            "批处理完成"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textcad_dsl::MockGenerator;

    fn pipeline(options: PipelineOptions) -> Pipeline {
        Pipeline::new(options, SessionMemory::new(None))
    }

    #[test]
    fn unrecognized_without_generator_is_reported() {
        let mut pipeline = pipeline(PipelineOptions {
            legacy_matcher: false,
            ..PipelineOptions::default()
        });
        let err = pipeline.parse("sing a song").unwrap_err();
        assert_eq!(err.code(), "E100");
    }

    #[test]
    fn bypassed_rules_without_generator_is_provider_unavailable() {
        let mut pipeline = pipeline(PipelineOptions {
            use_rules: false,
            legacy_matcher: false,
            ..PipelineOptions::default()
        });
        let err = pipeline.parse("draw circle r=1 at (0,0)").unwrap_err();
        assert_eq!(err.code(), "E200");
    }

    #[test]
    fn structured_rule_errors_do_not_fall_through() {
        let mut pipeline = pipeline(PipelineOptions::default())
            .with_generator(GenerativeParser::new(Box::new(MockGenerator::new())));
        let err = pipeline.parse("draw circle at (1,2)").unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn legacy_matcher_sits_between_rules_and_generator() {
        let mut pipeline = pipeline(PipelineOptions::default())
            .with_generator(GenerativeParser::new(Box::new(MockGenerator::new())));
        let parsed = pipeline.parse("draw a 10mm circle at (5,5)").unwrap();
        assert_eq!(parsed.source, CommandSource::Legacy);

        let parsed = pipeline.parse("hello").unwrap();
        assert_eq!(parsed.source, CommandSource::Generative);
        assert!(parsed.commands.is_empty());
    }

    #[test]
    fn round_limit_reports_outstanding_questions() {
        struct Stubborn;
        impl AnswerSource for Stubborn {
            fn answer(&mut self, _question: &FollowUpQuestion) -> Option<MemoryValue> {
                Some(MemoryValue::from("no idea"))
            }
        }

        let mut pipeline = pipeline(PipelineOptions {
            max_rounds: 3,
            ..PipelineOptions::default()
        });
        let commands = vec![Command::Circle(Default::default())];
        let err = pipeline.resolve(&commands, &mut Stubborn).unwrap_err();
        match err {
            PipelineError::Unresolved { questions } => assert_eq!(questions.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_answers_fill_coordinates_with_zero() {
        let mut answers = DefaultAnswers::new().with("text.position.x", 7_i64);
        let question = |field: &str| FollowUpQuestion {
            id: format!("answer.0.{field}"),
            command_index: 0,
            field: field.to_string(),
            prompt: String::new(),
            expected: "number".to_string(),
        };
        assert_eq!(
            answers.answer(&question("rect.center.y")),
            Some(MemoryValue::from(0_i64))
        );
        assert_eq!(
            answers.answer(&question("text.position.x")),
            Some(MemoryValue::from(7_i64))
        );
        assert_eq!(answers.answer(&question("unknown.field")), None);
    }

    #[test]
    fn batch_status_distinguishes_empty_from_failed() {
        let mut pipeline = pipeline(PipelineOptions {
            legacy_matcher: false,
            ..PipelineOptions::default()
        });
        let mut answers = DefaultAnswers::new();

        let report = pipeline.process_batch(["", "   "], &mut answers);
        assert_eq!(report.status(), RunStatus::Empty);
        assert_eq!(report.processed, 0);

        let report = pipeline.process_batch(["nonsense"], &mut answers);
        assert_eq!(report.status(), RunStatus::Failed);
        assert_eq!(report.failures[0].code, "E100");

        let report =
            pipeline.process_batch(["nonsense", "draw circle r=5 at (0,0)"], &mut answers);
        assert_eq!(report.status(), RunStatus::Completed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.bundle.len(), 1);
    }
}
