use std::io::{BufRead, Write};

use textcad_core::store::MemoryValue;
use textcad_engine::{AnswerSource, DefaultAnswers, FollowUpQuestion};
use tracing::debug;

/// 在终端逐个提问，读取一行作为回答；输入结束时返回 `None`。
/// 直接回车时使用该字段的内置默认值。
pub struct PromptAnswers<R, W> {
    input: R,
    output: W,
    defaults: DefaultAnswers,
}

impl<R: BufRead, W: Write> PromptAnswers<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            defaults: DefaultAnswers::new(),
        }
    }
}

impl<R: BufRead, W: Write> AnswerSource for PromptAnswers<R, W> {
    fn answer(&mut self, question: &FollowUpQuestion) -> Option<MemoryValue> {
        write!(self.output, "{} ({}) > ", question.prompt, question.expected).ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let answer = line.trim();
                if answer.is_empty() {
                    if let Some(value) = self.defaults.answer(question) {
                        debug!(field = %question.field, value = ?value, "空回答，使用默认值");
                        return Some(value);
                    }
                }
                debug!(field = %question.field, answer, "收到回答");
                Some(MemoryValue::from(answer))
            }
        }
    }
}
