pub mod clarify;
pub mod compiler;
pub mod memory;
pub mod pipeline;

pub mod errors {
    use textcad_core::store::StoreError;
    use textcad_core::units::UnitError;
    use textcad_dsl::ParseError;
    use thiserror::Error;

    use crate::clarify::FollowUpQuestion;

    #[derive(Debug, Error)]
    pub enum MemoryError {
        #[error("session value '{key}' expired")]
        Expired { key: String },
        #[error(transparent)]
        Store(#[from] StoreError),
    }

    impl MemoryError {
        pub fn code(&self) -> &'static str {
            match self {
                MemoryError::Expired { .. } => "E300",
                MemoryError::Store(_) => "E310",
            }
        }
    }

    /// 编译阶段的失败：长度换算或坐标累加超出十进制范围。
    #[derive(Debug, Error)]
    pub enum CompileError {
        #[error(transparent)]
        Unit(#[from] UnitError),
        #[error("coordinate for '{field}' is out of range")]
        CoordinateOverflow { field: String },
    }

    impl CompileError {
        pub fn code(&self) -> &'static str {
            match self {
                CompileError::Unit(err) => err.code(),
                CompileError::CoordinateOverflow { .. } => "E320",
            }
        }
    }

    #[derive(Debug, Error)]
    pub enum PipelineError {
        #[error(transparent)]
        Parse(#[from] ParseError),
        #[error(transparent)]
        Memory(#[from] MemoryError),
        #[error(transparent)]
        Compile(#[from] CompileError),
        #[error("clarification did not converge, {} question(s) outstanding", .questions.len())]
        Unresolved { questions: Vec<FollowUpQuestion> },
        #[error("no answer available for '{question}'")]
        AnswersExhausted { question: String },
    }

    impl PipelineError {
        pub fn code(&self) -> &'static str {
            match self {
                PipelineError::Parse(err) => err.code(),
                PipelineError::Memory(err) => err.code(),
                PipelineError::Compile(err) => err.code(),
                PipelineError::Unresolved { .. } => "E301",
                PipelineError::AnswersExhausted { .. } => "E302",
            }
        }
    }
}

pub use clarify::{FollowUpQuestion, Resolution, clarify};
pub use compiler::CommandCompiler;
pub use errors::{CompileError, MemoryError, PipelineError};
pub use memory::SessionMemory;
pub use pipeline::{
    AnswerSource, BatchReport, CommandSource, DefaultAnswers, Pipeline, PipelineOptions,
    RunStatus, UtteranceFailure,
};
