use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use textcad_config::{AppConfig, ConfigError};
use textcad_dsl::provider::is_disabled;
use textcad_dsl::{GenerativeParser, ProviderRegistry, ProviderSettings};
use textcad_engine::{DefaultAnswers, Pipeline, PipelineOptions, RunStatus, SessionMemory};
use textcad_io::{DxfSink, GeometrySink, JsonProjectStore};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod answers;
mod cli;

use answers::PromptAnswers;
use cli::Cli;

const EXIT_FAILURE: u8 = 1;
const EXIT_EMPTY: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    init_logging(&config);
    info!("启动 textcad");

    match run(&cli, &config) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "执行失败");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => {
            let mut config = AppConfig::from_file(path)?;
            config.apply_overrides_from(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => AppConfig::discover(),
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let options = PipelineOptions {
        use_rules: config.pipeline.use_rules,
        legacy_matcher: config.pipeline.legacy_matcher,
        max_rounds: config.pipeline.max_clarification_rounds,
        default_unit: config.default_unit().context("默认单位无效")?,
        layer: config.output.layer.clone(),
    };
    let mut pipeline = Pipeline::new(options, build_memory(config)?);
    if let Some(parser) = build_generator(cli, config) {
        pipeline = pipeline.with_generator(parser);
    }

    let (utterances, from_stdin) = collect_utterances(cli)?;
    let interactive = cli.interactive(from_stdin, io::stdin().is_terminal());
    info!(utterances = utterances.len(), interactive, "开始处理");

    let report = if interactive {
        let stdin = io::stdin();
        let mut answers = PromptAnswers::new(stdin.lock(), io::stderr());
        pipeline.process_batch(&utterances, &mut answers)
    } else {
        pipeline.process_batch(&utterances, &mut DefaultAnswers::new())
    };

    for failure in &report.failures {
        eprintln!("[{}] {}: {}", failure.code, failure.utterance, failure.message);
    }

    match report.status() {
        RunStatus::Completed => {
            let path = output_path(cli, config, report.save_path.as_deref());
            DxfSink::new()
                .write(&report.bundle, &path)
                .with_context(|| format!("写入 {} 失败", path.display()))?;
            println!(
                "wrote {} entities to {}",
                report.bundle.len(),
                path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        RunStatus::Empty => {
            warn!(processed = report.processed, "没有生成任何实体");
            eprintln!("no entities produced");
            Ok(ExitCode::from(EXIT_EMPTY))
        }
        RunStatus::Failed => Ok(ExitCode::from(EXIT_FAILURE)),
    }
}

fn build_memory(config: &AppConfig) -> anyhow::Result<SessionMemory> {
    let ttl = config.memory.ttl();
    match &config.memory.store_path {
        Some(path) => {
            let store = JsonProjectStore::new(path);
            SessionMemory::with_store(ttl, config.memory.project_id.clone(), Box::new(store))
                .with_context(|| format!("加载项目存储 {} 失败", path.display()))
        }
        None => Ok(SessionMemory::new(ttl)),
    }
}

/// 解析生成式兜底；不可用时退回仅规则模式。
fn build_generator(cli: &Cli, config: &AppConfig) -> Option<GenerativeParser> {
    if cli.no_ai {
        info!("生成式兜底已通过 --no-ai 关闭");
        return None;
    }
    let name = cli.provider.as_deref().unwrap_or(&config.provider.name);
    if is_disabled(name) {
        info!(provider = name, "生成式兜底已关闭");
        return None;
    }

    let settings = ProviderSettings {
        model: config.provider.model.clone(),
        temperature: Some(config.provider.temperature),
        ..ProviderSettings::default()
    };
    let registry = ProviderRegistry::new();
    match registry.resolve(name, &settings) {
        Ok(generator) => {
            let attempts = usize::try_from(config.provider.max_attempts).unwrap_or(usize::MAX);
            Some(GenerativeParser::new(generator).with_max_attempts(attempts))
        }
        Err(err) => {
            warn!(
                provider = name,
                available = ?registry.available(),
                error = %err,
                "提供方不可用，仅使用规则解析"
            );
            None
        }
    }
}

fn collect_utterances(cli: &Cli) -> anyhow::Result<(Vec<String>, bool)> {
    if !cli.commands.is_empty() {
        return Ok((cli.commands.clone(), false));
    }
    let lines = io::stdin()
        .lock()
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .context("读取标准输入失败")?;
    Ok((lines, true))
}

/// `--out` 优先，其次是 `save as` 指定的文件名（仅文件名时放在配置的输出目录），最后是配置。
fn output_path(cli: &Cli, config: &AppConfig, save_path: Option<&str>) -> PathBuf {
    if let Some(out) = &cli.out {
        return out.clone();
    }
    match save_path.map(PathBuf::from) {
        Some(saved) if saved.is_absolute() || saved.parent() != Some(Path::new("")) => saved,
        Some(saved) => match config.output.path.parent() {
            Some(dir) => dir.join(saved),
            None => saved,
        },
        None => config.output.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("textcad").chain(args.iter().copied()))
    }

    #[test]
    fn output_path_precedence() {
        let config = AppConfig::default();
        assert_eq!(
            output_path(&cli(&["--out", "a.dxf"]), &config, Some("b.dxf")),
            PathBuf::from("a.dxf")
        );
        assert_eq!(
            output_path(&cli(&[]), &config, Some("b.dxf")),
            PathBuf::from("outputs/b.dxf")
        );
        assert_eq!(
            output_path(&cli(&[]), &config, Some("plans/b.dxf")),
            PathBuf::from("plans/b.dxf")
        );
        assert_eq!(output_path(&cli(&[]), &config, None), config.output.path);
    }

    #[test]
    fn interactive_mode_selection() {
        assert!(cli(&["--cmd", "x"]).interactive(false, true));
        assert!(!cli(&["--cmd", "x"]).interactive(false, false));
        assert!(cli(&["--interactive"]).interactive(false, false));
        assert!(!cli(&["--interactive"]).interactive(true, true));
        assert!(!cli(&["--non-interactive"]).interactive(false, true));
        assert!(Cli::try_parse_from(["textcad", "--interactive", "--non-interactive"]).is_err());
    }

    #[test]
    fn disabled_provider_means_rule_only() {
        let mut config = AppConfig::default();
        assert!(build_generator(&cli(&[]), &config).is_some());
        assert!(build_generator(&cli(&["--no-ai"]), &config).is_none());
        assert!(build_generator(&cli(&["--provider", "unknown"]), &config).is_none());
        config.provider.name = "off".to_string();
        assert!(build_generator(&cli(&[]), &config).is_none());
    }
}
