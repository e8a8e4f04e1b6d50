use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use textcad_core::units::{LengthUnit, UnitError};
use thiserror::Error;

pub const CONFIG_ENV: &str = "TEXTCAD_CONFIG";
pub const PROVIDER_ENV: &str = "TEXTCAD_PROVIDER";
pub const MODEL_ENV: &str = "TEXTCAD_MODEL";
pub const UNITS_ENV: &str = "TEXTCAD_DEFAULT_UNITS";
pub const LOG_ENV: &str = "TEXTCAD_LOG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `TEXTCAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。之后叠加 `TEXTCAD_*` 环境变量覆盖。
    pub fn discover() -> Result<Self, ConfigError> {
        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        let lookup = |key: &str| env::var(key).ok();
        let mut config = Self::discover_from(lookup, &cwd)?;
        config.apply_overrides_from(lookup);
        Ok(config)
    }

    /// 不读取进程环境的发现逻辑，`lookup` 提供环境变量。
    pub fn discover_from(
        lookup: impl Fn(&str) -> Option<String>,
        cwd: &Path,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = cwd.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 叠加环境变量覆盖，空值忽略。
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(name) = get(PROVIDER_ENV) {
            self.provider.name = name;
        }
        if let Some(model) = get(MODEL_ENV) {
            self.provider.model = Some(model);
        }
        if let Some(units) = get(UNITS_ENV) {
            self.units.default = units;
        }
        if let Some(level) = get(LOG_ENV) {
            self.logging.level = level;
        }
    }

    /// 未带单位的数值使用的默认长度单位。
    pub fn default_unit(&self) -> Result<LengthUnit, UnitError> {
        LengthUnit::from_alias(&self.units.default)
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitsConfig {
    #[serde(default = "UnitsConfig::default_unit")]
    pub default: String,
}

impl UnitsConfig {
    fn default_unit() -> String {
        LengthUnit::Millimeter.symbol().to_string()
    }
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            default: Self::default_unit(),
        }
    }
}

/// 文本生成协作者。`none` / `off` / `disabled` 表示不使用。
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "ProviderConfig::default_name")]
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "ProviderConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl ProviderConfig {
    fn default_name() -> String {
        "mock".to_string()
    }

    fn default_max_attempts() -> u32 {
        3
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            model: None,
            temperature: 0.0,
            max_attempts: Self::default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "MemoryConfig::default_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default = "MemoryConfig::default_project_id")]
    pub project_id: String,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl MemoryConfig {
    fn default_ttl_secs() -> i64 {
        600
    }

    fn default_project_id() -> String {
        "default".to_string()
    }

    /// `ttl_secs <= 0` 表示永不过期。
    pub fn ttl(&self) -> Option<Duration> {
        u64::try_from(self.ttl_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Self::default_ttl_secs(),
            project_id: Self::default_project_id(),
            store_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "PipelineConfig::enabled")]
    pub use_rules: bool,
    #[serde(default = "PipelineConfig::enabled")]
    pub legacy_matcher: bool,
    #[serde(default = "PipelineConfig::default_rounds")]
    pub max_clarification_rounds: usize,
}

impl PipelineConfig {
    fn enabled() -> bool {
        true
    }

    fn default_rounds() -> usize {
        8
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_rules: true,
            legacy_matcher: true,
            max_clarification_rounds: Self::default_rounds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_path")]
    pub path: PathBuf,
    #[serde(default = "OutputConfig::default_layer")]
    pub layer: String,
}

impl OutputConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("outputs").join("cli_output.dxf")
    }

    fn default_layer() -> String {
        textcad_core::geometry::DEFAULT_LAYER.to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            layer: Self::default_layer(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::discover_from(no_env, dir.path()).expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.default_unit().unwrap(), LengthUnit::Millimeter);
        assert_eq!(cfg.provider.name, "mock");
        assert_eq!(cfg.provider.max_attempts, 3);
        assert_eq!(cfg.memory.ttl(), Some(Duration::from_secs(600)));
        assert!(cfg.memory.store_path.is_none());
        assert!(cfg.pipeline.use_rules && cfg.pipeline.legacy_matcher);
        assert_eq!(cfg.pipeline.max_clarification_rounds, 8);
        assert_eq!(cfg.output.path, PathBuf::from("outputs/cli_output.dxf"));
        assert_eq!(cfg.output.layer, "A-GEOM");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [units]
            default = "inch"

            [provider]
            name = "none"
            max_attempts = 5

            [memory]
            ttl_secs = 0
            project_id = "site-a"
            store_path = "state/memory.json"

            [pipeline]
            legacy_matcher = false
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.default_unit().unwrap(), LengthUnit::Inch);
        assert_eq!(cfg.provider.name, "none");
        assert_eq!(cfg.provider.max_attempts, 5);
        assert_eq!(cfg.memory.ttl(), None);
        assert_eq!(cfg.memory.project_id, "site-a");
        assert_eq!(
            cfg.memory.store_path.as_deref(),
            Some(Path::new("state/memory.json"))
        );
        assert!(cfg.pipeline.use_rules);
        assert!(!cfg.pipeline.legacy_matcher);
        assert_eq!(cfg.output.layer, "A-GEOM");
    }

    #[test]
    fn env_path_and_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("default.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();
        let custom = dir.path().join("custom.toml");
        fs::write(&custom, "[logging]\nlevel = \"trace\"\n").unwrap();

        let found = AppConfig::discover_from(no_env, dir.path()).unwrap();
        assert_eq!(found.logging.level, "warn");

        let env: HashMap<&str, String> = [
            (CONFIG_ENV, custom.display().to_string()),
            (PROVIDER_ENV, "off".to_string()),
            (MODEL_ENV, "local-small".to_string()),
            (UNITS_ENV, "in".to_string()),
            (LOG_ENV, String::new()),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).cloned();
        let mut cfg = AppConfig::discover_from(lookup, dir.path()).unwrap();
        cfg.apply_overrides_from(lookup);
        assert_eq!(cfg.logging.level, "trace");
        assert_eq!(cfg.provider.name, "off");
        assert_eq!(cfg.provider.model.as_deref(), Some("local-small"));
        assert_eq!(cfg.default_unit().unwrap(), LengthUnit::Inch);
    }

    #[test]
    fn bad_unit_and_bad_toml_are_errors() {
        let mut cfg = AppConfig::default();
        cfg.units.default = "furlong".to_string();
        assert!(matches!(
            cfg.default_unit(),
            Err(UnitError::UnsupportedUnit(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[memory]\nttl_secs = \"soon\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
