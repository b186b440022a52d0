//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::ConfigError;

/// 模式锚定策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// 模式前后不能紧邻单词字符
    #[default]
    WordBoundary,
    /// 不做锚定，较短模式可能命中较长单词的内部
    Substring,
}

impl MatchPolicy {
    fn from_env_value(value: &str) -> Self {
        match value {
            "substring" => MatchPolicy::Substring,
            _ => MatchPolicy::WordBoundary,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    // 基础配置
    pub enabled: bool,
    pub dictionary: String,
    pub resource_dir: PathBuf,

    // 变更观察
    pub bulk_threshold: usize,
    pub mutation_debounce_ms: u64,
    pub activation_delay_ms: u64,

    // 模式编译
    pub match_policy: MatchPolicy,
    pub regex_size_limit: usize,

    // 遍历
    pub title_attribute: String,
    pub skip_elements: Vec<String>,

    // 调试
    pub verbose_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dictionary: constants::DEFAULT_DICTIONARY.to_string(),
            resource_dir: PathBuf::from(constants::DEFAULT_RESOURCE_DIR),

            bulk_threshold: constants::DEFAULT_BULK_THRESHOLD,
            mutation_debounce_ms: constants::DEFAULT_MUTATION_DEBOUNCE.as_millis() as u64,
            activation_delay_ms: constants::DEFAULT_ACTIVATION_DELAY.as_millis() as u64,

            match_policy: MatchPolicy::default(),
            regex_size_limit: constants::DEFAULT_REGEX_SIZE_LIMIT,

            title_attribute: constants::TITLE_ATTRIBUTE.to_string(),
            skip_elements: constants::SKIP_ELEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),

            verbose_logging: false,
        }
    }
}

impl EngineConfig {
    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bulk_threshold == 0 {
            return Err(ConfigError("批量变更阈值不能为0".to_string()));
        }

        if self.title_attribute.trim().is_empty() {
            return Err(ConfigError("提示属性名不能为空".to_string()));
        }

        if self.dictionary.trim().is_empty() {
            return Err(ConfigError("词典资源不能为空".to_string()));
        }

        if self.regex_size_limit == 0 {
            return Err(ConfigError("正则大小限制不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    ///
    /// 只有显式设置的变量才会覆盖文件配置；解析失败的值记录警告后忽略。
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{engine, EnvVar};

        fn take<T>(value: Option<crate::env::EnvResult<T>>) -> Option<T> {
            match value? {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("忽略无效的环境变量: {}", e);
                    None
                }
            }
        }

        if let Some(enabled) = take(engine::Enabled::get_set()) {
            self.enabled = enabled;
        }

        if let Some(dictionary) = take(engine::Dictionary::get_set()) {
            tracing::info!("环境变量覆盖词典资源: {}", dictionary);
            self.dictionary = dictionary;
        }

        if let Some(resource_dir) = take(engine::ResourceDir::get_set()) {
            self.resource_dir = PathBuf::from(resource_dir);
        }

        if let Some(threshold) = take(engine::BulkThreshold::get_set()) {
            self.bulk_threshold = threshold;
        }

        if let Some(debounce) = take(engine::MutationDebounce::get_set()) {
            self.mutation_debounce_ms = debounce.as_millis() as u64;
        }

        if let Some(delay) = take(engine::ActivationDelay::get_set()) {
            self.activation_delay_ms = delay.as_millis() as u64;
        }

        if let Some(policy) = take(engine::MatchPolicy::get_set()) {
            self.match_policy = MatchPolicy::from_env_value(&policy);
        }

        if let Some(verbose) = take(engine::Verbose::get_set()) {
            self.verbose_logging = verbose;
        }
    }

    /// 转换为Duration类型
    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn activation_delay(&self) -> Duration {
        Duration::from_millis(self.activation_delay_ms)
    }

    /// 判断元素是否整体跳过
    pub fn is_skipped_element(&self, tag_name: &str) -> bool {
        self.skip_elements
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(tag_name))
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: EngineConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (mut config, source) = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config, source })
    }

    /// 从指定文件创建配置管理器（仍然应用环境变量覆盖）
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// 获取配置
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    /// 配置文件来源
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    /// 从搜索路径加载配置
    fn load_config() -> Result<(EngineConfig, Option<PathBuf>), ConfigError> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let path = Path::new(expanded_path.as_ref());
            if path.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok((EngineConfig::default(), None))
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() {
                if dotenv::from_filename(env_file).is_ok() {
                    tracing::info!("已加载环境变量文件: {}", env_file);
                    break;
                }
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(&EngineConfig::default())
            .map_err(|e| ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content).map_err(|e| ConfigError(format!("写入配置文件失败: {}", e)))
    }
}
