//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，配置管理器用它覆盖文件配置

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回值
    fn get_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "D4T_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 引擎相关环境变量
pub mod engine {
    use super::*;

    /// 引擎启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "D4T_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the translation engine";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 词典资源标识
    pub struct Dictionary;
    impl EnvVar<String> for Dictionary {
        const NAME: &'static str = "D4T_DICTIONARY";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("translations.json".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Dictionary resource (path or http(s) URL)";

        fn parse(value: &str) -> EnvResult<String> {
            let resource = value.trim();
            if resource.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Dictionary resource cannot be empty".to_string(),
                });
            }
            Ok(resource.to_string())
        }
    }

    /// 资源根目录
    pub struct ResourceDir;
    impl EnvVar<String> for ResourceDir {
        const NAME: &'static str = "D4T_RESOURCE_DIR";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok(".".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Directory bundled resources are resolved against";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(shellexpand::tilde(value.trim()).to_string())
        }
    }

    /// 批量变更阈值
    pub struct BulkThreshold;
    impl EnvVar<usize> for BulkThreshold {
        const NAME: &'static str = "D4T_BULK_THRESHOLD";
        const DEFAULT: Option<usize> = Some(50);
        const DESCRIPTION: &'static str =
            "Mutation records per batch above which a full re-translation is scheduled";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100_000)
        }
    }

    /// 变更防抖间隔
    pub struct MutationDebounce;
    impl EnvVar<Duration> for MutationDebounce {
        const NAME: &'static str = "D4T_MUTATION_DEBOUNCE_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(100));
        const DESCRIPTION: &'static str = "Quiet period before a bulk re-translation, in ms";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 10_000)
        }
    }

    /// 激活防抖间隔
    pub struct ActivationDelay;
    impl EnvVar<Duration> for ActivationDelay {
        const NAME: &'static str = "D4T_ACTIVATION_DELAY_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(500));
        const DESCRIPTION: &'static str =
            "Delay collapsing page lifecycle triggers into one initial pass, in ms";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 60_000)
        }
    }

    /// 匹配策略
    pub struct MatchPolicy;
    impl EnvVar<String> for MatchPolicy {
        const NAME: &'static str = "D4T_MATCH_POLICY";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("word_boundary".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Pattern anchoring: word_boundary or substring";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().replace('-', "_").as_str() {
                "word_boundary" | "word" => Ok("word_boundary".to_string()),
                "substring" | "none" => Ok("substring".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid match policy '{}'. Use: word_boundary, substring",
                        value
                    ),
                }),
            }
        }
    }

    /// 详细替换日志
    pub struct Verbose;
    impl EnvVar<bool> for Verbose {
        const NAME: &'static str = "D4T_VERBOSE";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Log every changed text and title";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_millis(value: &str, var_name: &str, max: u64) -> EnvResult<Duration> {
    let millis: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid number of milliseconds".to_string(),
    })?;

    if millis > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Delay too long (max {} ms)", max),
        });
    }

    Ok(Duration::from_millis(millis))
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: \"info\")\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::NoColor::NAME,
        core::NoColor::DESCRIPTION,
        core::NoColor::DEFAULT
    ));

    docs.push_str("\n## Engine\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        engine::Enabled::NAME,
        engine::Enabled::DESCRIPTION,
        engine::Enabled::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: \"translations.json\")\n",
        engine::Dictionary::NAME,
        engine::Dictionary::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: \".\")\n",
        engine::ResourceDir::NAME,
        engine::ResourceDir::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        engine::BulkThreshold::NAME,
        engine::BulkThreshold::DESCRIPTION,
        engine::BulkThreshold::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        engine::MutationDebounce::NAME,
        engine::MutationDebounce::DESCRIPTION,
        engine::MutationDebounce::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        engine::ActivationDelay::NAME,
        engine::ActivationDelay::DESCRIPTION,
        engine::ActivationDelay::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: \"word_boundary\")\n",
        engine::MatchPolicy::NAME,
        engine::MatchPolicy::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        engine::Verbose::NAME,
        engine::Verbose::DESCRIPTION,
        engine::Verbose::DEFAULT
    ));

    docs
}
