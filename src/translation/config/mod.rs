//! 引擎配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, EngineConfig, MatchPolicy};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 词典
    pub const DEFAULT_DICTIONARY: &str = "translations.json";
    pub const DEFAULT_RESOURCE_DIR: &str = ".";

    // 变更观察
    pub const DEFAULT_BULK_THRESHOLD: usize = 50;
    pub const DEFAULT_MUTATION_DEBOUNCE: Duration = Duration::from_millis(100);
    pub const DEFAULT_ACTIVATION_DELAY: Duration = Duration::from_millis(500);

    // 模式编译
    pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

    /// 浏览器从该属性渲染悬停提示
    pub const TITLE_ATTRIBUTE: &str = "title";

    /// 内容不是可渲染文本的元素
    pub const SKIP_ELEMENTS: &[&str] = &["script", "style", "noscript"];

    /// 与彼此等价的撇号字符
    pub const APOSTROPHES: &[char] = &['\'', '\u{2019}'];

    // 词典检查
    pub const MAX_USABLE_KEY_CHARS: usize = 200;
    pub const MAX_REGEX_SPECIAL_CHARS: usize = 10;
    pub const REGEX_SPECIAL_CHARS: &[char] = &[
        '\\', '(', ')', '|', '[', ']', '{', '}', '+', '*', '?', '^', '$', '.',
    ];

    /// 游戏文本中的格式标记，页面上渲染后不会原样出现
    pub const FORMAT_TAG_MARKERS: &[&str] =
        &["{c_", "{/c}", "{icon:", "{/", "{VALUE", "{vALUE", "{Value"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &["d4t.toml", ".d4t.toml", "~/.config/d4t/config.toml"];
}
