//! 翻译引擎统一错误处理
//!
//! 三类运行期错误对应引擎的三种恢复策略：
//!
//! - [`LoadError`]：词典加载失败，本次激活终止
//! - [`CompileError`]：单条模式编译失败，跳过该条目后继续
//! - [`SubstitutionError`]：单个节点替换失败，保留原节点后继续遍历
//!
//! [`TranslatorError`] 把它们与配置、IO 错误统一起来，供调用方使用 `?` 传播。

use thiserror::Error;

/// 词典加载错误
#[derive(Error, Debug)]
pub enum LoadError {
    /// 网络传输失败
    #[error("词典传输失败 ({resource}): {message}")]
    Transport { resource: String, message: String },

    /// 响应状态码不是 2xx
    #[error("词典请求失败 ({resource}), 状态码: {status}")]
    Status { resource: String, status: u16 },

    /// 本地资源读取失败
    #[error("无法读取词典 {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    /// 响应体不是合法 JSON
    #[error("词典解析失败 ({resource}): {source}")]
    Parse {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// 出错的资源标识
    pub fn resource(&self) -> &str {
        match self {
            LoadError::Transport { resource, .. }
            | LoadError::Status { resource, .. }
            | LoadError::Io { resource, .. }
            | LoadError::Parse { resource, .. } => resource,
        }
    }
}

/// 模式编译错误
#[derive(Error, Debug)]
pub enum CompileError {
    /// 空模式会在每个位置匹配，直接拒绝
    #[error("模式为空")]
    EmptyPattern,

    /// 转义后的模式仍无法编译（例如超出正则大小限制）
    #[error("模式 {pattern:?} 编译失败: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// 节点替换错误
#[derive(Error, Debug)]
pub enum SubstitutionError {
    /// 节点内容或属性正被其他位置借用
    #[error("节点 {target} 正被占用，无法写回")]
    BorrowConflict { target: String },
}

/// 开关存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("无法访问开关存储 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("开关存储内容损坏 ({path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误
#[derive(Error, Debug, Clone)]
#[error("配置错误: {0}")]
pub struct ConfigError(pub String);

/// 引擎统一错误类型
#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Substitution(#[from] SubstitutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// 文档读取或序列化失败
    #[error("文档处理失败: {0}")]
    Document(String),
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl TranslatorError {
    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslatorError::Load(_) => ErrorSeverity::Critical,
            TranslatorError::Compile(_) => ErrorSeverity::Warning,
            TranslatorError::Substitution(_) => ErrorSeverity::Warning,
            TranslatorError::Config(_) => ErrorSeverity::Critical,
            TranslatorError::Store(_) => ErrorSeverity::Error,
            TranslatorError::Io(_) => ErrorSeverity::Error,
            TranslatorError::Document(_) => ErrorSeverity::Error,
        }
    }

    /// 检查错误是否值得重试
    ///
    /// 加载失败不会自动重试，但手动触发可以重新尝试。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslatorError::Load(LoadError::Transport { .. }) => true,
            TranslatorError::Load(LoadError::Status { status, .. }) => *status >= 500,
            TranslatorError::Load(_) => false,
            TranslatorError::Compile(_) => false,
            TranslatorError::Substitution(_) => true,
            TranslatorError::Config(_) => false,
            TranslatorError::Store(StoreError::Io { .. }) => true,
            TranslatorError::Store(StoreError::Parse { .. }) => false,
            TranslatorError::Io(_) => true,
            TranslatorError::Document(_) => false,
        }
    }

    /// 按严重程度写日志
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Info => tracing::info!("{}", self),
            ErrorSeverity::Warning => tracing::warn!("{}", self),
            ErrorSeverity::Error => tracing::error!("{}", self),
            ErrorSeverity::Critical => tracing::error!("严重错误: {}", self),
        }
    }
}

/// 错误结果类型别名
pub type TranslatorResult<T> = Result<T, TranslatorError>;
