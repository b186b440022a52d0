//! 翻译模块
//!
//! 用词典中的 `模式 -> 替换文本` 规则改写页面中的可读文本，并随 DOM 变更持续生效：
//! - **dictionary**: 词典与词典加载
//! - **compiler**: 模式编译（排序、转义、锚定）
//! - **substitution**: 对单段文本应用匹配器
//! - **coordinator**: 变更批次的增量/批量处理
//! - **hover**: 悬停时刷新提示属性
//! - **engine**: 引擎实例与激活时序
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use d4t::html::html_to_dom;
//! use d4t::translation::{EngineConfig, ReadyState, TranslationEngine};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dom = html_to_dom(b"<html><body>Hello</body></html>", "utf-8")?;
//! let mut engine = TranslationEngine::new(EngineConfig::default(), dom.document.clone());
//!
//! engine.boot(ReadyState::Complete);
//! engine.run_until_idle();
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod config;
pub mod coordinator;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod hover;
pub mod message;
pub mod scheduler;
pub mod store;
pub mod substitution;

pub use compiler::{CompiledMatcher, MatcherSet, PatternCompiler};
pub use config::{ConfigManager, EngineConfig, MatchPolicy};
pub use coordinator::{BatchOutcome, CoordinatorState, CoordinatorStats, MutationCoordinator};
pub use dictionary::{Dictionary, DictionaryIssue, DictionaryLoader};
pub use engine::{EngineState, LifecycleEvent, ReadyState, TranslationEngine};
pub use error::{
    CompileError, ConfigError, ErrorSeverity, LoadError, StoreError, SubstitutionError,
    TranslatorError, TranslatorResult,
};
pub use hover::InteractionHook;
pub use message::RuntimeMessage;
pub use scheduler::{Clock, DebounceTimer, ManualClock, SystemClock};
pub use store::{FlagStore, JsonFileFlagStore, MemoryFlagStore};
pub use substitution::{apply, Substitution, TranslationStats};
