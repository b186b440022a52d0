//! # D4T Library
//!
//! 用词典中的 `模式 -> 替换文本` 规则改写 HTML 文档中的可读文本，
//! 并在文档变更、悬停和手动触发时保持替换结果。
//!
//! ## 模块组织
//!
//! - `core` - 文档读取、翻译与序列化的入口
//! - `env` - 环境变量定义
//! - `parsers` - HTML 解析、DOM 操作、变更记录与遍历
//! - `translation` - 词典、模式编译、替换与引擎

pub mod core;
pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use core::*;
pub use parsers::*;
