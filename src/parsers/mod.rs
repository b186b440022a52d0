//! # 解析器模块
//!
//! - `html` - HTML文档解析、DOM操作、变更记录与翻译遍历

pub mod html;

pub use html::{find_body, html_to_dom, serialize_document, translate};
