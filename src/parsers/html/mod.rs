//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作
//! - `serializer`: 序列化功能
//! - `mutation`: 变更记录与观察者
//! - `walker`: 翻译遍历

pub mod dom;
pub mod mutation;
pub mod serializer;
pub mod walker;

pub use dom::{
    create_element_node, create_text_node, find_body, find_nodes, get_charset,
    get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, get_text,
    has_node_attr, html_to_dom, set_node_attr, text_content,
};
pub use mutation::{DomMutator, MutationKind, MutationObserver, MutationRecord, ObserverInit};
pub use serializer::serialize_document;
pub use walker::{translate, TreeWalker};
