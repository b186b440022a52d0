use std::cell::{BorrowMutError, RefCell};
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::tree_builder::create_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

use crate::core::parse_content_type;

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> std::io::Result<RcDom> {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 查找指定路径的DOM节点
///
/// 路径中相邻的名称不要求是直接父子关系，结果按文档顺序排列。
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let mut stack = vec![(node.clone(), node_names)];

    while let Some((node, node_names)) = stack.pop() {
        let Some((&node_name, rest)) = node_names.split_first() else {
            continue;
        };

        let is_match = get_node_name(&node).is_some_and(|name| name == node_name);
        if is_match && rest.is_empty() {
            found_nodes.push(node.clone());
        }

        let next_names = if is_match && !rest.is_empty() {
            rest
        } else {
            node_names
        };

        let children = node.children.borrow();
        stack.extend(children.iter().rev().map(|child| (child.clone(), next_names)));
    }

    found_nodes
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 文档的 body 元素
pub fn find_body(document: &Handle) -> Option<Handle> {
    let html = get_child_node_by_name(document, "html")?;
    get_child_node_by_name(&html, "body")
}

/// 文档 `<meta>` 中声明的字符集
pub fn get_charset(document: &Handle) -> Option<String> {
    for meta_node in find_nodes(document, &["html", "head", "meta"]).iter() {
        if let Some(charset) = get_node_attr(meta_node, "charset") {
            // <meta charset="..." />
            return Some(charset);
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            if let Some(content) = get_node_attr(meta_node, "content") {
                // <meta http-equiv="content-type" content="text/html; charset=..." />
                let (_media_type, charset) = parse_content_type(&content);
                return Some(charset);
            }
        }
    }

    None
}

/// 获取节点属性值
///
/// 属性列表正被可变借用时视为不存在。
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .try_borrow()
            .ok()?
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    get_node_attr(node, attr_name).is_some()
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 节点是否位于 `ancestor` 之下（含自身）
pub fn is_inclusive_descendant(node: &Handle, ancestor: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if Rc::ptr_eq(&candidate, ancestor) {
            return true;
        }
        current = get_parent_node(&candidate);
    }
    false
}

/// 设置节点属性
///
/// `attr_value` 为 `None` 时删除该属性。
pub fn set_node_attr(
    node: &Handle,
    attr_name: &str,
    attr_value: Option<&str>,
) -> Result<(), BorrowMutError> {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs_mut = attrs.try_borrow_mut()?;

        match attr_value {
            Some(attr_value) => {
                if let Some(attr) = attrs_mut
                    .iter_mut()
                    .find(|attr| &*attr.name.local == attr_name)
                {
                    attr.value.clear();
                    attr.value.push_slice(attr_value);
                } else {
                    attrs_mut.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: format_tendril!("{}", attr_value),
                    });
                }
            }
            None => attrs_mut.retain(|attr| &*attr.name.local != attr_name),
        }
    }

    Ok(())
}

/// 创建元素节点
pub fn create_element_node(dom: &RcDom, tag_name: &str, attrs: &[(&str, &str)]) -> Handle {
    let attrs = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    create_element(
        dom,
        QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attrs,
    )
}

/// 创建文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// 文本节点的内容
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => contents.try_borrow().ok().map(|c| c.to_string()),
        _ => None,
    }
}

/// 节点下全部文本拼接
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, buf: &mut String) {
    let mut stack = vec![node.clone()];

    while let Some(node) = stack.pop() {
        if let NodeData::Text { contents } = &node.data {
            if let Ok(contents) = contents.try_borrow() {
                buf.push_str(&contents);
            }
        }

        if let Ok(children) = node.children.try_borrow() {
            stack.extend(children.iter().rev().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str =
        r#"<html><head><title>t</title></head><body><p title="tip">Hi <b>there</b></p></body></html>"#;

    #[test]
    fn test_find_body_and_nodes() {
        let dom = html_to_dom(PAGE.as_bytes(), "utf-8").unwrap();
        let body = find_body(&dom.document).unwrap();
        assert_eq!(get_node_name(&body), Some("body"));

        let bolds = find_nodes(&dom.document, &["body", "p", "b"]);
        assert_eq!(bolds.len(), 1);
        assert_eq!(text_content(&bolds[0]), "there");
    }

    #[test]
    fn test_get_charset() {
        let dom = html_to_dom(
            br#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=Shift_JIS"></head></html>"#,
            "utf-8",
        )
        .unwrap();
        assert_eq!(get_charset(&dom.document).as_deref(), Some("Shift_JIS"));

        let dom = html_to_dom(PAGE.as_bytes(), "utf-8").unwrap();
        assert_eq!(get_charset(&dom.document), None);
    }

    #[test]
    fn test_attributes() {
        let dom = html_to_dom(PAGE.as_bytes(), "utf-8").unwrap();
        let p = find_nodes(&dom.document, &["p"]).remove(0);

        assert_eq!(get_node_attr(&p, "title").as_deref(), Some("tip"));
        set_node_attr(&p, "title", Some("new")).unwrap();
        assert_eq!(get_node_attr(&p, "title").as_deref(), Some("new"));
        set_node_attr(&p, "lang", Some("ja")).unwrap();
        assert!(has_node_attr(&p, "lang"));
        set_node_attr(&p, "title", None).unwrap();
        assert!(!has_node_attr(&p, "title"));
    }

    #[test]
    fn test_parent_lookup_keeps_link() {
        let dom = html_to_dom(PAGE.as_bytes(), "utf-8").unwrap();
        let b = find_nodes(&dom.document, &["b"]).remove(0);
        let body = find_body(&dom.document).unwrap();

        let parent = get_parent_node(&b).unwrap();
        assert_eq!(get_node_name(&parent), Some("p"));
        // 再次查询仍然可用
        assert!(get_parent_node(&b).is_some());
        assert!(is_inclusive_descendant(&b, &body));
        assert!(!is_inclusive_descendant(&body, &b));
    }

    #[test]
    fn test_create_nodes() {
        let dom = RcDom::default();
        let span = create_element_node(&dom, "span", &[("title", "x")]);
        assert_eq!(get_node_name(&span), Some("span"));
        assert_eq!(get_node_attr(&span, "title").as_deref(), Some("x"));

        let text = create_text_node("hello");
        assert_eq!(get_text(&text).as_deref(), Some("hello"));
    }

    #[test]
    fn test_deep_nesting_queries() {
        let html = format!(
            "<html><head><meta charset=\"utf-8\"></head><body>{}<b>deep</b></body></html>",
            "<span>".repeat(20_000)
        );
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();

        assert_eq!(get_charset(&dom.document).as_deref(), Some("utf-8"));
        let bolds = find_nodes(&dom.document, &["body", "b"]);
        assert_eq!(bolds.len(), 1);
        assert_eq!(text_content(&dom.document), "deep");
    }
}
