//! DOM遍历器模块
//!
//! 对一棵子树执行两趟处理：
//!
//! - **文本**: 深度优先访问全部后代，文本节点内容交给替换引擎；
//!   `script`/`style` 等跳过元素整体不进入
//! - **提示属性**: 子树中（不含根节点自身）所有带 `title` 的元素，属性值
//!   交给替换引擎，只有变化时才写回
//!
//! 每个节点在访问时先对子节点列表做快照，遍历过程中的 DOM 写入不会影响
//! 正在进行的迭代。单个节点失败只记入统计，遍历继续。
//!
//! 两趟都用显式栈代替递归，嵌套层数不受线程栈大小限制。

use markup5ever_rcdom::{Handle, NodeData};

use crate::translation::compiler::CompiledMatcher;
use crate::translation::config::EngineConfig;
use crate::translation::error::SubstitutionError;
use crate::translation::substitution::{apply_with_stats, TranslationStats};

use super::dom::{get_node_attr, get_node_name, get_parent_node, set_node_attr};

/// 对子树执行翻译
pub fn translate(
    root: &Handle,
    matchers: &[CompiledMatcher],
    config: &EngineConfig,
) -> TranslationStats {
    TreeWalker::new(matchers, config).translate(root)
}

/// 树遍历器
pub struct TreeWalker<'a> {
    matchers: &'a [CompiledMatcher],
    config: &'a EngineConfig,
}

impl<'a> TreeWalker<'a> {
    pub fn new(matchers: &'a [CompiledMatcher], config: &'a EngineConfig) -> Self {
        Self { matchers, config }
    }

    /// 文本与提示属性两趟处理
    pub fn translate(&self, root: &Handle) -> TranslationStats {
        let mut stats = TranslationStats::default();
        self.walk_text(root, &mut stats);
        self.walk_titles(root, &mut stats);

        tracing::debug!(
            "遍历完成: 访问 {} 个节点, {} 处替换, {} 个提示更新, {} 个错误",
            stats.nodes_visited,
            stats.replacements,
            stats.titles_updated,
            stats.errors
        );
        stats
    }

    /// 完整遍历：子树两趟处理，再加上根元素自身的提示属性
    ///
    /// 激活、防抖到期和新增节点都以这种方式处理一棵子树。
    pub fn translate_inclusive(&self, root: &Handle) -> TranslationStats {
        let mut stats = self.translate(root);
        if let Err(e) = self.translate_title(root, &mut stats) {
            stats.errors += 1;
            tracing::warn!("根节点提示属性处理失败: {}", e);
        }
        stats
    }

    /// 翻译单个元素自身的提示属性
    ///
    /// 返回属性是否被改写。
    pub fn translate_title(
        &self,
        node: &Handle,
        stats: &mut TranslationStats,
    ) -> Result<bool, SubstitutionError> {
        let attr_name = self.config.title_attribute.as_str();
        let Some(title) = get_node_attr(node, attr_name) else {
            return Ok(false);
        };

        let result = apply_with_stats(&title, self.matchers, stats);
        if !result.changed() {
            return Ok(false);
        }

        set_node_attr(node, attr_name, Some(result.text())).map_err(|_| conflict(node))?;

        if self.config.verbose_logging {
            tracing::debug!("提示替换: {:?} -> {:?}", title, result.text());
        }
        stats.titles_updated += 1;
        Ok(true)
    }

    /// 节点是否位于跳过元素之内（不含自身）
    pub fn is_within_skipped(&self, node: &Handle) -> bool {
        let mut current = get_parent_node(node);
        while let Some(ancestor) = current {
            if get_node_name(&ancestor).is_some_and(|name| self.config.is_skipped_element(name)) {
                return true;
            }
            current = get_parent_node(&ancestor);
        }
        false
    }

    fn walk_text(&self, root: &Handle, stats: &mut TranslationStats) {
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            stats.nodes_visited += 1;

            match &node.data {
                NodeData::Text { .. } => {
                    stats.text_nodes += 1;
                    if let Err(e) = self.translate_text(&node, stats) {
                        stats.errors += 1;
                        tracing::warn!("跳过文本节点: {}", e);
                    }
                }
                NodeData::Element { name, .. } if self.config.is_skipped_element(&name.local) => {
                    stats.elements_skipped += 1;
                }
                NodeData::Element { .. } | NodeData::Document => {
                    if let Some(children) = snapshot_children(&node, stats) {
                        // 逆序入栈，出栈顺序即文档顺序
                        stack.extend(children.into_iter().rev());
                    }
                }
                _ => {}
            }
        }
    }

    fn translate_text(
        &self,
        node: &Handle,
        stats: &mut TranslationStats,
    ) -> Result<(), SubstitutionError> {
        let NodeData::Text { contents } = &node.data else {
            return Ok(());
        };

        let original = contents
            .try_borrow()
            .map_err(|_| conflict(node))?
            .to_string();

        let result = apply_with_stats(&original, self.matchers, stats);
        if !result.changed() {
            return Ok(());
        }

        let mut contents = contents.try_borrow_mut().map_err(|_| conflict(node))?;
        contents.clear();
        contents.push_slice(result.text());

        if self.config.verbose_logging {
            tracing::debug!("文本替换: {:?} -> {:?}", original, result.text());
        }
        Ok(())
    }

    fn walk_titles(&self, root: &Handle, stats: &mut TranslationStats) {
        let Some(children) = snapshot_children(root, stats) else {
            return;
        };
        let mut stack: Vec<Handle> = children.into_iter().rev().collect();

        while let Some(node) = stack.pop() {
            if !matches!(node.data, NodeData::Element { .. }) {
                continue;
            }

            if let Err(e) = self.translate_title(&node, stats) {
                stats.errors += 1;
                tracing::warn!("跳过提示属性: {}", e);
            }
            if let Some(children) = snapshot_children(&node, stats) {
                stack.extend(children.into_iter().rev());
            }
        }
    }
}

fn snapshot_children(node: &Handle, stats: &mut TranslationStats) -> Option<Vec<Handle>> {
    match node.children.try_borrow() {
        Ok(children) => Some(children.clone()),
        Err(_) => {
            stats.errors += 1;
            tracing::warn!("跳过子树: {}", conflict(node));
            None
        }
    }
}

fn conflict(node: &Handle) -> SubstitutionError {
    let target = match &node.data {
        NodeData::Text { .. } => "#text".to_string(),
        _ => get_node_name(node).unwrap_or("#node").to_string(),
    };
    SubstitutionError::BorrowConflict { target }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{
        find_body, find_nodes, get_node_attr, html_to_dom, text_content,
    };
    use crate::translation::compiler::PatternCompiler;
    use crate::translation::dictionary::Dictionary;

    fn matchers(entries: &[(&str, &str)]) -> Vec<CompiledMatcher> {
        PatternCompiler::default()
            .compile(&Dictionary::from_entries(entries.iter().copied()))
            .matchers()
            .to_vec()
    }

    #[test]
    fn test_text_and_titles_are_translated() {
        let dom = html_to_dom(
            br#"<html><body><p title="Sword info">A Sword</p><span title="nothing">x</span></body></html>"#,
            "utf-8",
        )
        .unwrap();
        let body = find_body(&dom.document).unwrap();
        let config = EngineConfig::default();

        let stats = translate(&body, &matchers(&[("sword", "剣")]), &config);

        assert_eq!(text_content(&body), "A 剣x");
        let p = find_nodes(&body, &["p"]).remove(0);
        assert_eq!(get_node_attr(&p, "title").as_deref(), Some("剣 info"));
        assert_eq!(stats.titles_updated, 1);
        assert_eq!(stats.replacements, 2);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_script_and_style_are_skipped() {
        let dom = html_to_dom(
            b"<html><head><style>.sword{}</style></head><body><script>var sword = 1;</script><p>sword</p></body></html>",
            "utf-8",
        )
        .unwrap();
        let config = EngineConfig::default();

        let stats = translate(&dom.document, &matchers(&[("sword", "剣")]), &config);

        let script = find_nodes(&dom.document, &["script"]).remove(0);
        let style = find_nodes(&dom.document, &["style"]).remove(0);
        assert_eq!(text_content(&script), "var sword = 1;");
        assert_eq!(text_content(&style), ".sword{}");
        assert_eq!(stats.elements_skipped, 2);
        assert_eq!(stats.replacements, 1);
    }

    #[test]
    fn test_root_title_is_not_part_of_attribute_pass() {
        let dom = html_to_dom(
            br#"<html><body><div title="sword"><i title="sword"></i></div></body></html>"#,
            "utf-8",
        )
        .unwrap();
        let div = find_nodes(&dom.document, &["div"]).remove(0);
        let config = EngineConfig::default();

        translate(&div, &matchers(&[("sword", "剣")]), &config);

        let i = find_nodes(&div, &["i"]).remove(0);
        assert_eq!(get_node_attr(&div, "title").as_deref(), Some("sword"));
        assert_eq!(get_node_attr(&i, "title").as_deref(), Some("剣"));
    }

    #[test]
    fn test_borrowed_node_is_isolated() {
        let dom = html_to_dom(
            b"<html><body><p>sword</p><p>sword</p></body></html>",
            "utf-8",
        )
        .unwrap();
        let body = find_body(&dom.document).unwrap();
        let paragraphs = find_nodes(&body, &["p"]);
        let locked = paragraphs[0].children.borrow()[0].clone();
        let config = EngineConfig::default();
        let matchers = matchers(&[("sword", "剣")]);

        let stats = {
            let NodeData::Text { contents } = &locked.data else {
                panic!("expected text node");
            };
            let _guard = contents.borrow();
            translate(&body, &matchers, &config)
        };

        assert_eq!(stats.errors, 1);
        assert_eq!(text_content(&paragraphs[0]), "sword");
        assert_eq!(text_content(&paragraphs[1]), "剣");
    }

    #[test]
    fn test_is_within_skipped() {
        let dom = html_to_dom(b"<html><body><script>x</script><p>y</p></body></html>", "utf-8")
            .unwrap();
        let script = find_nodes(&dom.document, &["script"]).remove(0);
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        let config = EngineConfig::default();
        let walker = TreeWalker::new(&[], &config);

        assert!(walker.is_within_skipped(&script.children.borrow()[0]));
        assert!(!walker.is_within_skipped(&p.children.borrow()[0]));
    }

    #[test]
    fn test_text_node_root() {
        let dom = html_to_dom(b"<html><body>old sword</body></html>", "utf-8").unwrap();
        let body = find_body(&dom.document).unwrap();
        let text = body.children.borrow()[0].clone();
        let config = EngineConfig::default();

        let stats = translate(&text, &matchers(&[("sword", "剣")]), &config);
        assert_eq!(stats.text_nodes, 1);
        assert_eq!(text_content(&body), "old 剣");
    }

    #[test]
    fn test_inclusive_pass_covers_root_title() {
        let dom = html_to_dom(
            br#"<html><body><div title="sword"><i title="sword">sword</i></div></body></html>"#,
            "utf-8",
        )
        .unwrap();
        let div = find_nodes(&dom.document, &["div"]).remove(0);
        let config = EngineConfig::default();

        let matchers = matchers(&[("sword", "剣")]);
        let stats = TreeWalker::new(&matchers, &config).translate_inclusive(&div);

        let i = find_nodes(&div, &["i"]).remove(0);
        assert_eq!(get_node_attr(&div, "title").as_deref(), Some("剣"));
        assert_eq!(get_node_attr(&i, "title").as_deref(), Some("剣"));
        assert_eq!(text_content(&div), "剣");
        assert_eq!(stats.titles_updated, 2);
    }

    #[test]
    fn test_deeply_nested_page() {
        let depth = 20_000;
        let spans = "<span title=\"sword\">".repeat(depth);
        let html = format!("<html><body>{}sword</body></html>", spans);
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();
        let body = find_body(&dom.document).unwrap();
        let config = EngineConfig::default();

        let stats = translate(&body, &matchers(&[("sword", "剣")]), &config);

        assert_eq!(stats.errors, 0);
        assert_eq!(stats.text_nodes, 1);
        assert_eq!(stats.titles_updated, depth);
        assert_eq!(text_content(&body), "剣");
    }

    #[test]
    fn test_document_order_is_preserved() {
        let dom = html_to_dom(b"<html><body><p>a<b>b</b>c</p><p>d</p></body></html>", "utf-8")
            .unwrap();
        let body = find_body(&dom.document).unwrap();
        let config = EngineConfig::default();
        let matchers = matchers(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);

        translate(&body, &matchers, &config);

        assert_eq!(text_content(&body), "1234");
    }
}
