//! 悬停钩子
//!
//! 浏览器在悬停时才读取 `title` 生成提示框。页面脚本在上一次遍历之后写入的
//! 提示文本，需要在悬停事件发生时再翻译一次。

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::is_inclusive_descendant;
use crate::parsers::html::walker::TreeWalker;
use crate::translation::substitution::TranslationStats;

/// 挂在文档 body 上的悬停监听
#[derive(Default)]
pub struct InteractionHook {
    root: Option<Handle>,
    events: usize,
    refreshed: usize,
}

impl InteractionHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 挂载到 `root`，已挂载时返回 `false`
    pub fn attach(&mut self, root: &Handle) -> bool {
        if self.root.is_some() {
            return false;
        }
        self.root = Some(root.clone());
        true
    }

    pub fn detach(&mut self) {
        self.root = None;
    }

    pub fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    /// 收到的悬停事件数
    pub fn events(&self) -> usize {
        self.events
    }

    /// 悬停时实际改写的提示数
    pub fn refreshed(&self) -> usize {
        self.refreshed
    }

    /// 悬停事件：翻译目标元素当前的提示属性
    ///
    /// 返回提示属性是否被改写。
    pub fn on_pointer_over(&mut self, target: &Handle, walker: &TreeWalker<'_>) -> bool {
        let Some(root) = self.root.as_ref() else {
            return false;
        };
        if !is_inclusive_descendant(target, root) {
            return false;
        }

        self.events += 1;
        let mut stats = TranslationStats::default();
        match walker.translate_title(target, &mut stats) {
            Ok(true) => {
                self.refreshed += 1;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!("悬停提示处理失败: {}", e);
                false
            }
        }
    }
}
