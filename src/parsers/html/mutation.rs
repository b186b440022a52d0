//! DOM 变更记录
//!
//! 以 `MutationObserver` 的方式描述 DOM 变更：页面脚本通过 [`DomMutator`]
//! 修改文档，每次修改生成一条 [`MutationRecord`]，再投递给所有覆盖该目标的
//! 观察者。观察者积累记录，宿主在合适的时机取出整批记录交给引擎。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::dom::{get_node_name, get_parent_node, is_inclusive_descendant, set_node_attr};

/// 变更类型
#[derive(Clone)]
pub enum MutationKind {
    ChildList {
        added_nodes: Vec<Handle>,
        removed_nodes: Vec<Handle>,
    },
    Attributes {
        name: String,
    },
    CharacterData,
}

/// 单条变更记录
#[derive(Clone)]
pub struct MutationRecord {
    pub target: Handle,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn child_list(
        target: Handle,
        added_nodes: Vec<Handle>,
        removed_nodes: Vec<Handle>,
    ) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList {
                added_nodes,
                removed_nodes,
            },
        }
    }

    pub fn attributes(target: Handle, name: impl Into<String>) -> Self {
        Self {
            target,
            kind: MutationKind::Attributes { name: name.into() },
        }
    }

    pub fn character_data(target: Handle) -> Self {
        Self {
            target,
            kind: MutationKind::CharacterData,
        }
    }

    /// 新增节点，非 childList 记录为空
    pub fn added_nodes(&self) -> &[Handle] {
        match &self.kind {
            MutationKind::ChildList { added_nodes, .. } => added_nodes,
            _ => &[],
        }
    }
}

impl fmt::Debug for MutationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = get_node_name(&self.target).unwrap_or("#node");
        match &self.kind {
            MutationKind::ChildList {
                added_nodes,
                removed_nodes,
            } => write!(
                f,
                "childList({}, +{}, -{})",
                target,
                added_nodes.len(),
                removed_nodes.len()
            ),
            MutationKind::Attributes { name } => write!(f, "attributes({}, {})", target, name),
            MutationKind::CharacterData => write!(f, "characterData({})", target),
        }
    }
}

/// 观察选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl ObserverInit {
    /// 只观察子树结构变化
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Default::default()
        }
    }

    fn accepts(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::ChildList { .. } => self.child_list,
            MutationKind::Attributes { .. } => self.attributes,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

struct ObserverState {
    root: RefCell<Option<Handle>>,
    init: Cell<ObserverInit>,
    records: RefCell<Vec<MutationRecord>>,
}

/// 变更观察者
///
/// 克隆得到的句柄共享同一份状态。
#[derive(Clone)]
pub struct MutationObserver {
    state: Rc<ObserverState>,
}

impl MutationObserver {
    pub fn new() -> Self {
        Self {
            state: Rc::new(ObserverState {
                root: RefCell::new(None),
                init: Cell::new(ObserverInit::default()),
                records: RefCell::new(Vec::new()),
            }),
        }
    }

    /// 开始观察 `root`
    pub fn observe(&self, root: &Handle, init: ObserverInit) {
        *self.state.root.borrow_mut() = Some(root.clone());
        self.state.init.set(init);
    }

    /// 停止观察并丢弃未取出的记录
    pub fn disconnect(&self) {
        self.state.root.borrow_mut().take();
        self.state.records.borrow_mut().clear();
    }

    pub fn is_connected(&self) -> bool {
        self.state.root.borrow().is_some()
    }

    /// 取出积累的记录
    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.state.records.borrow_mut())
    }

    pub fn pending(&self) -> usize {
        self.state.records.borrow().len()
    }

    fn notify(&self, record: &MutationRecord) {
        let root = self.state.root.borrow();
        let Some(root) = root.as_ref() else {
            return;
        };

        let init = self.state.init.get();
        if !init.accepts(&record.kind) {
            return;
        }

        let covered = if init.subtree {
            is_inclusive_descendant(&record.target, root)
        } else {
            Rc::ptr_eq(&record.target, root)
        };

        if covered {
            self.state.records.borrow_mut().push(record.clone());
        }
    }
}

impl Default for MutationObserver {
    fn default() -> Self {
        Self::new()
    }
}

/// 产生变更记录的 DOM 修改入口
///
/// 断开的观察者不再接收记录。
#[derive(Clone, Default)]
pub struct DomMutator {
    observers: Rc<RefCell<Vec<MutationObserver>>>,
}

impl DomMutator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记观察者，重复登记同一观察者无效
    pub fn register(&self, observer: &MutationObserver) {
        let mut observers = self.observers.borrow_mut();
        if !observers
            .iter()
            .any(|existing| Rc::ptr_eq(&existing.state, &observer.state))
        {
            observers.push(observer.clone());
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn dispatch(&self, record: MutationRecord) {
        tracing::trace!("DOM 变更: {:?}", record);
        for observer in self.observers.borrow().iter() {
            observer.notify(&record);
        }
    }

    /// 追加单个子节点
    pub fn append_child(&self, parent: &Handle, child: Handle) {
        self.append_children(parent, vec![child]);
    }

    /// 一次追加多个子节点，只产生一条记录（相当于插入 DocumentFragment）
    pub fn append_children(&self, parent: &Handle, children: Vec<Handle>) {
        if children.is_empty() {
            return;
        }

        for child in &children {
            detach(child);
            child.parent.set(Some(Rc::downgrade(parent)));
            parent.children.borrow_mut().push(child.clone());
        }

        self.dispatch(MutationRecord::child_list(parent.clone(), children, Vec::new()));
    }

    /// 移除子节点，节点不在该父节点下时不做任何事
    pub fn remove_child(&self, parent: &Handle, child: &Handle) -> bool {
        let removed = {
            let mut children = parent.children.borrow_mut();
            match children.iter().position(|c| Rc::ptr_eq(c, child)) {
                Some(index) => {
                    children.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            child.parent.set(None);
            self.dispatch(MutationRecord::child_list(
                parent.clone(),
                Vec::new(),
                vec![child.clone()],
            ));
        }
        removed
    }

    /// 设置属性
    pub fn set_attribute(&self, node: &Handle, name: &str, value: &str) {
        match set_node_attr(node, name, Some(value)) {
            Ok(()) => self.dispatch(MutationRecord::attributes(node.clone(), name)),
            Err(e) => tracing::warn!("设置属性 {} 失败: {}", name, e),
        }
    }

    /// 替换文本节点内容
    pub fn set_text(&self, node: &Handle, text: &str) {
        if let NodeData::Text { contents } = &node.data {
            match contents.try_borrow_mut() {
                Ok(mut contents) => {
                    contents.clear();
                    contents.push_slice(text);
                }
                Err(e) => {
                    tracing::warn!("写入文本失败: {}", e);
                    return;
                }
            }
            self.dispatch(MutationRecord::character_data(node.clone()));
        }
    }
}

fn detach(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
        node.parent.set(None);
    }
}
