//! 翻译引擎
//!
//! 一个页面对应一个引擎实例，持有编译后的匹配器、变更观察者、悬停钩子
//! 和两个防抖定时器（激活防抖、批量变更防抖）。
//!
//! # 生命周期
//!
//! 1. [`boot`](TranslationEngine::boot)：读取启用开关。关闭时引擎保持惰性，
//!    不加载词典也不观察变更。文档已解析完成时立即安排激活
//! 2. `DOMContentLoaded` / `load` 事件都经过同一个激活防抖，
//!    相近的多次触发只产生一次激活
//! 3. 激活：加载词典、编译匹配器、完整遍历，最后挂载观察者与悬停钩子
//! 4. 之后由变更批次和悬停事件驱动，直到 [`teardown`](TranslationEngine::teardown)
//!
//! 所有定时器只记录截止时间，宿主调用 [`poll`](TranslationEngine::poll)
//! 或 [`run_until_idle`](TranslationEngine::run_until_idle) 让它们执行。

use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::find_body;
use crate::parsers::html::mutation::{DomMutator, MutationObserver, MutationRecord, ObserverInit};
use crate::parsers::html::walker::TreeWalker;
use crate::translation::compiler::{MatcherSet, PatternCompiler};
use crate::translation::config::EngineConfig;
use crate::translation::coordinator::{BatchOutcome, CoordinatorStats, MutationCoordinator};
use crate::translation::dictionary::DictionaryLoader;
use crate::translation::error::LoadError;
use crate::translation::hover::InteractionHook;
use crate::translation::message::RuntimeMessage;
use crate::translation::scheduler::{Clock, DebounceTimer, SystemClock};
use crate::translation::store::{FlagStore, MemoryFlagStore};
use crate::translation::substitution::TranslationStats;

/// 文档解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// 页面生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    DomContentLoaded,
    Load,
}

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// 尚未读取开关
    Created,
    /// 开关关闭
    Inert,
    /// 等待激活
    Pending,
    Active,
    /// 最近一次激活因词典加载失败而终止
    Failed,
    TornDown,
}

/// 翻译引擎
pub struct TranslationEngine {
    config: EngineConfig,
    document: Handle,
    loader: DictionaryLoader,
    compiler: PatternCompiler,
    clock: Rc<dyn Clock>,
    flag_store: Rc<dyn FlagStore>,
    mutator: DomMutator,

    state: EngineState,
    matchers: Option<Rc<MatcherSet>>,
    activation: DebounceTimer,
    coordinator: MutationCoordinator,
    observer: MutationObserver,
    hook: InteractionHook,

    activations: usize,
    last_error: Option<LoadError>,
    totals: TranslationStats,
}

impl TranslationEngine {
    pub fn new(config: EngineConfig, document: Handle) -> Self {
        Self {
            loader: DictionaryLoader::new(config.resource_dir.clone()),
            compiler: PatternCompiler::from_config(&config),
            activation: DebounceTimer::new(config.activation_delay()),
            coordinator: MutationCoordinator::new(&config),
            clock: Rc::new(SystemClock::new()),
            flag_store: Rc::new(MemoryFlagStore::default()),
            mutator: DomMutator::new(),
            document,
            config,

            state: EngineState::Created,
            matchers: None,
            observer: MutationObserver::new(),
            hook: InteractionHook::new(),

            activations: 0,
            last_error: None,
            totals: TranslationStats::default(),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_flag_store(mut self, flag_store: Rc<dyn FlagStore>) -> Self {
        self.flag_store = flag_store;
        self
    }

    /// 使用宿主的 DOM 修改入口，观察者会登记到它上面
    pub fn with_mutator(mut self, mutator: DomMutator) -> Self {
        self.mutator = mutator;
        self
    }

    pub fn with_loader(mut self, loader: DictionaryLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn document(&self) -> &Handle {
        &self.document
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn mutator(&self) -> &DomMutator {
        &self.mutator
    }

    /// 当前共享的匹配器列表
    pub fn matchers(&self) -> Option<Rc<MatcherSet>> {
        self.matchers.clone()
    }

    pub fn is_observing(&self) -> bool {
        self.observer.is_connected()
    }

    pub fn hook(&self) -> &InteractionHook {
        &self.hook
    }

    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// 引擎生命周期内的累计遍历统计
    pub fn totals(&self) -> TranslationStats {
        self.totals
    }

    /// 成功完成的激活次数
    pub fn activations(&self) -> usize {
        self.activations
    }

    /// 最近一次未恢复的加载错误
    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<LoadError> {
        self.last_error.take()
    }

    /// 读取启用开关并按文档状态安排激活
    ///
    /// 返回引擎是否启用。
    pub fn boot(&mut self, ready_state: ReadyState) -> bool {
        if self.state != EngineState::Created {
            tracing::debug!("引擎已启动，忽略重复启动");
            return self.is_enabled_state();
        }

        if !self.read_flag() {
            self.state = EngineState::Inert;
            tracing::info!("翻译已关闭，引擎保持惰性");
            return false;
        }

        self.state = EngineState::Pending;
        tracing::info!("翻译引擎已启动");

        if ready_state != ReadyState::Loading {
            tracing::debug!("文档已解析 ({:?})，安排激活", ready_state);
            self.schedule_activation();
        }
        true
    }

    /// 页面生命周期事件
    pub fn on_lifecycle(&mut self, event: LifecycleEvent) {
        if !self.is_enabled_state() {
            return;
        }
        tracing::debug!("生命周期事件: {:?}", event);
        self.schedule_activation();
    }

    /// 运行时消息
    ///
    /// 返回是否执行了激活。惰性状态下会重新读取开关，开关已打开时立即激活。
    pub fn on_message(&mut self, message: &RuntimeMessage) -> bool {
        if !message.is_convert() {
            tracing::debug!("忽略未知消息: {}", message.action);
            return false;
        }

        match self.state {
            EngineState::TornDown => return false,
            EngineState::Created | EngineState::Inert => {
                if !self.read_flag() {
                    tracing::info!("翻译仍处于关闭状态，忽略手动触发");
                    return false;
                }
                self.state = EngineState::Pending;
            }
            _ => {}
        }

        tracing::info!("手动触发翻译");
        // 手动激活取代尚未到期的防抖激活
        self.activation.cancel();
        let _ = self.apply_translations();
        true
    }

    /// 执行一次完整激活
    ///
    /// 加载失败时记录到错误通道，本次激活终止，不使用任何部分词典。
    /// 已激活的引擎在重载失败时继续使用原有匹配器。引擎停止后返回
    /// `Ok(None)`，不再触碰文档。
    pub fn apply_translations(&mut self) -> Result<Option<TranslationStats>, &LoadError> {
        if self.state == EngineState::TornDown {
            tracing::debug!("引擎已停止，忽略激活");
            return Ok(None);
        }

        let dictionary = match self.loader.load(&self.config.dictionary) {
            Ok(dictionary) => dictionary,
            Err(e) => {
                tracing::error!("词典加载失败: {}", e);
                if self.state != EngineState::Active {
                    self.state = EngineState::Failed;
                }
                return Err(self.last_error.insert(e));
            }
        };

        let matchers = Rc::new(self.compiler.compile(&dictionary));
        self.matchers = Some(Rc::clone(&matchers));

        let root = self.translation_root();
        let stats = TreeWalker::new(matchers.matchers(), &self.config)
            .translate_inclusive(&root);

        self.attach(&root);

        self.state = EngineState::Active;
        self.activations += 1;
        self.last_error = None;
        self.totals.merge(&stats);

        tracing::info!(
            "翻译已应用: {} 个匹配器, {} 处替换, {} 个提示更新",
            matchers.len(),
            stats.replacements,
            stats.titles_updated
        );
        Ok(Some(stats))
    }

    /// 取出观察者积累的记录并处理
    pub fn deliver_mutations(&mut self) -> Option<BatchOutcome> {
        let records = self.observer.take_records();
        if records.is_empty() {
            return None;
        }
        Some(self.on_mutations(&records))
    }

    /// 处理一批变更记录
    pub fn on_mutations(&mut self, records: &[MutationRecord]) -> BatchOutcome {
        let Some(matchers) = self.matchers.clone() else {
            return BatchOutcome::Ignored;
        };
        if self.state != EngineState::Active {
            return BatchOutcome::Ignored;
        }

        let now = self.clock.now();
        let walker = TreeWalker::new(matchers.matchers(), &self.config);
        let outcome = self.coordinator.on_batch(records, now, &walker);
        if let BatchOutcome::Incremental(stats) = &outcome {
            self.totals.merge(stats);
        }
        outcome
    }

    /// 悬停事件
    pub fn on_pointer_over(&mut self, target: &Handle) -> bool {
        let Some(matchers) = self.matchers.clone() else {
            return false;
        };
        let walker = TreeWalker::new(matchers.matchers(), &self.config);
        self.hook.on_pointer_over(target, &walker)
    }

    /// 执行所有已到期的工作
    pub fn poll(&mut self) {
        let now = self.clock.now();

        if self.activation.fire_if_due(now) && self.is_enabled_state() {
            tracing::debug!("激活防抖到期");
            let _ = self.apply_translations();
        }

        self.deliver_mutations();

        if let Some(matchers) = self.matchers.clone() {
            let root = self.translation_root();
            let walker = TreeWalker::new(matchers.matchers(), &self.config);
            if let Some(stats) = self.coordinator.poll(now, &root, &walker) {
                self.totals.merge(&stats);
            }
        }
    }

    /// 最近的定时器截止时间
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.activation.deadline(), self.coordinator.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// 推进时钟直到没有待处理的定时器和变更
    pub fn run_until_idle(&mut self) {
        loop {
            self.poll();

            if self.observer.pending() > 0 {
                continue;
            }

            match self.next_deadline() {
                Some(deadline) => self.clock.wait_until(deadline),
                None => break,
            }
        }
    }

    /// 断开观察者、移除钩子并取消定时器
    pub fn teardown(&mut self) {
        self.observer.disconnect();
        self.hook.detach();
        self.activation.cancel();
        self.coordinator.cancel();
        self.state = EngineState::TornDown;
        tracing::info!("翻译引擎已停止");
    }

    fn read_flag(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        match self.flag_store.is_enabled() {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::error!("读取启用开关失败: {}", e);
                false
            }
        }
    }

    fn is_enabled_state(&self) -> bool {
        matches!(
            self.state,
            EngineState::Pending | EngineState::Active | EngineState::Failed
        )
    }

    fn schedule_activation(&mut self) {
        let now = self.clock.now();
        if self.activation.arm(now) {
            tracing::debug!("激活防抖重新计时");
        }
    }

    /// 完整遍历的根：body，缺失时退回整个文档
    fn translation_root(&self) -> Handle {
        find_body(&self.document).unwrap_or_else(|| self.document.clone())
    }

    fn attach(&mut self, root: &Handle) {
        if !self.observer.is_connected() {
            self.observer.observe(root, ObserverInit::child_list_subtree());
            self.mutator.register(&self.observer);
            tracing::debug!("变更观察已启动");
        }

        if self.hook.attach(root) {
            tracing::debug!("悬停钩子已挂载");
        }
    }
}
