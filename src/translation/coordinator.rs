//! 变更协调器
//!
//! 两个稳定状态：空闲与防抖待触发。每批变更记录做一次判断：
//!
//! - 记录数超过批量阈值：取消旧定时器并重新计时，到期后对整个文档做一次完整遍历
//! - 否则增量处理：逐个翻译新增节点，并单独检查新增节点自身的提示属性
//!
//! 协调器不向外传播任何错误，单个节点的失败只体现在统计里。

use std::time::Duration;

use markup5ever_rcdom::Handle;

use crate::parsers::html::mutation::MutationRecord;
use crate::parsers::html::walker::TreeWalker;
use crate::translation::config::EngineConfig;
use crate::translation::scheduler::DebounceTimer;
use crate::translation::substitution::TranslationStats;

/// 协调器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    DebounceArmed { deadline: Duration },
}

/// 单批记录的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 批内没有需要处理的新增节点
    Ignored,
    /// 批量变更，完整遍历推迟到定时器到期
    Deferred { rearmed: bool },
    /// 已增量处理
    Incremental(TranslationStats),
}

/// 协调器生命周期统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub batches: usize,
    pub bulk_batches: usize,
    pub incremental_nodes: usize,
    pub full_passes: usize,
    pub timer_rearms: usize,
    pub ignored_batches: usize,
}

/// 变更协调器
#[derive(Debug)]
pub struct MutationCoordinator {
    bulk_threshold: usize,
    timer: DebounceTimer,
    stats: CoordinatorStats,
}

impl MutationCoordinator {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_settings(config.bulk_threshold, config.mutation_debounce())
    }

    pub fn with_settings(bulk_threshold: usize, debounce: Duration) -> Self {
        Self {
            bulk_threshold,
            timer: DebounceTimer::new(debounce),
            stats: CoordinatorStats::default(),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        match self.timer.deadline() {
            Some(deadline) => CoordinatorState::DebounceArmed { deadline },
            None => CoordinatorState::Idle,
        }
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    pub fn bulk_threshold(&self) -> usize {
        self.bulk_threshold
    }

    /// 下一次需要 [`poll`](Self::poll) 的时间
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timer.deadline()
    }

    /// 处理一批变更记录
    pub fn on_batch(
        &mut self,
        records: &[MutationRecord],
        now: Duration,
        walker: &TreeWalker<'_>,
    ) -> BatchOutcome {
        self.stats.batches += 1;

        if records.len() > self.bulk_threshold {
            self.stats.bulk_batches += 1;
            let rearmed = self.timer.arm(now);
            if rearmed {
                self.stats.timer_rearms += 1;
            }
            tracing::debug!(
                "批量变更 ({} 条记录)，完整遍历推迟到 {:?}",
                records.len(),
                self.timer.deadline()
            );
            return BatchOutcome::Deferred { rearmed };
        }

        let mut stats = TranslationStats::default();
        let mut nodes = 0;

        for record in records {
            for node in record.added_nodes() {
                if walker.is_within_skipped(node) {
                    continue;
                }

                nodes += 1;
                stats.merge(&walker.translate_inclusive(node));
            }
        }

        if nodes == 0 {
            self.stats.ignored_batches += 1;
            return BatchOutcome::Ignored;
        }

        self.stats.incremental_nodes += nodes;
        tracing::trace!("增量处理 {} 个新增节点", nodes);
        BatchOutcome::Incremental(stats)
    }

    /// 定时器到期时执行完整遍历
    pub fn poll(
        &mut self,
        now: Duration,
        root: &Handle,
        walker: &TreeWalker<'_>,
    ) -> Option<TranslationStats> {
        if !self.timer.fire_if_due(now) {
            return None;
        }

        self.stats.full_passes += 1;
        tracing::debug!("防抖到期，执行完整遍历");
        Some(walker.translate_inclusive(root))
    }

    /// 取消待触发的完整遍历
    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }
}
