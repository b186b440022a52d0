//! 替换引擎
//!
//! 按编译顺序依次应用匹配器，前一个匹配器的输出就是后一个的输入。
//! 替换文本按字面插入，同一轮内不会被更早的匹配器重新扫描。

use std::borrow::Cow;

use crate::translation::compiler::CompiledMatcher;

/// 单次遍历的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationStats {
    pub nodes_visited: usize,
    pub text_nodes: usize,
    pub elements_skipped: usize,
    /// 实际调用匹配器的次数
    pub attempts: usize,
    /// 被长度预过滤跳过的匹配器次数
    pub prefiltered: usize,
    pub replacements: usize,
    pub chars_processed: usize,
    pub titles_updated: usize,
    pub errors: usize,
}

impl TranslationStats {
    /// 合并另一次遍历的统计
    pub fn merge(&mut self, other: &TranslationStats) {
        self.nodes_visited += other.nodes_visited;
        self.text_nodes += other.text_nodes;
        self.elements_skipped += other.elements_skipped;
        self.attempts += other.attempts;
        self.prefiltered += other.prefiltered;
        self.replacements += other.replacements;
        self.chars_processed += other.chars_processed;
        self.titles_updated += other.titles_updated;
        self.errors += other.errors;
    }
}

/// 替换结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution<'t> {
    text: Cow<'t, str>,
    replacements: usize,
}

impl<'t> Substitution<'t> {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }

    /// 文本是否发生变化
    ///
    /// 替换结果与原文相同（例如替换文本等于匹配原文）时不算变化。
    pub fn changed(&self) -> bool {
        matches!(self.text, Cow::Owned(_))
    }

    pub fn into_text(self) -> Cow<'t, str> {
        self.text
    }

    /// `(新文本, 是否变化)`
    pub fn into_parts(self) -> (String, bool) {
        let changed = self.changed();
        (self.text.into_owned(), changed)
    }
}

/// 对文本应用全部匹配器
pub fn apply<'t>(text: &'t str, matchers: &[CompiledMatcher]) -> Substitution<'t> {
    let mut stats = TranslationStats::default();
    apply_with_stats(text, matchers, &mut stats)
}

/// 对文本应用全部匹配器，并累计统计
pub fn apply_with_stats<'t>(
    text: &'t str,
    matchers: &[CompiledMatcher],
    stats: &mut TranslationStats,
) -> Substitution<'t> {
    let mut current: Cow<'t, str> = Cow::Borrowed(text);
    let mut current_chars = text.chars().count();
    let mut replacements = 0;

    stats.chars_processed += current_chars;

    for matcher in matchers {
        if matcher.min_chars() > current_chars {
            stats.prefiltered += 1;
            continue;
        }

        stats.attempts += 1;
        let (next, count) = matcher.replace(&current);
        if count == 0 {
            continue;
        }

        let next = next.into_owned();
        tracing::trace!("匹配器 {:?} 命中 {} 次", matcher.source(), count);
        current_chars = next.chars().count();
        current = Cow::Owned(next);
        replacements += count;
    }

    stats.replacements += replacements;

    // 替换后与原文一致时视为未变化，避免无意义的写回
    if let Cow::Owned(ref owned) = current {
        if owned == text {
            current = Cow::Borrowed(text);
        }
    }

    Substitution {
        text: current,
        replacements,
    }
}
