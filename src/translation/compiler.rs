//! 模式编译器
//!
//! 把词典编译为有序的匹配器列表：
//!
//! 1. 按模式长度（字符数）降序稳定排序，等长模式保持词典中的原始顺序
//! 2. 逐字符转义，直撇号 `'` 与右单引号 `’` 互相匹配
//! 3. 大小写不敏感；默认要求模式两侧不紧邻单词字符
//! 4. 记录模式长度，供替换时做长度预过滤
//!
//! 单条模式编译失败只跳过该条目。

use std::borrow::Cow;
use std::cmp::Reverse;

use regex::{Regex, RegexBuilder};

use crate::translation::config::{constants, EngineConfig, MatchPolicy};
use crate::translation::dictionary::Dictionary;
use crate::translation::error::CompileError;

/// 编译后的匹配器
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    source: String,
    replacement: String,
    regex: Regex,
    min_chars: usize,
}

impl CompiledMatcher {
    /// 原始模式
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// 任何匹配至少包含的字符数
    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// 替换所有匹配，返回新文本与替换次数
    ///
    /// 替换文本按字面插入，不做 `$name` 展开。
    pub fn replace<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let mut output = String::new();
        let mut last = 0;
        let mut count = 0;

        for m in self.regex.find_iter(text) {
            output.push_str(&text[last..m.start()]);
            output.push_str(&self.replacement);
            last = m.end();
            count += 1;
        }

        if count == 0 {
            return (Cow::Borrowed(text), 0);
        }

        output.push_str(&text[last..]);
        (Cow::Owned(output), count)
    }
}

/// 编译结果：按优先级排列的匹配器，以及被跳过的条目
#[derive(Debug, Default)]
pub struct MatcherSet {
    matchers: Vec<CompiledMatcher>,
    failures: Vec<(String, CompileError)>,
}

impl MatcherSet {
    pub fn matchers(&self) -> &[CompiledMatcher] {
        &self.matchers
    }

    pub fn failures(&self) -> &[(String, CompileError)] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompiledMatcher> {
        self.matchers.iter()
    }
}

impl<'a> IntoIterator for &'a MatcherSet {
    type Item = &'a CompiledMatcher;
    type IntoIter = std::slice::Iter<'a, CompiledMatcher>;

    fn into_iter(self) -> Self::IntoIter {
        self.matchers.iter()
    }
}

/// 模式编译器
#[derive(Debug, Clone)]
pub struct PatternCompiler {
    policy: MatchPolicy,
    size_limit: usize,
}

impl PatternCompiler {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            size_limit: constants::DEFAULT_REGEX_SIZE_LIMIT,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.match_policy).with_size_limit(config.regex_size_limit)
    }

    /// 单个正则编译后的大小上限
    pub fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// 编译整个词典
    pub fn compile(&self, dictionary: &Dictionary) -> MatcherSet {
        let mut entries: Vec<(&str, &str)> = dictionary.iter().collect();
        // sort_by_key 是稳定排序，等长模式保持词典顺序
        entries.sort_by_key(|(pattern, _)| Reverse(pattern.chars().count()));

        let mut set = MatcherSet::default();
        for (pattern, replacement) in entries {
            match self.compile_entry(pattern, replacement) {
                Ok(matcher) => set.matchers.push(matcher),
                Err(e) => {
                    tracing::warn!("跳过无法编译的模式 {:?}: {}", pattern, e);
                    set.failures.push((pattern.to_string(), e));
                }
            }
        }

        tracing::debug!(
            "模式编译完成: {} 个匹配器, {} 个失败",
            set.matchers.len(),
            set.failures.len()
        );
        set
    }

    /// 编译单个条目
    pub fn compile_entry(
        &self,
        pattern: &str,
        replacement: &str,
    ) -> Result<CompiledMatcher, CompileError> {
        if pattern.is_empty() {
            return Err(CompileError::EmptyPattern);
        }

        let escaped = escape_pattern(pattern);
        let anchored = match self.policy {
            MatchPolicy::WordBoundary => format!(r"\b{{start-half}}{}\b{{end-half}}", escaped),
            MatchPolicy::Substring => escaped,
        };

        let regex = RegexBuilder::new(&anchored)
            .case_insensitive(true)
            .size_limit(self.size_limit)
            .build()
            .map_err(|source| CompileError::Regex {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(CompiledMatcher {
            source: pattern.to_string(),
            replacement: replacement.to_string(),
            regex,
            min_chars: pattern.chars().count(),
        })
    }
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

/// 转义模式中的正则特殊字符，撇号展开为两种引号的字符类
pub fn escape_pattern(pattern: &str) -> String {
    let quote_class: String = {
        let mut class = String::from("[");
        for quote in constants::APOSTROPHES {
            class.push(*quote);
        }
        class.push(']');
        class
    };

    let mut escaped = String::with_capacity(pattern.len() * 2);
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        if constants::APOSTROPHES.contains(&c) {
            escaped.push_str(&quote_class);
        } else {
            escaped.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
    escaped
}
