//! 词典与词典加载器
//!
//! 词典是 `模式 -> 替换文本` 的有序映射，来自一个 JSON 对象。
//! 条目顺序即文件中的首次出现顺序，编译器用它作为等长模式的排序依据。

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::translation::config::constants;
use crate::translation::error::LoadError;

/// 有序词典
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<(String, String)>,
    duplicates: Vec<String>,
}

impl Dictionary {
    /// 从条目列表构建，重复键保留首次位置与最后的值
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut dictionary = Dictionary::default();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (key, value) in entries {
            dictionary.insert(&mut positions, key.into(), value.into());
        }

        dictionary
    }

    fn insert(&mut self, positions: &mut HashMap<String, usize>, key: String, value: String) {
        match positions.get(&key) {
            Some(&index) => {
                tracing::warn!("词典中存在重复键: {:?}", key);
                self.entries[index].1 = value;
                self.duplicates.push(key);
            }
            None => {
                positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// 解析 JSON 文本
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 解析 JSON 字节
    pub fn from_json_slice(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按插入顺序遍历条目
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 加载时发现的重复键
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// 按匹配优先级排序的副本：长度降序，等长时按字典序
    pub fn sorted_for_matching(&self) -> Dictionary {
        let mut entries = self.entries.clone();
        entries.sort_by(|(a, _), (b, _)| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        Dictionary {
            entries,
            duplicates: Vec::new(),
        }
    }

    /// 序列化为 4 空格缩进的 JSON，保留非 ASCII 字符
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;

        // serde_json 只输出合法 UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// 检查词典中无法生效或可疑的条目
    pub fn lint(&self) -> Vec<DictionaryIssue> {
        let mut issues = Vec::new();

        for (key, value) in &self.entries {
            if key.is_empty() {
                issues.push(DictionaryIssue::EmptyKey);
                continue;
            }
            if key.contains('\n') || key.contains('\r') {
                issues.push(DictionaryIssue::MultilineKey(key.clone()));
            }
            if constants::FORMAT_TAG_MARKERS
                .iter()
                .any(|marker| key.contains(marker))
            {
                issues.push(DictionaryIssue::FormatTag(key.clone()));
            }
            if key.chars().count() >= constants::MAX_USABLE_KEY_CHARS {
                issues.push(DictionaryIssue::OverlongKey(key.clone()));
            }
            let special = key
                .chars()
                .filter(|c| constants::REGEX_SPECIAL_CHARS.contains(c))
                .count();
            if special > constants::MAX_REGEX_SPECIAL_CHARS {
                issues.push(DictionaryIssue::SpecialCharHeavy(key.clone()));
            }
            if value.trim().is_empty() {
                issues.push(DictionaryIssue::EmptyValue(key.clone()));
            }
        }

        for key in &self.duplicates {
            issues.push(DictionaryIssue::DuplicateKey(key.clone()));
        }

        issues
    }
}

/// 词典检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictionaryIssue {
    EmptyKey,
    EmptyValue(String),
    /// 文本节点不会跨行匹配，这类键永远不会生效
    MultilineKey(String),
    /// 含有 `{c_...}`、`{icon:...}` 等格式标记
    FormatTag(String),
    OverlongKey(String),
    /// 正则特殊字符过多
    SpecialCharHeavy(String),
    DuplicateKey(String),
}

impl fmt::Display for DictionaryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryIssue::EmptyKey => write!(f, "空键"),
            DictionaryIssue::EmptyValue(key) => write!(f, "替换文本为空: {:?}", key),
            DictionaryIssue::MultilineKey(key) => write!(f, "键包含换行: {:?}", key),
            DictionaryIssue::FormatTag(key) => write!(f, "键包含格式标记: {:?}", key),
            DictionaryIssue::SpecialCharHeavy(key) => write!(f, "键包含过多特殊字符: {:?}", key),
            DictionaryIssue::OverlongKey(key) => {
                write!(f, "键过长 ({} 字符): {:?}", key.chars().count(), key)
            }
            DictionaryIssue::DuplicateKey(key) => write!(f, "重复键: {:?}", key),
        }
    }
}

impl<'de> Deserialize<'de> for Dictionary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DictionaryVisitor;

        impl<'de> Visitor<'de> for DictionaryVisitor {
            type Value = Dictionary;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object mapping patterns to replacement strings")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut dictionary = Dictionary::default();
                let mut positions = HashMap::new();

                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    dictionary.insert(&mut positions, key, value);
                }

                Ok(dictionary)
            }
        }

        deserializer.deserialize_map(DictionaryVisitor)
    }
}

impl Serialize for Dictionary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// 词典加载器
///
/// 资源标识可以是 `http(s)://` 地址、`file://` 地址或相对资源根目录的路径。
pub struct DictionaryLoader {
    resource_dir: PathBuf,
}

impl DictionaryLoader {
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
        }
    }

    /// 资源根目录
    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }

    /// 获取并解析词典
    pub fn load(&self, resource: &str) -> Result<Dictionary, LoadError> {
        tracing::debug!("加载词典: {}", resource);

        let body = self.fetch(resource)?;
        let dictionary = Dictionary::from_json_slice(&body).map_err(|source| LoadError::Parse {
            resource: resource.to_string(),
            source,
        })?;

        tracing::info!("词典已加载: {} 条 ({})", dictionary.len(), resource);
        Ok(dictionary)
    }

    fn fetch(&self, resource: &str) -> Result<Vec<u8>, LoadError> {
        if resource.starts_with("http://") || resource.starts_with("https://") {
            return fetch_remote(resource);
        }

        let path = self.resolve_path(resource);
        std::fs::read(&path).map_err(|source| LoadError::Io {
            resource: resource.to_string(),
            source,
        })
    }

    /// 解析本地资源路径
    pub fn resolve_path(&self, resource: &str) -> PathBuf {
        if let Ok(url) = url::Url::parse(resource) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return path;
                }
            }
        }

        let path = Path::new(resource);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.resource_dir.join(path)
        }
    }
}

impl Default for DictionaryLoader {
    fn default() -> Self {
        Self::new(constants::DEFAULT_RESOURCE_DIR)
    }
}

fn fetch_remote(resource: &str) -> Result<Vec<u8>, LoadError> {
    let transport = |e: reqwest::Error| LoadError::Transport {
        resource: resource.to_string(),
        message: e.to_string(),
    };

    let response = reqwest::blocking::get(resource).map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Status {
            resource: resource.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response.bytes().map_err(transport)?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_preserved() {
        let dictionary =
            Dictionary::from_json_str(r#"{"zeta": "Z", "alpha": "A", "mid": "M"}"#).unwrap();
        let keys: Vec<&str> = dictionary.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_keys_keep_first_position_and_last_value() {
        let dictionary =
            Dictionary::from_json_str(r#"{"a": "1", "b": "2", "a": "3"}"#).unwrap();

        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.iter().next(), Some(("a", "3")));
        assert_eq!(dictionary.duplicates(), &["a".to_string()]);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(Dictionary::from_json_str(r#"["a", "b"]"#).is_err());
        assert!(Dictionary::from_json_str(r#"{"a": 1}"#).is_err());
        assert!(Dictionary::from_json_str(r#"{"a": {"b": "c"}}"#).is_err());
    }

    #[test]
    fn test_sorted_for_matching() {
        let dictionary = Dictionary::from_entries([("b", "1"), ("abc", "2"), ("a", "3")]);
        let sorted = dictionary.sorted_for_matching();
        let keys: Vec<&str> = sorted.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["abc", "a", "b"]);
    }

    #[test]
    fn test_pretty_json_keeps_non_ascii() {
        let dictionary = Dictionary::from_entries([("Sword", "剣")]);
        let json = dictionary.to_pretty_json().unwrap();
        assert_eq!(json, "{\n    \"Sword\": \"剣\"\n}");
    }

    #[test]
    fn test_lint_reports_unusable_entries() {
        let long_key = "x".repeat(constants::MAX_USABLE_KEY_CHARS);
        let dictionary = Dictionary::from_entries([
            ("", "empty"),
            ("line\r\nbreak", "value"),
            ("blank", "  "),
            (long_key.as_str(), "long"),
            ("fine", "ok"),
        ]);

        let issues = dictionary.lint();
        assert_eq!(issues.len(), 4);
        assert!(issues.contains(&DictionaryIssue::EmptyKey));
        assert!(issues.contains(&DictionaryIssue::EmptyValue("blank".to_string())));
    }

    #[test]
    fn test_lint_reports_format_tags_and_special_chars() {
        let dictionary = Dictionary::from_entries([
            ("{c_red}Fire{/c}", "火"),
            ("Deals {VALUE1} damage", "ダメージ"),
            ("(a)|(b)|[c]{d}+*?", "記号"),
            ("a.b.c.d.e.f.g.h.i.j", "ten dots"),
            ("Sword (two-handed)", "両手剣"),
        ]);

        let issues = dictionary.lint();
        assert_eq!(
            issues,
            vec![
                DictionaryIssue::FormatTag("{c_red}Fire{/c}".to_string()),
                DictionaryIssue::FormatTag("Deals {VALUE1} damage".to_string()),
                DictionaryIssue::SpecialCharHeavy("(a)|(b)|[c]{d}+*?".to_string()),
            ]
        );
    }

    #[test]
    fn test_loader_reads_relative_to_resource_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("translations.json"), r#"{"Sword": "剣"}"#).unwrap();

        let loader = DictionaryLoader::new(dir.path());
        let dictionary = loader.load("translations.json").unwrap();
        assert_eq!(dictionary.get("Sword"), Some("剣"));
    }

    #[test]
    fn test_loader_reports_missing_and_malformed_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let loader = DictionaryLoader::new(dir.path());

        assert!(matches!(
            loader.load("missing.json"),
            Err(LoadError::Io { .. })
        ));
        assert!(matches!(
            loader.load("broken.json"),
            Err(LoadError::Parse { .. })
        ));
    }
}
