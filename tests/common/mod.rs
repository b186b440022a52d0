// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use markup5ever_rcdom::{Handle, RcDom};
use tempfile::TempDir;

use d4t::html::{find_body, find_nodes, html_to_dom, serialize_document, text_content};
use d4t::translation::{
    CompiledMatcher, Dictionary, EngineConfig, FlagStore, ManualClock, PatternCompiler,
    TranslationEngine,
};

/// 测试环境：临时资源目录、解析好的文档和用逻辑时钟驱动的引擎
pub struct TestEnvironment {
    pub dir: TempDir,
    pub dom: RcDom,
    pub clock: ManualClock,
    pub engine: TranslationEngine,
}

impl TestEnvironment {
    pub fn new(dictionary: &str, html: &str) -> Self {
        Self::with_config(dictionary, html, |_| {})
    }

    /// 在默认配置上调整后创建环境
    pub fn with_config(
        dictionary: &str,
        html: &str,
        configure: impl FnOnce(&mut EngineConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        DictionaryHelper::write(dir.path(), dictionary);

        let mut config = EngineConfig {
            resource_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        configure(&mut config);

        let dom = HtmlTestHelper::create_test_dom(html);
        let clock = ManualClock::new();
        let engine = TranslationEngine::new(config, dom.document.clone())
            .with_clock(Rc::new(clock.clone()));

        Self {
            dir,
            dom,
            clock,
            engine,
        }
    }

    pub fn with_flag_store(mut self, store: Rc<dyn FlagStore>) -> Self {
        self.engine = self.engine.with_flag_store(store);
        self
    }

    pub fn body(&self) -> Handle {
        HtmlTestHelper::body(&self.dom)
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.dir.path().join("translations.json")
    }
}

/// HTML测试工具
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    /// 创建测试用的DOM结构
    pub fn create_test_dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").unwrap()
    }

    pub fn body(dom: &RcDom) -> Handle {
        find_body(&dom.document).unwrap()
    }

    /// 按路径取第一个节点
    pub fn first(dom: &RcDom, path: &[&str]) -> Handle {
        find_nodes(&dom.document, path).remove(0)
    }

    /// 节点内部的 HTML
    pub fn inner_html(node: &Handle) -> String {
        String::from_utf8(serialize_document(node, "utf-8").unwrap()).unwrap()
    }

    pub fn text(node: &Handle) -> String {
        text_content(node)
    }

    /// 带脚本、样式和提示属性的游戏页面
    pub fn create_game_page() -> String {
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Inventory</title>
    <meta charset="UTF-8">
</head>
<body>
    <h1 title="Your iron sword">Inventory</h1>
    <p id="slot">An iron sword and a shield.</p>
    <script>var sword = "iron sword";</script>
    <style>.sword { color: red; }</style>
    <div id="log"></div>
</body>
</html>"#
            .to_string()
    }
}

/// 词典测试工具
pub struct DictionaryHelper;

impl DictionaryHelper {
    /// 写入 `dir/translations.json`
    pub fn write(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("translations.json");
        fs::write(&path, json).unwrap();
        path
    }

    /// 与游戏页面配套的词典，包含嵌套模式
    pub fn game_dictionary() -> &'static str {
        r#"{
    "sword": "剣",
    "iron sword": "鉄の剣",
    "shield": "盾",
    "iron": "鉄",
    "Inventory": "持ち物"
}"#
    }

    pub fn matchers(entries: &[(&str, &str)]) -> Vec<CompiledMatcher> {
        PatternCompiler::default()
            .compile(&Dictionary::from_entries(entries.iter().copied()))
            .matchers()
            .to_vec()
    }
}

/// 断言辅助工具
pub struct AssertionHelper;

impl AssertionHelper {
    pub fn assert_text(node: &Handle, expected: &str, context: &str) {
        let actual = text_content(node);
        assert_eq!(actual.trim(), expected, "{}: unexpected text content", context);
    }

    pub fn assert_contains(haystack: &str, needle: &str, context: &str) {
        assert!(
            haystack.contains(needle),
            "{}: expected {:?} in {:?}",
            context,
            needle,
            haystack
        );
    }

    pub fn assert_not_contains(haystack: &str, needle: &str, context: &str) {
        assert!(
            !haystack.contains(needle),
            "{}: did not expect {:?} in {:?}",
            context,
            needle,
            haystack
        );
    }
}
