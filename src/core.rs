use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use encoding_rs::Encoding;
use markup5ever_rcdom::RcDom;
use url::Url;

use crate::parsers::html::{get_charset, html_to_dom, serialize_document};
use crate::translation::config::EngineConfig;
use crate::translation::engine::{EngineState, LifecycleEvent, ReadyState, TranslationEngine};
use crate::translation::error::{TranslatorError, TranslatorResult};
use crate::translation::scheduler::ManualClock;
use crate::translation::store::{FlagStore, JsonFileFlagStore, MemoryFlagStore};
use crate::translation::substitution::TranslationStats;

const DEFAULT_USER_AGENT: &str = concat!("d4t/", env!("CARGO_PKG_VERSION"));

// All known non-"text/..." plaintext media types
const PLAINTEXT_MEDIA_TYPES: &[&str] = &[
    "application/xhtml+xml", // .xhtml
    "application/xml",       // .xml
];

/// 文档翻译选项
#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    pub config: EngineConfig,
    /// 覆盖文档声明的字符集
    pub encoding: Option<String>,
    /// 启用开关文件，未设置时视为启用
    pub flag_file: Option<String>,
    /// 请求超时（秒），0 表示不限
    pub timeout: u64,
    pub user_agent: Option<String>,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            encoding: None,
            flag_file: None,
            timeout: 60,
            user_agent: None,
        }
    }
}

/// 翻译后的文档
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub data: Vec<u8>,
    pub encoding: String,
    /// 引擎是否启用；关闭时 `data` 为原文档的重新序列化
    pub activated: bool,
    pub stats: TranslationStats,
}

/// 翻译内存中的 HTML 文档
///
/// 文档被当作已解析的静态页面：依次触发 `DOMContentLoaded` 与 `load`，
/// 用逻辑时钟推进到所有防抖定时器都执行完毕，然后序列化。
pub fn translate_document_from_data(
    options: &TranslatorOptions,
    input_data: &[u8],
    input_encoding: Option<&str>,
) -> TranslatorResult<TranslatedDocument> {
    let (dom, document_encoding) = parse_with_encoding(input_data, input_encoding)?;

    let flag_store: Rc<dyn FlagStore> = match &options.flag_file {
        Some(path) => Rc::new(JsonFileFlagStore::new(shellexpand::tilde(path).into_owned())),
        None => Rc::new(MemoryFlagStore::default()),
    };

    let mut engine = TranslationEngine::new(options.config.clone(), dom.document.clone())
        .with_clock(Rc::new(ManualClock::new()))
        .with_flag_store(flag_store);

    let activated = engine.boot(ReadyState::Loading);
    if activated {
        engine.on_lifecycle(LifecycleEvent::DomContentLoaded);
        engine.on_lifecycle(LifecycleEvent::Load);
        engine.run_until_idle();
    }

    if engine.state() == EngineState::Failed {
        if let Some(e) = engine.take_last_error() {
            return Err(e.into());
        }
    }

    let stats = engine.totals();
    engine.teardown();

    let data = serialize_document(&dom.document, &document_encoding)
        .map_err(|e| TranslatorError::Document(format!("序列化文档失败: {}", e)))?;

    Ok(TranslatedDocument {
        data,
        encoding: document_encoding,
        activated,
        stats,
    })
}

/// 翻译本地文件或远程页面
pub fn translate_document(
    options: &TranslatorOptions,
    target: &str,
) -> TranslatorResult<TranslatedDocument> {
    let (input_data, charset) = retrieve_document(options, target)?;
    let encoding = options.encoding.as_deref().or(charset.as_deref());
    translate_document_from_data(options, &input_data, encoding)
}

/// 获取文档字节以及响应头中声明的字符集
pub fn retrieve_document(
    options: &TranslatorOptions,
    target: &str,
) -> TranslatorResult<(Vec<u8>, Option<String>)> {
    if target.starts_with("http://") || target.starts_with("https://") {
        let url = Url::parse(target)
            .map_err(|e| TranslatorError::Document(format!("无效的URL {}: {}", target, e)))?;
        return fetch_remote_document(options, &url);
    }

    let path = match Url::parse(target) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| TranslatorError::Document(format!("无效的文件URL: {}", target)))?,
        _ => Path::new(target).to_path_buf(),
    };

    if !path.exists() {
        return Err(TranslatorError::Document(format!("文件不存在: {}", target)));
    }

    Ok((fs::read(&path)?, None))
}

fn fetch_remote_document(
    options: &TranslatorOptions,
    url: &Url,
) -> TranslatorResult<(Vec<u8>, Option<String>)> {
    let mut builder = reqwest::blocking::Client::builder();
    if options.timeout > 0 {
        builder = builder.timeout(Duration::from_secs(options.timeout));
    }
    let client = builder
        .build()
        .map_err(|e| TranslatorError::Document(format!("HTTP客户端初始化失败: {}", e)))?;

    let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let response = client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .map_err(|e| TranslatorError::Document(format!("获取页面失败: {}", e)))?;

    if !response.status().is_success() {
        return Err(TranslatorError::Document(format!(
            "获取页面失败: {} 返回 {}",
            url,
            response.status()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("text/html")
        .to_string();
    let (media_type, charset) = parse_content_type(&content_type);
    if !is_plaintext_media_type(&media_type) {
        return Err(TranslatorError::Document(format!(
            "不支持的媒体类型: {}",
            media_type
        )));
    }

    let data = response
        .bytes()
        .map_err(|e| TranslatorError::Document(format!("读取响应失败: {}", e)))?;

    let charset = Some(charset).filter(|c| !c.is_empty());
    Ok((data.to_vec(), charset))
}

/// 按声明的字符集解析文档
///
/// 文档 `<meta>` 中声明了可识别的字符集时，以该字符集重新解析。
fn parse_with_encoding(
    input_data: &[u8],
    input_encoding: Option<&str>,
) -> TranslatorResult<(RcDom, String)> {
    if let Some(encoding) = input_encoding {
        let dom = html_to_dom(input_data, encoding)?;
        return Ok((dom, encoding.to_string()));
    }

    let mut document_encoding = "utf-8".to_string();
    let mut dom = html_to_dom(input_data, &document_encoding)?;

    if let Some(html_charset) = get_charset(&dom.document) {
        if let Some(charset) = Encoding::for_label_no_replacement(html_charset.as_bytes()) {
            if charset != encoding_rs::UTF_8 {
                document_encoding = html_charset;
                dom = html_to_dom(input_data, charset.name())?;
            }
        }
    }

    Ok((dom, document_encoding))
}

/// Parses Content-Type header value into (media type, charset)
pub fn parse_content_type(content_type: &str) -> (String, String) {
    let mut parts = content_type.split(';');
    let media_type = parts.next().unwrap_or_default().trim().to_lowercase();

    let charset = parts
        .map(str::trim)
        .find_map(|part| part.strip_prefix("charset="))
        .map(|charset| charset.trim_matches('"').to_string())
        .unwrap_or_default();

    (media_type, charset)
}

/// Checks if the given media type represents plaintext content
pub fn is_plaintext_media_type(media_type: &str) -> bool {
    media_type.starts_with("text/") || PLAINTEXT_MEDIA_TYPES.contains(&media_type)
}
