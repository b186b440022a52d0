//! 引擎生命周期集成测试
//!
//! 激活防抖、启用开关、加载失败与手动重试、悬停刷新

use std::fs;
use std::rc::Rc;
use std::time::Duration;

use d4t::html::{create_element_node, get_node_attr};
use d4t::translation::{
    Clock, EngineState, FlagStore, JsonFileFlagStore, LifecycleEvent, LoadError, ReadyState,
    RuntimeMessage,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{AssertionHelper, DictionaryHelper, HtmlTestHelper, TestEnvironment};

const SWORD_PAGE: &str = "<html><head></head><body><p>A sword</p></body></html>";

#[test]
fn test_lifecycle_events_collapse_into_one_activation() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);

    assert!(env.engine.boot(ReadyState::Loading));
    assert_eq!(env.engine.next_deadline(), None);

    env.engine.on_lifecycle(LifecycleEvent::DomContentLoaded);
    env.clock.advance(Duration::from_millis(300));
    env.engine.on_lifecycle(LifecycleEvent::Load);

    env.clock.advance(Duration::from_millis(250));
    env.engine.poll();
    assert_eq!(env.engine.activations(), 0);
    assert_eq!(env.engine.state(), EngineState::Pending);

    env.engine.run_until_idle();
    assert_eq!(env.engine.activations(), 1);
    assert_eq!(env.clock.now(), Duration::from_millis(800));
    assert_eq!(env.engine.state(), EngineState::Active);
    AssertionHelper::assert_text(&env.body(), "A 剣", "body after activation");
}

#[test]
fn test_parsed_document_activates_after_delay() {
    let mut env = TestEnvironment::with_config(r#"{"sword": "剣"}"#, SWORD_PAGE, |config| {
        config.activation_delay_ms = 20;
    });

    env.engine.boot(ReadyState::Complete);
    assert_eq!(env.engine.next_deadline(), Some(Duration::from_millis(20)));

    env.engine.run_until_idle();
    assert_eq!(env.engine.activations(), 1);
    assert!(env.engine.is_observing());
    assert!(env.engine.hook().is_attached());
}

#[test]
fn test_disabled_flag_keeps_engine_inert() {
    let env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    let store = Rc::new(JsonFileFlagStore::new(env.dir.path().join("flags.json")));
    store.set_enabled(false).unwrap();

    let mut env = env.with_flag_store(store.clone());
    let engine = &mut env.engine;

    assert!(!engine.boot(ReadyState::Complete));
    engine.on_lifecycle(LifecycleEvent::Load);
    env.clock.advance(Duration::from_secs(10));
    engine.run_until_idle();

    assert_eq!(engine.state(), EngineState::Inert);
    assert!(!engine.is_observing());
    assert!(engine.matchers().is_none());
    assert!(!engine.on_message(&RuntimeMessage::convert()));
    AssertionHelper::assert_text(&HtmlTestHelper::body(&env.dom), "A sword", "inert body");

    store.set_enabled(true).unwrap();
    assert!(engine.on_message(&RuntimeMessage::convert()));
    assert_eq!(engine.state(), EngineState::Active);
    AssertionHelper::assert_text(&HtmlTestHelper::body(&env.dom), "A 剣", "body after toggle");
}

#[test]
fn test_missing_store_file_means_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileFlagStore::new(dir.path().join("nested").join("flags.json"));
    assert!(store.is_enabled().unwrap());

    store.set_enabled(false).unwrap();
    assert!(!store.is_enabled().unwrap());
}

#[test]
fn test_load_failure_then_manual_retry() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    fs::remove_file(env.dictionary_path()).unwrap();

    env.engine.boot(ReadyState::Complete);
    env.engine.run_until_idle();

    assert_eq!(env.engine.state(), EngineState::Failed);
    assert!(matches!(env.engine.last_error(), Some(LoadError::Io { .. })));
    assert!(!env.engine.is_observing());
    AssertionHelper::assert_text(&env.body(), "A sword", "body after failed load");

    DictionaryHelper::write(env.dir.path(), r#"{"sword": "剣"}"#);
    let message = RuntimeMessage::from_json(r#"{"action": "convert"}"#).unwrap();
    assert!(env.engine.on_message(&message));

    assert_eq!(env.engine.state(), EngineState::Active);
    assert!(env.engine.last_error().is_none());
    assert!(env.engine.is_observing());
    AssertionHelper::assert_text(&env.body(), "A 剣", "body after retry");
}

#[test]
fn test_malformed_dictionary_is_never_partially_applied() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣", "shield": 3}"#, SWORD_PAGE);

    env.engine.boot(ReadyState::Complete);
    env.engine.run_until_idle();

    assert_eq!(env.engine.state(), EngineState::Failed);
    assert!(matches!(env.engine.last_error(), Some(LoadError::Parse { .. })));
    assert!(env.engine.matchers().is_none());
    AssertionHelper::assert_text(&env.body(), "A sword", "body after parse failure");
}

#[test]
fn test_failed_reload_keeps_active_matchers() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    env.engine.boot(ReadyState::Complete);
    env.engine.run_until_idle();
    let before = env.engine.matchers().unwrap();

    fs::write(env.dictionary_path(), "not json").unwrap();
    assert!(env.engine.apply_translations().is_err());

    assert_eq!(env.engine.state(), EngineState::Active);
    assert!(Rc::ptr_eq(&before, &env.engine.matchers().unwrap()));
}

#[test]
fn test_manual_trigger_rebuilds_matchers_and_attaches_once() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    env.engine.boot(ReadyState::Complete);
    env.engine.run_until_idle();
    let first = env.engine.matchers().unwrap();

    DictionaryHelper::write(env.dir.path(), r#"{"A": "一"}"#);
    assert!(env.engine.on_message(&RuntimeMessage::convert()));
    assert!(!env.engine.on_message(&RuntimeMessage::from_json(r#"{"action": "noop"}"#).unwrap()));

    let second = env.engine.matchers().unwrap();
    assert!(!Rc::ptr_eq(&first, &second));
    assert_eq!(env.engine.activations(), 2);
    assert_eq!(env.engine.mutator().observer_count(), 1);
    AssertionHelper::assert_text(&env.body(), "一 剣", "body after reload");
}

#[test]
fn test_hover_translates_fresh_title() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    env.engine.boot(ReadyState::Complete);
    env.engine.run_until_idle();

    let paragraph = HtmlTestHelper::first(&env.dom, &["body", "p"]);
    env.engine
        .mutator()
        .set_attribute(&paragraph, "title", "Sharp sword");
    env.engine.run_until_idle();
    assert_eq!(
        get_node_attr(&paragraph, "title").as_deref(),
        Some("Sharp sword")
    );

    assert!(env.engine.on_pointer_over(&paragraph));
    assert_eq!(get_node_attr(&paragraph, "title").as_deref(), Some("Sharp 剣"));
    assert!(!env.engine.on_pointer_over(&paragraph));
    assert_eq!(env.engine.hook().refreshed(), 1);
}

#[test]
fn test_hover_outside_body_is_ignored() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    env.engine.boot(ReadyState::Complete);
    env.engine.run_until_idle();

    let detached = create_element_node(&env.dom, "span", &[("title", "sword")]);
    assert!(!env.engine.on_pointer_over(&detached));
    assert_eq!(get_node_attr(&detached, "title").as_deref(), Some("sword"));
    assert_eq!(env.engine.hook().events(), 0);
}

#[test]
fn test_teardown_cancels_pending_activation() {
    let mut env = TestEnvironment::new(r#"{"sword": "剣"}"#, SWORD_PAGE);
    env.engine.boot(ReadyState::Complete);
    env.engine.teardown();
    env.engine.run_until_idle();

    assert_eq!(env.engine.state(), EngineState::TornDown);
    assert_eq!(env.engine.activations(), 0);
    assert_eq!(env.clock.now(), Duration::ZERO);
}
