//! 启用开关存储
//!
//! 引擎启动时只读取一次 `enabled`。安装后默认启用，因此文件不存在或缺少该键
//! 都视为 `true`。

use std::cell::Cell;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::translation::error::StoreError;

/// 开关存储
pub trait FlagStore {
    fn is_enabled(&self) -> Result<bool, StoreError>;

    fn set_enabled(&self, enabled: bool) -> Result<(), StoreError>;
}

/// 内存中的开关，用于测试与嵌入
#[derive(Debug, Clone)]
pub struct MemoryFlagStore {
    enabled: Cell<bool>,
}

impl MemoryFlagStore {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Cell::new(enabled),
        }
    }
}

impl Default for MemoryFlagStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FlagStore for MemoryFlagStore {
    fn is_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.enabled.get())
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.enabled.set(enabled);
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
struct StoredFlags {
    #[serde(default = "default_enabled")]
    enabled: bool,
    /// 其他键原样保留
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

impl Default for StoredFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            other: serde_json::Map::new(),
        }
    }
}

/// JSON 文件中的开关
#[derive(Debug, Clone)]
pub struct JsonFileFlagStore {
    path: PathBuf,
}

impl JsonFileFlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredFlags, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("开关文件不存在，使用默认值: {}", self.path.display());
                return Ok(StoredFlags::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl FlagStore for JsonFileFlagStore {
    fn is_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.enabled)
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let mut flags = self.read()?;
        flags.enabled = enabled;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = serde_json::to_string_pretty(&flags).map_err(|source| StoreError::Parse {
            path: self.path.display().to_string(),
            source,
        })?;
        std::fs::write(&self.path, content).map_err(io_error)?;

        tracing::info!("开关已更新: enabled = {}", enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_means_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileFlagStore::new(dir.path().join("flags.json"));
        assert!(store.is_enabled().unwrap());
    }

    #[test]
    fn test_set_enabled_persists_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("flags.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"enabled": true, "theme": "dark"}"#).unwrap();

        let store = JsonFileFlagStore::new(&path);
        store.set_enabled(false).unwrap();

        assert!(!JsonFileFlagStore::new(&path).is_enabled().unwrap());
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileFlagStore::new(&path);
        assert!(matches!(store.is_enabled(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryFlagStore::default();
        assert!(store.is_enabled().unwrap());
        store.set_enabled(false).unwrap();
        assert!(!store.is_enabled().unwrap());
    }
}
