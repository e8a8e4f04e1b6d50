//! 会话记忆。
//!
//! 两层数据：临时回答（可过期，被澄清引擎最多消费一次）与
//! “最近一次有效值”默认值（会话内不过期，可选写入项目存储）。
//! 每个会话/项目应持有独立实例，不支持多线程共享。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use textcad_core::store::{MemoryValue, ProjectStore};
use tracing::{debug, warn};

use crate::errors::MemoryError;

pub const DEFAULT_PROJECT_ID: &str = "default";

#[derive(Debug, Clone)]
struct Entry {
    value: MemoryValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

pub struct SessionMemory {
    ttl: Option<Duration>,
    project_id: String,
    store: Option<Box<dyn ProjectStore>>,
    data: HashMap<String, Entry>,
    defaults: HashMap<String, MemoryValue>,
}

impl SessionMemory {
    /// 不带持久化的会话。`ttl` 为 `None` 时回答永不过期。
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            project_id: DEFAULT_PROJECT_ID.to_string(),
            store: None,
            data: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    /// 从项目存储加载默认值，之后的默认值写入同步落盘。
    pub fn with_store(
        ttl: Option<Duration>,
        project_id: impl Into<String>,
        store: Box<dyn ProjectStore>,
    ) -> Result<Self, MemoryError> {
        let project_id = project_id.into();
        let defaults = store.load(&project_id)?;
        debug!(project = %project_id, defaults = defaults.len(), "加载项目默认值");
        Ok(Self {
            ttl,
            project_id,
            store: Some(store),
            data: HashMap::new(),
            defaults,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn set(&mut self, key: &str, value: impl Into<MemoryValue>) {
        let ttl = self.ttl;
        self.set_with_ttl(key, value, ttl);
    }

    pub fn set_with_ttl(&mut self, key: &str, value: impl Into<MemoryValue>, ttl: Option<Duration>) {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Instant::now() + ttl);
        self.data.insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at,
            },
        );
    }

    /// 读取临时值，没有时回退到默认值。
    ///
    /// 过期的键会被删除并返回 [`MemoryError::Expired`]，不影响其它键。
    pub fn get(&mut self, key: &str) -> Result<Option<MemoryValue>, MemoryError> {
        if let Some(entry) = self.data.get(key) {
            if entry.is_expired(Instant::now()) {
                self.data.remove(key);
                warn!(key, "会话值已过期");
                return Err(MemoryError::Expired {
                    key: key.to_string(),
                });
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(self.defaults.get(key).cloned())
    }

    /// 取出并移除临时值（不回退到默认值）。
    pub fn pop(&mut self, key: &str) -> Result<Option<MemoryValue>, MemoryError> {
        match self.data.remove(key) {
            Some(entry) if entry.is_expired(Instant::now()) => Err(MemoryError::Expired {
                key: key.to_string(),
            }),
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    pub fn delete(&mut self, key: &str) {
        self.data.remove(key);
    }

    /// 清空临时回答，默认值保留。
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn pending(&self) -> usize {
        self.data.len()
    }

    pub fn remember_default(&mut self, key: &str, value: MemoryValue) -> Result<(), MemoryError> {
        if let Some(store) = self.store.as_mut() {
            if self.defaults.get(key) != Some(&value) {
                store.set(&self.project_id, key, &value)?;
            }
        }
        self.defaults.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get_default(&self, key: &str) -> Option<&MemoryValue> {
        self.defaults.get(key)
    }

    pub fn forget_default(&mut self, key: &str) -> Result<(), MemoryError> {
        if let Some(store) = self.store.as_mut() {
            store.delete(&self.project_id, key)?;
        }
        self.defaults.remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for SessionMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMemory")
            .field("project_id", &self.project_id)
            .field("ttl", &self.ttl)
            .field("pending", &self.data.len())
            .field("defaults", &self.defaults.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use textcad_core::store::InMemoryProjectStore;

    #[test]
    fn expired_value_fails_once_without_touching_others() {
        let mut memory = SessionMemory::new(None);
        memory.set_with_ttl("short", 1_i64, Some(Duration::from_millis(50)));
        memory.set("long", 2_i64);

        sleep(Duration::from_millis(60));

        let err = memory.get("short").unwrap_err();
        assert!(matches!(err, MemoryError::Expired { ref key } if key == "short"));
        assert_eq!(err.code(), "E300");
        assert_eq!(memory.get("short").unwrap(), None);
        assert_eq!(memory.get("long").unwrap(), Some(MemoryValue::from(2_i64)));
    }

    #[test]
    fn pop_consumes_answer() {
        let mut memory = SessionMemory::new(Some(Duration::from_secs(600)));
        memory.set("answer.0.circle.radius", "5");
        assert_eq!(
            memory.pop("answer.0.circle.radius").unwrap(),
            Some(MemoryValue::from("5"))
        );
        assert_eq!(memory.pop("answer.0.circle.radius").unwrap(), None);
    }

    #[test]
    fn get_falls_back_to_defaults() {
        let mut memory = SessionMemory::new(None);
        memory
            .remember_default("rect.width", MemoryValue::from(20_i64))
            .unwrap();
        assert_eq!(
            memory.get("rect.width").unwrap(),
            Some(MemoryValue::from(20_i64))
        );
        memory.clear();
        assert!(memory.get_default("rect.width").is_some());
        memory.forget_default("rect.width").unwrap();
        assert_eq!(memory.get("rect.width").unwrap(), None);
    }

    #[test]
    fn defaults_round_trip_through_store() {
        let mut seed = InMemoryProjectStore::new();
        seed.set("demo", "circle.radius", &MemoryValue::from(7_i64))
            .unwrap();

        let mut memory = SessionMemory::with_store(None, "demo", Box::new(seed)).unwrap();
        assert_eq!(memory.project_id(), "demo");
        assert_eq!(
            memory.get_default("circle.radius"),
            Some(&MemoryValue::from(7_i64))
        );
        memory
            .remember_default("circle.center.x", MemoryValue::from(1_i64))
            .unwrap();
        assert_eq!(memory.get("circle.center.x").unwrap(), Some(MemoryValue::from(1_i64)));
    }

    #[test]
    fn zero_ttl_never_expires() {
        let mut memory = SessionMemory::new(Some(Duration::ZERO));
        memory.set("k", "v");
        sleep(Duration::from_millis(5));
        assert_eq!(memory.get("k").unwrap(), Some(MemoryValue::from("v")));
        memory.delete("k");
        assert_eq!(memory.pending(), 0);
    }
}
