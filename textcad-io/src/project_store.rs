use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use textcad_core::store::{MemoryValue, ProjectStore, StoreError};
use tracing::debug;

type Projects = BTreeMap<String, BTreeMap<String, MemoryValue>>;

/// 以单个 JSON 文件保存所有项目的默认值：`{ project: { key: value } }`。
///
/// 每次写入都会完整读取并重写文件，同一项目同时只能有一个写入者。
#[derive(Debug, Clone)]
pub struct JsonProjectStore {
    path: PathBuf,
}

impl JsonProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<Projects, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Projects::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        if data.trim().is_empty() {
            return Ok(Projects::new());
        }
        serde_json::from_str(&data).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            source: Box::new(err),
        })
    }

    fn write_all(&self, projects: &Projects) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let data = serde_json::to_string_pretty(projects).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            source: Box::new(err),
        })?;
        fs::write(&self.path, data).map_err(|err| self.io_error(err))
    }
}

impl ProjectStore for JsonProjectStore {
    fn load(&self, project_id: &str) -> Result<HashMap<String, MemoryValue>, StoreError> {
        let mut projects = self.read_all()?;
        let values = projects.remove(project_id).unwrap_or_default();
        debug!(path = %self.path.display(), project = project_id, keys = values.len(), "读取项目存储");
        Ok(values.into_iter().collect())
    }

    fn set(&mut self, project_id: &str, key: &str, value: &MemoryValue) -> Result<(), StoreError> {
        let mut projects = self.read_all()?;
        projects
            .entry(project_id.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        self.write_all(&projects)?;
        debug!(project = project_id, key, value = %value, "项目默认值已保存");
        Ok(())
    }

    fn delete(&mut self, project_id: &str, key: &str) -> Result<(), StoreError> {
        let mut projects = self.read_all()?;
        let Some(values) = projects.get_mut(project_id) else {
            return Ok(());
        };
        if values.remove(key).is_none() {
            return Ok(());
        }
        if values.is_empty() {
            projects.remove(project_id);
        }
        self.write_all(&projects)
    }
}
