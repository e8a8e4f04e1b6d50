//! 外部协作者：几何输出（DXF）与项目默认值的 JSON 文件存储。

use std::path::{Path, PathBuf};

use textcad_core::bundle::DrawingBundle;
use thiserror::Error;

pub mod dxf;
pub mod project_store;

pub use dxf::DxfSink;
pub use project_store::JsonProjectStore;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("invalid destination {0:?}")]
    InvalidDestination(PathBuf),
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 接收图纸包并写到目标位置。
pub trait GeometrySink {
    fn write(&self, bundle: &DrawingBundle, path: &Path) -> Result<(), IoError>;
}
