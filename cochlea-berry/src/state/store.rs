//! 分析文档的读写.

use super::PieceState;
use crate::error::{AnnotError, AnnotResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// 指定分析文档目录的环境变量.
pub const ANALYSIS_DIR_ENV: &str = "COCHLEA_ANALYSIS_DIR";

/// 一个片段的完整分析文档.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisDoc {
    /// 曲线模型与 tile 放置位置.
    pub data: PieceState,

    /// 展示层的设置. 本 crate 不解释其内容, 只负责原样保存.
    #[serde(default)]
    pub view: serde_json::Value,
}

/// 分析文档所在目录. 每个片段对应其中的一个 JSON 文件.
#[derive(Clone, Debug)]
pub struct AnalysisStore {
    root: PathBuf,
}

impl AnalysisStore {
    /// 以 `root` 为目录.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// 1. 若环境变量 `$COCHLEA_ANALYSIS_DIR` 非空, 则以其值为目录;
    /// 2. 否则, 以 `$HOME/cochleogram` 为目录.
    ///
    /// 无法确定用户主目录时返回 `None`.
    pub fn from_env_or_home() -> Option<Self> {
        match env::var(ANALYSIS_DIR_ENV) {
            Ok(d) if !d.is_empty() => Some(Self::new(d)),
            _ => {
                let mut root = dirs::home_dir()?;
                root.push("cochleogram");
                Some(Self::new(root))
            }
        }
    }

    /// 文档目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 片段 `piece` 的文档路径 `{root}/piece_{piece}.json`.
    #[inline]
    pub fn state_path(&self, piece: &str) -> PathBuf {
        self.root.join(format!("piece_{piece}.json"))
    }

    /// 读取片段 `piece` 的文档.
    ///
    /// 文件不存在时返回 `NoSavedAnalysis`, 无法解析时返回 `CorruptAnalysis`.
    pub fn load(&self, piece: &str) -> AnnotResult<AnalysisDoc> {
        let path = self.state_path(piece);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AnnotError::NoSavedAnalysis(path));
            }
            Err(e) => return Err(e.into()),
        };
        let doc = serde_json::from_str(&text)
            .map_err(|e| AnnotError::CorruptAnalysis(format!("{}: {e}", path.display())))?;
        log::debug!("已读取 {}", path.display());
        Ok(doc)
    }

    /// 以 4 空格缩进的 JSON 保存片段 `piece` 的文档, 必要时创建目录. 返回文档路径.
    pub fn save(&self, piece: &str, doc: &AnalysisDoc) -> AnnotResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.state_path(piece);

        let mut buf = Vec::with_capacity(1024);
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        doc.serialize(&mut ser)
            .map_err(|e| AnnotError::CorruptAnalysis(e.to_string()))?;
        fs::write(&path, buf)?;

        log::info!("分析已保存到 {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisDoc, AnalysisStore};
    use crate::consts::label::CellLabel;
    use crate::error::AnnotError;
    use crate::state::{PieceState, PointsState, TileState};
    use std::path::PathBuf;

    fn temp_root(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("cochlea-berry-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&p);
        p
    }

    fn demo_doc() -> AnalysisDoc {
        let mut data = PieceState::default();
        data.tiles.insert(
            "t0".to_owned(),
            TileState {
                extent: vec![0.0, 1e-4, 0.0, 2e-4],
            },
        );
        data.spirals.insert(
            CellLabel::Ihc,
            PointsState {
                x: vec![1e-5, 2e-5],
                y: vec![3e-5, 4e-5],
                start_index: 1,
                exclusions: Some(vec![]),
            },
        );
        data.cells.insert(CellLabel::Ihc, PointsState::default());
        AnalysisDoc {
            data,
            view: serde_json::json!({"artists": {"t0": {"alpha": 0.75, "z_slice": 3}}}),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = AnalysisStore::new(temp_root("round-trip"));
        let doc = demo_doc();
        let path = store.save("3", &doc).unwrap();
        assert!(path.ends_with("piece_3.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"data\""));

        let back = store.load("3").unwrap();
        assert_eq!(back, doc);
        // 原样重新保存, 文本完全一致.
        store.save("3", &back).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
        std::fs::remove_dir_all(store.root()).unwrap();
    }

    #[test]
    fn test_load_missing() {
        let store = AnalysisStore::new(temp_root("missing"));
        assert!(matches!(
            store.load("1"),
            Err(AnnotError::NoSavedAnalysis(_))
        ));
    }

    #[test]
    fn test_load_corrupt() {
        let store = AnalysisStore::new(temp_root("corrupt"));
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.state_path("2"), "{\"data\": [1, 2").unwrap();
        assert!(matches!(
            store.load("2"),
            Err(AnnotError::CorruptAnalysis(_))
        ));
        std::fs::remove_dir_all(store.root()).unwrap();
    }
}
