//! 分析文档的 `data` 部分: 片段中所有曲线模型与 tile 放置位置的快照.
//!
//! 快照只是持久化用的显式副本, 会话打开期间真正的数据源始终是 `Piece`.
//! 插值路径不被保存, 加载时由节点、起点下标和排除区间端点重建.

use crate::consts::label::CellLabel;
use crate::curve::Points;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

#[cfg(feature = "serde")]
mod store;

#[cfg(feature = "serde")]
pub use store::{AnalysisDoc, AnalysisStore};

/// 一个排除区间的两个端点 `[[x, y], [x, y]]`.
pub type ExclusionState = [[f64; 2]; 2];

/// 单个曲线模型的快照.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointsState {
    /// 节点 x 坐标 (集合顺序).
    #[cfg_attr(feature = "serde", serde(deserialize_with = "nullable_floats"))]
    pub x: Vec<f64>,

    /// 节点 y 坐标 (集合顺序).
    #[cfg_attr(feature = "serde", serde(deserialize_with = "nullable_floats"))]
    pub y: Vec<f64>,

    /// 贪心排序的起点下标. 旧文档中名为 `i`.
    #[cfg_attr(feature = "serde", serde(default, alias = "i"))]
    pub start_index: usize,

    /// 排除区间. 只有螺旋曲线才有; 旧文档中名为 `exclude`.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            alias = "exclude",
            skip_serializing_if = "Option::is_none",
            deserialize_with = "nullable_exclusions"
        )
    )]
    pub exclusions: Option<Vec<ExclusionState>>,
}

impl PointsState {
    /// 螺旋曲线快照 (带排除区间).
    pub fn spiral(points: &Points) -> Self {
        let exclusions = points
            .exclusions()
            .iter()
            .map(|&((sx, sy), (ex, ey))| [[sx, sy], [ex, ey]])
            .collect();
        Self {
            exclusions: Some(exclusions),
            ..Self::cells(points)
        }
    }

    /// 细胞快照 (不带排除区间).
    pub fn cells(points: &Points) -> Self {
        Self {
            x: points.x().to_vec(),
            y: points.y().to_vec(),
            start_index: points.start_index(),
            exclusions: None,
        }
    }

    /// 由快照重建曲线模型. 非有限坐标被丢弃, 排除区间重新吸附到路径上.
    pub fn to_points(&self) -> Points {
        let mut ans = Points::from_nodes(&self.x, &self.y, self.start_index);
        if let Some(v) = &self.exclusions {
            ans.set_exclusions(
                v.iter()
                    .map(|&[[sx, sy], [ex, ey]]| ((sx, sy), (ex, ey)))
                    .collect(),
            );
        }
        ans.take_updated();
        ans
    }
}

/// 单个 tile 的快照.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TileState {
    /// `[xmin, xmax, ymin, ymax]` 或 `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub extent: Vec<f64>,
}

/// 片段的完整 `data` 快照.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PieceState {
    /// tile 标识 -> tile 快照.
    pub tiles: BTreeMap<String, TileState>,

    /// 结构标签 -> 螺旋曲线快照.
    pub spirals: BTreeMap<CellLabel, PointsState>,

    /// 结构标签 -> 细胞快照.
    pub cells: BTreeMap<CellLabel, PointsState>,
}

/// 其它工具会把非有限浮点数写成 `null`. 读取时把它还原为 NaN, 交由曲线模型过滤.
#[cfg(feature = "serde")]
fn nullable_floats<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    let v: Vec<Option<f64>> = Deserialize::deserialize(d)?;
    Ok(v.into_iter().map(|e| e.unwrap_or(f64::NAN)).collect())
}

#[cfg(feature = "serde")]
fn nullable_exclusions<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Vec<ExclusionState>>, D::Error> {
    let v: Option<Vec<[[Option<f64>; 2]; 2]>> = Deserialize::deserialize(d)?;
    let nan = |e: Option<f64>| e.unwrap_or(f64::NAN);
    Ok(v.map(|v| {
        v.into_iter()
            .map(|[[sx, sy], [ex, ey]]| [[nan(sx), nan(sy)], [nan(ex), nan(ey)]])
            .collect()
    }))
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::{PieceState, PointsState};
    use crate::consts::label::CellLabel;
    use crate::curve::Points;

    fn line() -> Points {
        Points::from_nodes(&[0.0, 3e-5, 6e-5, 1e-4], &[0.0; 4], 0)
    }

    #[test]
    fn test_legacy_keys_and_nulls() {
        let s = r#"{"x": [0.0, null, 2.0], "y": [0.0, 1.0, 2.0], "i": 1, "exclude": []}"#;
        let st: PointsState = serde_json::from_str(s).unwrap();
        assert_eq!(st.start_index, 1);
        assert_eq!(st.exclusions, Some(vec![]));
        let p = st.to_points();
        assert_eq!(p.x(), &[0.0, 2.0]);
        assert_eq!(p.y(), &[0.0, 2.0]);
    }

    #[test]
    fn test_cells_have_no_exclusions() {
        let st = PointsState::cells(&line());
        let s = serde_json::to_string(&st).unwrap();
        assert!(!s.contains("exclusions"));
        assert!(s.contains("start_index"));
        let back: PointsState = serde_json::from_str(&s).unwrap();
        assert_eq!(back, st);
    }

    #[test]
    fn test_spiral_round_trip() {
        let mut p = line();
        p.add_exclusion((1e-5, 0.0), (4e-5, 1e-6)).unwrap();
        let st = PointsState::spiral(&p);
        let s = serde_json::to_string(&st).unwrap();
        let back: PointsState = serde_json::from_str(&s).unwrap();
        assert_eq!(back, st);
        // 重建后再取快照, 结果完全一致.
        let rebuilt = back.to_points();
        assert_eq!(PointsState::spiral(&rebuilt), st);
        assert_eq!(rebuilt.exclusion_regions(), p.exclusion_regions());
    }

    #[test]
    fn test_label_keys() {
        let mut st = PieceState::default();
        st.spirals.insert(CellLabel::Ihc, PointsState::default());
        st.cells.insert(CellLabel::Ohc3, PointsState::default());
        let s = serde_json::to_string(&st).unwrap();
        assert!(s.contains(r#""IHC""#) && s.contains(r#""OHC3""#));
        let back: PieceState = serde_json::from_str(&s).unwrap();
        assert_eq!(back, st);
    }
}
