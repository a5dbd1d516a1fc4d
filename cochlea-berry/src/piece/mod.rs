//! 片段: 覆盖同一段标本的一组 tile, 以及其上各结构的螺旋曲线和细胞标注.

use crate::config::DetectConfig;
use crate::consts::label::{CellLabel, ALL_LABELS};
use crate::consts::MERGED_CHANNELS;
use crate::curve::{Exclusion, Points};
use crate::error::{AnnotError, AnnotResult};
use crate::state::{PieceState, PointsState, TileState};
use crate::tile::{Extent, Tile};
use ndarray::{s, Array4};

mod detect;

pub use detect::{find_centroid, find_peaks};

/// 每个结构标签各一份曲线模型.
type LabelTable = [Points; ALL_LABELS.len()];

/// 一个片段.
#[derive(Debug, Clone)]
pub struct Piece {
    name: String,
    tiles: Vec<Tile>,
    spirals: LabelTable,
    cells: LabelTable,
    config: DetectConfig,

    /// 最近一次保存或加载时的快照.
    saved: Option<PieceState>,
}

impl Piece {
    /// 以默认检测参数构建片段. 见 [`Piece::with_config`].
    #[inline]
    pub fn new<S: Into<String>>(name: S, tiles: Vec<Tile>) -> AnnotResult<Self> {
        Self::with_config(name, tiles, DetectConfig::default())
    }

    /// 构建片段, 并在 z 方向对齐所有 tile.
    ///
    /// 以第一个 tile 的 z 体素尺寸为准求所有 tile 的 z 范围之并, 给每个 tile
    /// 上下补零切片, 使它们覆盖完全相同的 z 范围. `tiles` 不能为空.
    pub fn with_config<S: Into<String>>(
        name: S,
        mut tiles: Vec<Tile>,
        config: DetectConfig,
    ) -> AnnotResult<Self> {
        let Some(first) = tiles.first() else {
            return Err(AnnotError::InvalidParameter("片段至少需要一个 tile"));
        };
        let z_scale = first.voxel_size()[2];
        let (z_min, z_max) = tiles.iter().map(Tile::z_bounds).fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lb, ub), (zl, zu)| (lb.min(zl), ub.max(zu)),
        );
        let z_n = ((z_max - z_min) / z_scale - 1e-9).ceil().max(1.0) as usize;
        for t in tiles.iter_mut() {
            t.align_z(z_min, z_max, z_n);
        }

        let name = name.into();
        log::debug!(
            "片段 {name}: {} 个 tile, z 范围 [{z_min}, {z_max}], 共 {z_n} 层",
            tiles.len()
        );
        Ok(Self {
            name,
            tiles,
            spirals: Default::default(),
            cells: Default::default(),
            config,
            saved: None,
        })
    }

    /// 片段名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所有 tile.
    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// 所有 tile (可变). 展示层通过它覆盖 tile 的放置位置.
    #[inline]
    pub fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    /// 检测参数.
    #[inline]
    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// 结构 `label` 的螺旋曲线.
    #[inline]
    pub fn spiral(&self, label: CellLabel) -> &Points {
        &self.spirals[label.index()]
    }

    /// 结构 `label` 的螺旋曲线 (可变).
    #[inline]
    pub fn spiral_mut(&mut self, label: CellLabel) -> &mut Points {
        &mut self.spirals[label.index()]
    }

    /// 结构 `label` 的细胞标注.
    #[inline]
    pub fn cells(&self, label: CellLabel) -> &Points {
        &self.cells[label.index()]
    }

    /// 结构 `label` 的细胞标注 (可变).
    #[inline]
    pub fn cells_mut(&mut self, label: CellLabel) -> &mut Points {
        &mut self.cells[label.index()]
    }

    /// 所有 tile 放置位置在 xy 平面上的并 `[xmin, xmax, ymin, ymax]`.
    pub fn image_extent(&self) -> [f64; 4] {
        self.union_extent().xy()
    }

    fn union_extent(&self) -> Extent {
        let first = *self.tiles[0].extent();
        self.tiles
            .iter()
            .skip(1)
            .fold(first, |acc, t| acc.union(t.extent()))
    }

    /// 把所有 tile 合并成一个 3 通道的复合 tile.
    ///
    /// 复合 tile 覆盖所有 tile 放置位置之并, 体素尺寸取第一个 tile 的.
    /// 每个 tile 按其放置位置的下界对齐到最近的体素; 重叠部分以后写入者为准.
    /// 多于 3 个的通道被丢弃.
    pub fn merge_tiles(&self) -> AnnotResult<Tile> {
        let union = self.union_extent();
        let lb = union.lower();
        let ub = union.upper();
        let voxel = self.tiles[0].voxel_size();

        let offsets: Vec<[usize; 3]> = self
            .tiles
            .iter()
            .map(|t| {
                let tl = t.extent().lower();
                [0, 1, 2].map(|a| ((tl[a] - lb[a]) / voxel[a]).round().max(0.0) as usize)
            })
            .collect();

        // 形状由包围盒决定, 并保证能容纳每个 tile.
        let mut shape =
            [0, 1, 2].map(|a| ((ub[a] - lb[a]) / voxel[a]).round().max(1.0) as usize);
        for (t, off) in self.tiles.iter().zip(offsets.iter()) {
            let (nx, ny, nz) = t.shape();
            for (a, n) in [nx, ny, nz].into_iter().enumerate() {
                shape[a] = shape[a].max(off[a] + n);
            }
        }

        let mut merged = Array4::<f32>::zeros((shape[0], shape[1], shape[2], MERGED_CHANNELS));
        for (t, off) in self.tiles.iter().zip(offsets.iter()) {
            let (nx, ny, nz) = t.shape();
            let c = t.channels().min(MERGED_CHANNELS);
            let [ox, oy, oz] = *off;
            merged
                .slice_mut(s![ox..ox + nx, oy..oy + ny, oz..oz + nz, ..c])
                .assign(&t.volume().slice(s![.., .., .., ..c]));
        }

        let names = self.tiles[0].channel_names().to_vec();
        let mut tile = Tile::new(self.name.clone(), lb, voxel, merged)?.with_channel_names(names);
        tile.set_extent(union);
        Ok(tile)
    }

    /// 清空结构 `label` 的细胞标注.
    #[inline]
    pub fn clear_cells(&mut self, label: CellLabel) {
        self.cells_mut(label).clear();
    }

    /// 清空结构 `label` 的螺旋曲线, 排除区间随之被移除.
    #[inline]
    pub fn clear_spiral(&mut self, label: CellLabel) {
        self.spiral_mut(label).clear();
    }

    /// 把 `from` 的螺旋曲线沿法向平移 `distance` 后作为 `to` 的螺旋曲线.
    pub fn clone_spiral(&mut self, from: CellLabel, to: CellLabel, distance: f64) -> AnnotResult<()> {
        if !distance.is_finite() {
            return Err(AnnotError::InvalidParameter("平移距离必须是有限值"));
        }
        let (x, y) = self.spiral(from).expand_nodes(distance);
        if x.is_empty() {
            return Err(AnnotError::MissingSpiral);
        }
        let target = self.spiral_mut(to);
        target.set_nodes(&x, &y);
        target.set_start_index(0);
        Ok(())
    }

    /// 把 `from` 的所有排除区间重新吸附到 `to` 的螺旋曲线上并追加. 返回实际追加的个数.
    pub fn copy_exclusions(&mut self, from: CellLabel, to: CellLabel) -> AnnotResult<usize> {
        let exclusions: Vec<Exclusion> = self.spiral(from).exclusions().to_vec();
        let target = self.spiral_mut(to);
        if !target.has_path() {
            return Err(AnnotError::MissingSpiral);
        }
        let mut n = 0;
        for (s, e) in exclusions {
            if target.add_exclusion(s, e)? {
                n += 1;
            }
        }
        Ok(n)
    }

    /// 把 `labels` 中所有螺旋曲线的排除区间之并装到每条曲线上, 再各自合并重叠区间.
    ///
    /// 任何一条曲线没有路径时返回 `MissingSpiral`, 且不做任何修改.
    pub fn merge_exclusions(&mut self, labels: &[CellLabel]) -> AnnotResult<()> {
        if labels.iter().any(|&l| !self.spiral(l).has_path()) {
            return Err(AnnotError::MissingSpiral);
        }
        let all: Vec<Exclusion> = labels
            .iter()
            .flat_map(|&l| self.spiral(l).exclusions().iter().copied())
            .collect();
        for &l in labels {
            let p = self.spiral_mut(l);
            p.set_exclusions(all.clone());
            p.simplify_exclusions();
        }
        Ok(())
    }

    /// 当前 `data` 快照.
    pub fn state(&self) -> PieceState {
        PieceState {
            tiles: self
                .tiles
                .iter()
                .map(|t| {
                    let extent = t.extent_state();
                    (t.id().to_owned(), TileState { extent })
                })
                .collect(),
            spirals: ALL_LABELS
                .iter()
                .map(|&l| (l, PointsState::spiral(self.spiral(l))))
                .collect(),
            cells: ALL_LABELS
                .iter()
                .map(|&l| (l, PointsState::cells(self.cells(l))))
                .collect(),
        }
    }

    /// 从快照恢复.
    ///
    /// 先校验整个快照 (每个结构标签、每个 tile 都必须存在且合法), 全部通过后才修改,
    /// 否则返回 `CorruptAnalysis` 且片段保持不变. 快照中多余的 tile 标识被忽略.
    pub fn set_state(&mut self, state: &PieceState) -> AnnotResult<()> {
        for l in ALL_LABELS {
            if !state.spirals.contains_key(&l) {
                return Err(AnnotError::CorruptAnalysis(format!("缺少 {l} 的螺旋曲线")));
            }
            if !state.cells.contains_key(&l) {
                return Err(AnnotError::CorruptAnalysis(format!("缺少 {l} 的细胞标注")));
            }
        }
        let mut extents = Vec::with_capacity(self.tiles.len());
        for t in self.tiles.iter() {
            let ts = state
                .tiles
                .get(t.id())
                .ok_or_else(|| AnnotError::CorruptAnalysis(format!("缺少 tile {}", t.id())))?;
            let e = Extent::from_slice(&ts.extent, t.z_bounds()).ok_or_else(|| {
                AnnotError::CorruptAnalysis(format!("tile {} 的放置位置不合法", t.id()))
            })?;
            extents.push((e, ts.extent.len() == 6));
        }
        for id in state.tiles.keys() {
            if self.tiles.iter().all(|t| t.id() != id) {
                log::warn!("片段 {}: 忽略未知的 tile {id}", self.name);
            }
        }

        for (t, (e, with_z)) in self.tiles.iter_mut().zip(extents) {
            t.restore_extent(e, with_z);
        }
        for l in ALL_LABELS {
            self.spirals[l.index()] = state.spirals[&l].to_points();
            self.cells[l.index()] = state.cells[&l].to_points();
        }
        Ok(())
    }

    /// 把当前状态记为已保存.
    #[inline]
    pub fn mark_saved(&mut self) {
        self.saved = Some(self.state());
    }

    /// 当前 `data` 是否与最近一次保存或加载时不同. 从未保存过时总是为真.
    pub fn has_unsaved_changes(&self) -> bool {
        match &self.saved {
            Some(s) => *s != self.state(),
            None => true,
        }
    }
}

#[cfg(feature = "serde")]
mod persist {
    use super::Piece;
    use crate::error::AnnotResult;
    use crate::state::{AnalysisDoc, AnalysisStore};
    use std::path::PathBuf;

    impl Piece {
        /// 从 `store` 加载本片段的分析, 返回展示层设置.
        pub fn load_from(&mut self, store: &AnalysisStore) -> AnnotResult<serde_json::Value> {
            let doc = store.load(&self.name)?;
            self.set_state(&doc.data)?;
            self.mark_saved();
            Ok(doc.view)
        }

        /// 把本片段的分析连同展示层设置 `view` 保存到 `store`, 返回文档路径.
        pub fn save_to(
            &mut self,
            store: &AnalysisStore,
            view: serde_json::Value,
        ) -> AnnotResult<PathBuf> {
            let doc = AnalysisDoc {
                data: self.state(),
                view,
            };
            let path = store.save(&self.name, &doc)?;
            self.saved = Some(doc.data);
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Piece;
    use crate::consts::label::{CellLabel, ALL_LABELS};
    use crate::error::AnnotError;
    use crate::tile::Tile;
    use ndarray::Array4;

    fn tile_z(id: &str, z_lower: f64, nz: usize) -> Tile {
        let v = Array4::from_elem((2, 2, nz, 1), 1.0f32);
        Tile::new(id, [0.0, 0.0, z_lower], [1.0; 3], v).unwrap()
    }

    #[test]
    fn test_z_alignment() {
        let p = Piece::new("1", vec![tile_z("a", 0.0, 10), tile_z("b", 5.0, 15)]).unwrap();
        for t in p.tiles() {
            assert_eq!(t.z_bounds(), (0.0, 20.0));
            assert_eq!(t.shape().2, 20);
        }
        let a = p.tiles()[0].volume();
        assert_eq!(a[(0, 0, 9, 0)], 1.0);
        assert_eq!(a[(0, 0, 10, 0)], 0.0);
        let b = p.tiles()[1].volume();
        assert_eq!(b[(0, 0, 4, 0)], 0.0);
        assert_eq!(b[(0, 0, 5, 0)], 1.0);
        assert_eq!(b[(0, 0, 19, 0)], 1.0);
    }

    #[test]
    fn test_empty_piece() {
        assert!(matches!(
            Piece::new("1", vec![]),
            Err(AnnotError::InvalidParameter(_))
        ));
    }

    fn tile_x(id: &str, x_lower: f64, base: f32) -> Tile {
        let v = Array4::from_shape_fn((4, 3, 2, 1), |(x, y, z, _)| {
            base + (x * 100 + y * 10 + z) as f32
        });
        Tile::new(id, [x_lower, 0.0, 0.0], [1.0; 3], v).unwrap()
    }

    #[test]
    fn test_merge_tiles() {
        let p = Piece::new("m", vec![tile_x("a", 0.0, 0.0), tile_x("b", 4.0, 1000.0)]).unwrap();
        let m = p.merge_tiles().unwrap();
        assert_eq!(m.volume().dim(), (8, 3, 2, 3));
        assert_eq!(m.extent().to_vec(), vec![0.0, 8.0, 0.0, 3.0, 0.0, 2.0]);
        assert_eq!(p.image_extent(), [0.0, 8.0, 0.0, 3.0]);

        let v = m.volume();
        for t in p.tiles() {
            let ox = t.extent().xmin as usize;
            for ((x, y, z, c), &e) in t.volume().indexed_iter() {
                assert_eq!(v[(ox + x, y, z, c)], e);
            }
        }
        // 多出的通道为空.
        assert!(v.slice(ndarray::s![.., .., .., 1..]).iter().all(|&e| e == 0.0));
    }

    /// 手动平移后, 合并以放置位置为准.
    #[test]
    fn test_merge_follows_extent() {
        let mut p = Piece::new("m", vec![tile_x("a", 0.0, 0.0), tile_x("b", 4.0, 1000.0)]).unwrap();
        p.tiles_mut()[1].move_by(crate::tile::Direction::Right, 0.4);
        let m = p.merge_tiles().unwrap();
        assert_eq!(m.volume().dim().0, 10);
        assert_eq!(m.volume()[(6, 0, 0, 0)], 1000.0);
        assert_eq!(m.volume()[(4, 0, 0, 0)], 0.0);
    }

    fn straight(p: &mut Piece, label: CellLabel, y: f64) {
        p.spiral_mut(label)
            .set_nodes(&[0.0, 1e-5, 2e-5, 3e-5], &[y; 4]);
    }

    #[test]
    fn test_clear() {
        let mut p = Piece::new("c", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        straight(&mut p, CellLabel::Ihc, 0.0);
        p.spiral_mut(CellLabel::Ihc)
            .add_exclusion((5e-6, 0.0), (1e-5, 0.0))
            .unwrap();
        p.cells_mut(CellLabel::Ihc).set_nodes(&[1.0], &[1.0]);

        p.clear_cells(CellLabel::Ihc);
        assert!(p.cells(CellLabel::Ihc).is_empty());
        assert_eq!(p.spiral(CellLabel::Ihc).exclusions().len(), 1);

        p.clear_spiral(CellLabel::Ihc);
        assert!(p.spiral(CellLabel::Ihc).is_empty());
        assert!(p.spiral(CellLabel::Ihc).exclusions().is_empty());
    }

    #[test]
    fn test_clone_spiral() {
        let mut p = Piece::new("c", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        assert!(matches!(
            p.clone_spiral(CellLabel::Ihc, CellLabel::Ohc1, 1e-6),
            Err(AnnotError::MissingSpiral)
        ));
        straight(&mut p, CellLabel::Ihc, 0.0);
        p.clone_spiral(CellLabel::Ihc, CellLabel::Ohc1, 2e-6).unwrap();
        let o = p.spiral(CellLabel::Ohc1);
        assert_eq!(o.len(), 4);
        assert!(o.y().iter().all(|&y| (y - 2e-6).abs() < 1e-12));
    }

    #[test]
    fn test_copy_and_merge_exclusions() {
        let mut p = Piece::new("c", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        straight(&mut p, CellLabel::Ihc, 0.0);
        p.spiral_mut(CellLabel::Ihc)
            .add_exclusion((0.0, 0.0), (1e-5, 0.0))
            .unwrap();
        assert!(matches!(
            p.copy_exclusions(CellLabel::Ihc, CellLabel::Ohc1),
            Err(AnnotError::MissingSpiral)
        ));

        straight(&mut p, CellLabel::Ohc1, 1e-6);
        assert_eq!(p.copy_exclusions(CellLabel::Ihc, CellLabel::Ohc1).unwrap(), 1);
        assert_eq!(p.spiral(CellLabel::Ohc1).exclusion_regions(), vec![(0, 333)]);

        p.spiral_mut(CellLabel::Ohc1)
            .add_exclusion((2e-5, 1e-6), (0.5e-5, 1e-6))
            .unwrap();
        p.merge_exclusions(&[CellLabel::Ihc, CellLabel::Ohc1]).unwrap();
        for l in [CellLabel::Ihc, CellLabel::Ohc1] {
            assert_eq!(p.spiral(l).exclusion_regions(), vec![(0, 667)]);
        }
        assert!(p.merge_exclusions(&[CellLabel::Ihc, CellLabel::Ohc2]).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let mut p = Piece::new("s", vec![tile_x("a", 0.0, 0.0), tile_x("b", 4.0, 0.0)]).unwrap();
        straight(&mut p, CellLabel::Ohc2, 1e-6);
        p.spiral_mut(CellLabel::Ohc2)
            .add_exclusion((3e-6, 0.0), (9e-6, 0.0))
            .unwrap();
        p.cells_mut(CellLabel::Ohc2).set_nodes(&[1e-6, 2e-6], &[1e-6, 1e-6]);
        p.tiles_mut()[1].move_by(crate::tile::Direction::Up, 1.0);
        assert!(p.has_unsaved_changes());
        let st = p.state();
        p.mark_saved();
        assert!(!p.has_unsaved_changes());

        let mut q = Piece::new("s", vec![tile_x("a", 0.0, 0.0), tile_x("b", 4.0, 0.0)]).unwrap();
        q.set_state(&st).unwrap();
        assert_eq!(q.state(), st);
        assert_eq!(q.tiles()[1].extent(), p.tiles()[1].extent());

        p.cells_mut(CellLabel::Ohc2).clear();
        assert!(p.has_unsaved_changes());
    }

    #[test]
    fn test_set_state_validates_first() {
        let mut p = Piece::new("s", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        straight(&mut p, CellLabel::Ihc, 0.0);
        let good = p.state();

        let mut q = Piece::new("s", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        let mut bad = good.clone();
        bad.cells.remove(&ALL_LABELS[4]);
        assert!(matches!(q.set_state(&bad), Err(AnnotError::CorruptAnalysis(_))));
        assert!(q.spiral(CellLabel::Ihc).is_empty());

        let mut bad = good.clone();
        bad.tiles.clear();
        assert!(q.set_state(&bad).is_err());

        let mut bad = good.clone();
        bad.tiles.get_mut("a").unwrap().extent = vec![0.0, 1.0];
        assert!(q.set_state(&bad).is_err());
        assert!(q.spiral(CellLabel::Ihc).is_empty());

        q.set_state(&good).unwrap();
        assert_eq!(q.spiral(CellLabel::Ihc).len(), 4);
    }

    /// 带 z 范围的放置位置加载后原样写回.
    #[cfg(feature = "serde")]
    #[test]
    fn test_extent_with_z_round_trip() {
        use crate::state::PieceState;

        let mut p = Piece::new("z", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        let mut st = p.state();
        st.tiles.get_mut("a").unwrap().extent = vec![1.0, 5.0, 0.0, 3.0, 0.0, 2.0];
        let text = serde_json::to_string(&st).unwrap();

        let loaded: PieceState = serde_json::from_str(&text).unwrap();
        p.set_state(&loaded).unwrap();
        assert!(p.tiles_mut()[0].take_updated());
        assert_eq!(serde_json::to_string(&p.state()).unwrap(), text);

        p.mark_saved();
        p.tiles_mut()[0].move_by(crate::tile::Direction::Up, 1.0);
        assert!(p.tiles_mut()[0].take_updated());
        assert_eq!(p.state().tiles["a"].extent.len(), 6);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_save_and_load() {
        use crate::state::AnalysisStore;

        let mut root = std::env::temp_dir();
        root.push(format!("cochlea-berry-{}-piece", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let store = AnalysisStore::new(&root);

        let mut p = Piece::new("7", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        assert!(matches!(
            p.load_from(&store),
            Err(AnnotError::NoSavedAnalysis(_))
        ));
        straight(&mut p, CellLabel::Ohc3, 2e-6);
        let view = serde_json::json!({"interaction_mode": "OHC3"});
        p.save_to(&store, view.clone()).unwrap();
        assert!(!p.has_unsaved_changes());

        let mut q = Piece::new("7", vec![tile_x("a", 0.0, 0.0)]).unwrap();
        assert_eq!(q.load_from(&store).unwrap(), view);
        assert_eq!(q.state(), p.state());
        assert!(!q.has_unsaved_changes());
        std::fs::remove_dir_all(&root).unwrap();
    }
}
