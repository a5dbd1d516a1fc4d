//! 多通道三维图像块 (tile) 及其物理坐标变换.
//!
//! 体数据索引模式为 `(x, y, z, channel)`. 物理坐标与索引之间的仿射变换为
//! `physical = index * voxel_size + origin`.

use crate::consts::MOVE_STEP_VOXELS;
use crate::error::{AnnotError, AnnotResult};
use crate::{Idx3d, Point3d};
use itertools::izip;
use ndarray::{s, Array2, Array4, ArrayView4, Axis};

mod kernel;
mod sample;
mod save;

pub use kernel::{convolve_same, sphere_kernel};
pub use save::ImgWriteVis;

type VecPair<T> = (Vec<T>, Vec<T>);

/// 坐标轴.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Dim {
    /// x 轴.
    X,
    /// y 轴.
    Y,
    /// z 轴 (相邻切片方向).
    Z,
}

impl Dim {
    #[inline]
    const fn index(self) -> usize {
        match self {
            Dim::X => 0,
            Dim::Y => 1,
            Dim::Z => 2,
        }
    }
}

/// 手动平移 tile 的方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    /// y 增大.
    Up,
    /// y 减小.
    Down,
    /// x 减小.
    Left,
    /// x 增大.
    Right,
}

/// 物理空间中的包围盒 `[xmin, xmax, ymin, ymax, zmin, zmax]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extent {
    #[allow(missing_docs)]
    pub xmin: f64,
    #[allow(missing_docs)]
    pub xmax: f64,
    #[allow(missing_docs)]
    pub ymin: f64,
    #[allow(missing_docs)]
    pub ymax: f64,
    #[allow(missing_docs)]
    pub zmin: f64,
    #[allow(missing_docs)]
    pub zmax: f64,
}

impl Extent {
    /// 由 4 个 (`xy`) 或 6 个 (`xyz`) 数值构建. 只有 4 个数值时 z 范围取 `z`.
    ///
    /// 数值个数不对或含非有限值时返回 `None`.
    pub fn from_slice(v: &[f64], z: (f64, f64)) -> Option<Self> {
        if !v.iter().all(|e| e.is_finite()) {
            return None;
        }
        match v {
            &[xmin, xmax, ymin, ymax] => Some(Self {
                xmin,
                xmax,
                ymin,
                ymax,
                zmin: z.0,
                zmax: z.1,
            }),
            &[xmin, xmax, ymin, ymax, zmin, zmax] => Some(Self {
                xmin,
                xmax,
                ymin,
                ymax,
                zmin,
                zmax,
            }),
            _ => None,
        }
    }

    /// 按 `[xmin, xmax, ymin, ymax, zmin, zmax]` 的顺序展开.
    #[inline]
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.xmin, self.xmax, self.ymin, self.ymax, self.zmin, self.zmax,
        ]
    }

    /// xy 平面上的包围盒 `[xmin, xmax, ymin, ymax]`.
    #[inline]
    pub fn xy(&self) -> [f64; 4] {
        [self.xmin, self.xmax, self.ymin, self.ymax]
    }

    /// 下界 `(xmin, ymin, zmin)`.
    #[inline]
    pub fn lower(&self) -> [f64; 3] {
        [self.xmin, self.ymin, self.zmin]
    }

    /// 上界 `(xmax, ymax, zmax)`.
    #[inline]
    pub fn upper(&self) -> [f64; 3] {
        [self.xmax, self.ymax, self.zmax]
    }

    /// 两个包围盒的并.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            xmin: self.xmin.min(other.xmin),
            xmax: self.xmax.max(other.xmax),
            ymin: self.ymin.min(other.ymin),
            ymax: self.ymax.max(other.ymax),
            zmin: self.zmin.min(other.zmin),
            zmax: self.zmax.max(other.zmax),
        }
    }

    /// `(x, y)` 是否落在 xy 包围盒内 (含边界).
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.xmin..=self.xmax).contains(&x) && (self.ymin..=self.ymax).contains(&y)
    }
}

/// 一个多通道三维图像块.
#[derive(Debug, Clone)]
pub struct Tile {
    id: String,

    /// shape: `(x, y, z, channel)`.
    volume: Array4<f32>,

    /// 索引 `(0, 0, 0)` 对应的物理坐标.
    origin: [f64; 3],

    voxel: [f64; 3],

    /// 展示层可以覆盖的放置位置. 初始时与 `origin`, `voxel` 及形状一致.
    extent: Extent,

    channel_names: Vec<String>,

    /// 放置位置是否连同 z 范围一起保存.
    extent_with_z: bool,

    /// 自上次 `take_updated` 以来放置位置或体数据是否发生过修改.
    updated: bool,
}

impl Tile {
    /// 由物理原点、体素尺寸和 `(x, y, z, channel)` 体数据构建 tile.
    ///
    /// 体素尺寸必须为正, 原点必须是有限值, 体数据各维度都不能为空.
    pub fn new<S: Into<String>>(
        id: S,
        origin: [f64; 3],
        voxel_size: [f64; 3],
        volume: Array4<f32>,
    ) -> AnnotResult<Self> {
        if !voxel_size.iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(AnnotError::InvalidParameter("体素尺寸必须为正"));
        }
        if !origin.iter().all(|v| v.is_finite()) {
            return Err(AnnotError::InvalidParameter("物理原点必须是有限值"));
        }
        if volume.shape().iter().any(|&n| n == 0) {
            return Err(AnnotError::InvalidParameter("体数据不能为空"));
        }

        let (nx, ny, nz, _) = volume.dim();
        let extent = Extent {
            xmin: origin[0],
            xmax: origin[0] + voxel_size[0] * nx as f64,
            ymin: origin[1],
            ymax: origin[1] + voxel_size[1] * ny as f64,
            zmin: origin[2],
            zmax: origin[2] + voxel_size[2] * nz as f64,
        };
        Ok(Self {
            id: id.into(),
            volume,
            origin,
            voxel: voxel_size,
            extent,
            channel_names: vec![],
            extent_with_z: false,
            updated: false,
        })
    }

    /// 设置通道名 (用于查找显示颜色). 多余的名字被忽略.
    pub fn with_channel_names<S: Into<String>, I: IntoIterator<Item = S>>(mut self, it: I) -> Self {
        self.channel_names = it.into_iter().map(Into::into).take(self.channels()).collect();
        self
    }

    /// tile 标识.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 通道名. 未设置时为空.
    #[inline]
    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// 体数据.
    #[inline]
    pub fn volume(&self) -> ArrayView4<f32> {
        self.volume.view()
    }

    /// 空间形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let (nx, ny, nz, _) = self.volume.dim();
        (nx, ny, nz)
    }

    /// 通道个数.
    #[inline]
    pub fn channels(&self) -> usize {
        self.volume.dim().3
    }

    /// 索引 `(0, 0, 0)` 对应的物理坐标.
    #[inline]
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// 体素尺寸.
    #[inline]
    pub fn voxel_size(&self) -> [f64; 3] {
        self.voxel
    }

    /// 当前放置位置.
    #[inline]
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// 覆盖放置位置. 体素尺寸保持不变.
    #[inline]
    pub fn set_extent(&mut self, extent: Extent) {
        if self.extent != extent {
            self.extent = extent;
            self.updated = true;
        }
    }

    /// 以快照中的放置位置覆盖, 并记住快照是否带 z 范围.
    pub(crate) fn restore_extent(&mut self, extent: Extent, with_z: bool) {
        self.set_extent(extent);
        self.extent_with_z = with_z;
    }

    /// 快照中的放置位置: `[xmin, xmax, ymin, ymax]`, 加载时带 z 范围则为 6 个数值.
    pub fn extent_state(&self) -> Vec<f64> {
        if self.extent_with_z {
            self.extent.to_vec()
        } else {
            self.extent.xy().to_vec()
        }
    }

    /// 自上次调用以来放置位置或体数据是否发生过修改, 并清除该标记.
    #[inline]
    pub fn take_updated(&mut self) -> bool {
        std::mem::take(&mut self.updated)
    }

    /// z 方向的物理范围.
    #[inline]
    pub fn z_bounds(&self) -> (f64, f64) {
        (self.extent.zmin, self.extent.zmax)
    }

    /// 索引 -> 物理坐标. 省略 `iz` 时以 tile 的 z 下界代替.
    #[inline]
    pub fn to_physical(&self, ix: f64, iy: f64, iz: Option<f64>) -> Point3d {
        let [ox, oy, oz] = self.origin;
        let [vx, vy, vz] = self.voxel;
        (ix * vx + ox, iy * vy + oy, iz.map_or(oz, |iz| iz * vz + oz))
    }

    /// 物理坐标 -> 索引. 省略 `z` 时以 tile 的 z 下界代替 (即 z 索引为 0).
    #[inline]
    pub fn to_index(&self, x: f64, y: f64, z: Option<f64>) -> Point3d {
        let [ox, oy, oz] = self.origin;
        let [vx, vy, vz] = self.voxel;
        (
            (x - ox) / vx,
            (y - oy) / vy,
            z.map_or(0.0, |z| (z - oz) / vz),
        )
    }

    /// 批量进行二维 `索引 -> 物理坐标` 变换.
    pub fn to_physical_many(&self, ix: &[f64], iy: &[f64]) -> VecPair<f64> {
        izip!(ix.iter(), iy.iter())
            .map(|(&i, &j)| {
                let (x, y, _) = self.to_physical(i, j, None);
                (x, y)
            })
            .unzip()
    }

    /// 批量进行二维 `物理坐标 -> 索引` 变换.
    pub fn to_index_many(&self, x: &[f64], y: &[f64]) -> VecPair<f64> {
        izip!(x.iter(), y.iter())
            .map(|(&px, &py)| {
                let (i, j, _) = self.to_index(px, py, None);
                (i, j)
            })
            .unzip()
    }

    /// 沿 `axis` 的物理长度 -> 索引长度.
    #[inline]
    pub fn to_index_delta(&self, v: f64, axis: Dim) -> f64 {
        v / self.voxel[axis.index()]
    }

    /// `(x, y)` 是否落在当前放置位置的 xy 包围盒内.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.extent.contains(x, y)
    }

    /// 手动平移放置位置. 单步平移量为 x 体素尺寸的若干倍, 再乘以 `step_scale`.
    pub fn move_by(&mut self, direction: Direction, step_scale: f64) {
        let step = self.voxel[0] * MOVE_STEP_VOXELS * step_scale;
        let e = &mut self.extent;
        match direction {
            Direction::Up => {
                e.ymin += step;
                e.ymax += step;
            }
            Direction::Down => {
                e.ymin -= step;
                e.ymax -= step;
            }
            Direction::Left => {
                e.xmin -= step;
                e.xmax -= step;
            }
            Direction::Right => {
                e.xmin += step;
                e.xmax += step;
            }
        }
        self.updated = true;
    }

    /// 取出第 `channel` 个通道的二维图像, 索引模式为 `(x, y)`.
    ///
    /// - 指定 `z_slice` 时返回该切片, 忽略 `project`.
    /// - 未指定 `z_slice` 且 `project` 为真时返回沿 z 的最大强度投影.
    /// - 两者都没有时返回 `AmbiguousSlice`.
    pub fn sample_channel(
        &self,
        channel: usize,
        z_slice: Option<usize>,
        project: bool,
    ) -> AnnotResult<Array2<f32>> {
        let (_, _, nz) = self.shape();
        if channel >= self.channels() {
            return Err(AnnotError::InvalidParameter("通道下标越界"));
        }
        let data = self.volume.index_axis(Axis(3), channel);
        match z_slice {
            Some(z) if z >= nz => Err(AnnotError::InvalidParameter("z 切片下标越界")),
            Some(z) => Ok(data.index_axis(Axis(2), z).to_owned()),
            None if project => Ok(data.fold_axis(Axis(2), f32::NEG_INFINITY, |&a, &b| a.max(b))),
            None => Err(AnnotError::AmbiguousSlice),
        }
    }

    /// 检测用的平滑核. 物理半径按 x 体素尺寸换算为像素半径.
    #[inline]
    pub fn detection_kernel(&self, radius: f64) -> AnnotResult<Array2<f32>> {
        sphere_kernel(radius, self.voxel[0])
    }

    /// 在 z 方向补零切片, 使 tile 覆盖 `[z_min, z_max]`, 共 `z_n` 个切片.
    ///
    /// 原数据放在第 `round((z_lower - z_min) / voxel_z)` 个切片起; 超出 `z_n` 的部分被截断.
    pub(crate) fn align_z(&mut self, z_min: f64, z_max: f64, z_n: usize) {
        let pad_bottom = ((self.origin[2] - z_min) / self.voxel[2]).round().max(0.0) as usize;
        let (nx, ny, nz, nc) = self.volume.dim();
        let mut volume = Array4::<f32>::zeros((nx, ny, z_n, nc));
        let end = (pad_bottom + nz).min(z_n);
        if pad_bottom < end {
            volume
                .slice_mut(s![.., .., pad_bottom..end, ..])
                .assign(&self.volume.slice(s![.., .., ..(end - pad_bottom), ..]));
        }
        log::debug!(
            "tile {}: z 方向下补 {pad_bottom} 层, 上补 {} 层",
            self.id,
            z_n.saturating_sub(pad_bottom + nz)
        );
        self.volume = volume;
        self.origin[2] = z_min;
        self.extent.zmin = z_min;
        self.extent.zmax = z_max;
        self.updated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{Dim, Direction, Extent, Tile};
    use crate::error::AnnotError;
    use ndarray::Array4;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn demo() -> Tile {
        let volume = Array4::from_shape_fn((4, 3, 2, 2), |(x, y, z, c)| {
            (x * 100 + y * 10 + z) as f32 + c as f32 * 0.5
        });
        Tile::new("demo", [1e-6, 2e-6, 0.0], [1e-6, 2e-6, 5e-6], volume).unwrap()
    }

    #[test]
    fn test_new_invalid() {
        let v = Array4::<f32>::zeros((2, 2, 2, 1));
        assert!(Tile::new("a", [0.0; 3], [0.0, 1.0, 1.0], v.clone()).is_err());
        assert!(Tile::new("a", [f64::NAN, 0.0, 0.0], [1.0; 3], v).is_err());
        let empty = Array4::<f32>::zeros((2, 0, 2, 1));
        assert!(Tile::new("a", [0.0; 3], [1.0; 3], empty).is_err());
    }

    #[test]
    fn test_extent_from_metadata() {
        let t = demo();
        let e = t.extent();
        assert!(f64_eq(e.xmin, 1e-6) && f64_eq(e.xmax, 5e-6));
        assert!(f64_eq(e.ymin, 2e-6) && f64_eq(e.ymax, 8e-6));
        assert!(f64_eq(e.zmin, 0.0) && f64_eq(e.zmax, 1e-5));
        assert_eq!(t.shape(), (4, 3, 2));
        assert_eq!(t.channels(), 2);
        assert!(t.contains(3e-6, 8e-6));
        assert!(!t.contains(0.0, 3e-6));
    }

    #[test]
    fn test_transform() {
        let t = demo();
        let (x, y, z) = t.to_physical(2.0, 1.5, Some(1.0));
        assert!(f64_eq(x, 3e-6) && f64_eq(y, 5e-6) && f64_eq(z, 5e-6));
        let (_, _, z) = t.to_physical(2.0, 1.5, None);
        assert!(f64_eq(z, 0.0));

        let (i, j, k) = t.to_index(x, y, Some(5e-6));
        assert!(f64_eq(i, 2.0) && f64_eq(j, 1.5) && f64_eq(k, 1.0));
        assert!(f64_eq(t.to_index(x, y, None).2, 0.0));

        let (xs, ys) = t.to_physical_many(&[0.0, 1.0], &[0.0, 1.0]);
        let (is, js) = t.to_index_many(&xs, &ys);
        assert!(f64_eq(is[1], 1.0) && f64_eq(js[1], 1.0));
        assert!(f64_eq(t.to_index_delta(4e-6, Dim::Y), 2.0));
    }

    #[test]
    fn test_sample_channel() {
        let t = demo();
        let proj = t.sample_channel(1, None, true).unwrap();
        assert_eq!(proj.dim(), (4, 3));
        assert_eq!(proj[(3, 2)], 321.5);
        let sli = t.sample_channel(0, Some(0), false).unwrap();
        assert_eq!(sli[(3, 2)], 320.0);
        assert!(matches!(
            t.sample_channel(0, None, false),
            Err(AnnotError::AmbiguousSlice)
        ));
        assert!(t.sample_channel(2, None, true).is_err());
        assert!(t.sample_channel(0, Some(2), true).is_err());
    }

    #[test]
    fn test_move_by() {
        let mut t = demo();
        t.move_by(Direction::Right, 1.0);
        t.move_by(Direction::Up, 2.0);
        let e = t.extent();
        assert!(f64_eq(e.xmin, 6e-6) && f64_eq(e.xmax, 10e-6));
        assert!(f64_eq(e.ymin, 12e-6) && f64_eq(e.ymax, 18e-6));
        // 平移不影响索引变换.
        assert!(f64_eq(t.to_physical(0.0, 0.0, None).0, 1e-6));
    }

    #[test]
    fn test_updated_flag() {
        let mut t = demo();
        assert!(!t.take_updated());
        t.move_by(Direction::Down, 1.0);
        assert!(t.take_updated());
        assert!(!t.take_updated());

        let e = *t.extent();
        t.set_extent(e);
        assert!(!t.take_updated());
        t.set_extent(Extent { xmin: 0.0, ..e });
        assert!(t.take_updated());

        t.align_z(0.0, 1e-5, 2);
        assert!(t.take_updated());
    }

    #[test]
    fn test_extent_state_arity() {
        let mut t = demo();
        assert_eq!(t.extent_state().len(), 4);
        let e = Extent::from_slice(&[1.0, 5.0, 0.0, 3.0, 0.0, 2.0], t.z_bounds()).unwrap();
        t.restore_extent(e, true);
        assert_eq!(t.extent_state(), vec![1.0, 5.0, 0.0, 3.0, 0.0, 2.0]);
    }

    #[test]
    fn test_extent_from_slice() {
        let e = Extent::from_slice(&[0.0, 1.0, 2.0, 3.0], (4.0, 5.0)).unwrap();
        assert_eq!(e.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(Extent::from_slice(&[0.0, 1.0, 2.0], (0.0, 0.0)).is_none());
        assert!(Extent::from_slice(&[0.0, 1.0, 2.0, f64::NAN], (0.0, 0.0)).is_none());
    }

    #[test]
    fn test_align_z() {
        let mut t = demo();
        t.align_z(-5e-6, 2e-5, 5);
        assert_eq!(t.shape(), (4, 3, 5));
        assert_eq!(t.z_bounds(), (-5e-6, 2e-5));
        let v = t.volume();
        assert_eq!(v[(3, 2, 0, 0)], 0.0);
        assert_eq!(v[(3, 2, 1, 0)], 320.0);
        assert_eq!(v[(3, 2, 2, 0)], 321.0);
        assert_eq!(v[(3, 2, 3, 0)], 0.0);
    }
}
