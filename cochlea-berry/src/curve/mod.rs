//! 曲线模型: 一组可编辑的二维标注节点, 及由其派生的平滑路径和排除区间.
//!
//! 节点在集合中的顺序没有意义. 路径顺序由贪心最近邻排序决定,
//! 平滑路径由参数三次样条按需插值得到. 持久化时只保存节点、起点下标和排除区间端点.

mod exclusion;
mod order;
mod path;

pub use exclusion::{merge_intervals, Exclusion};
pub use path::SampledPath;

use crate::consts::{
    ADD_HIT_RADIUS, DEFAULT_RESOLUTION, EXPAND_RESOLUTION, MIN_SPLINE_NODES, REMOVE_HIT_RADIUS,
};
use crate::error::{AnnotError, AnnotResult};
use crate::fitting::parametric_spline_f64;
use crate::Point2d;
use itertools::izip;
use ndarray::ArrayView1;
use once_cell::unsync::OnceCell;
use ordered_float::OrderedFloat;

type VecPair<T> = (Vec<T>, Vec<T>);

/// 曲线模型.
#[derive(Clone, Debug, Default)]
pub struct Points {
    x: Vec<f64>,
    y: Vec<f64>,

    /// 贪心排序的起点下标.
    start_index: usize,

    /// 端点均已吸附到当前路径上的排除区间.
    exclusions: Vec<Exclusion>,

    /// 自上次 `take_updated` 以来是否发生过修改.
    updated: bool,

    /// 默认分辨率下的插值路径, 节点变化时失效.
    cache: OnceCell<SampledPath>,
}

impl Points {
    /// 创建空的曲线模型.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 由节点坐标创建曲线模型. 含非有限值的点会被丢弃.
    pub fn from_nodes(x: &[f64], y: &[f64], start_index: usize) -> Self {
        let mut ans = Self {
            start_index,
            ..Self::default()
        };
        ans.set_nodes(x, y);
        ans.updated = false;
        ans
    }

    /// 节点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// 是否没有任何节点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// 节点 x 坐标 (集合顺序).
    #[inline]
    pub fn x(&self) -> &[f64] {
        self.x.as_slice()
    }

    /// 节点 y 坐标 (集合顺序).
    #[inline]
    pub fn y(&self) -> &[f64] {
        self.y.as_slice()
    }

    /// 所有节点 (集合顺序).
    pub fn nodes(&self) -> Vec<Point2d> {
        izip!(self.x.iter().copied(), self.y.iter().copied()).collect()
    }

    /// 贪心排序的起点下标.
    #[inline]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// 设置贪心排序的起点下标.
    pub fn set_start_index(&mut self, start_index: usize) {
        if self.start_index != start_index {
            self.start_index = start_index;
            self.invalidate();
            self.revalidate_exclusions();
        }
    }

    /// 当前的排除区间.
    #[inline]
    pub fn exclusions(&self) -> &[Exclusion] {
        self.exclusions.as_slice()
    }

    /// 自上次调用以来是否发生过修改, 并清除该标记.
    ///
    /// 展示层可以轮询它来决定是否需要重绘.
    #[inline]
    pub fn take_updated(&mut self) -> bool {
        std::mem::take(&mut self.updated)
    }

    /// 节点集合发生变化: 丢弃缓存的插值路径并标记修改.
    #[inline]
    fn invalidate(&mut self) {
        self.cache = OnceCell::new();
        self.updated = true;
    }

    /// 加入节点 `(x, y)`.
    ///
    /// 若已有节点与其距离小于判重半径, 则不做任何事.
    pub fn add_node(&mut self, x: f64, y: f64) -> AnnotResult<()> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(AnnotError::InvalidCoordinate(x, y));
        }
        if self.find_node(x, y, ADD_HIT_RADIUS).is_none() {
            self.x.push(x);
            self.y.push(y);
            self.invalidate();
            self.revalidate_exclusions();
        }
        Ok(())
    }

    /// 查找距离 `(x, y)` 最近且距离小于 `hit_radius` 的节点下标.
    pub fn find_node(&self, x: f64, y: f64, hit_radius: f64) -> Option<usize> {
        izip!(self.x.iter(), self.y.iter())
            .map(|(nx, ny)| ((nx - x).powi(2) + (ny - y).powi(2)).sqrt())
            .enumerate()
            .min_by_key(|&(i, d)| (OrderedFloat(d), i))
            .and_then(|(i, d)| (d < hit_radius).then_some(i))
    }

    /// 删除命中半径 `hit_radius` 内离 `(x, y)` 最近的节点, 并重新校验排除区间.
    ///
    /// 如果被删节点位于起点之前, 起点下标随之减一, 使原起点节点保持不变.
    pub fn remove_node_within(&mut self, x: f64, y: f64, hit_radius: f64) -> AnnotResult<()> {
        let i = self
            .find_node(x, y, hit_radius)
            .ok_or(AnnotError::NodeNotFound)?;
        self.x.remove(i);
        self.y.remove(i);
        if i < self.start_index {
            self.start_index -= 1;
        }
        self.invalidate();
        self.revalidate_exclusions();
        Ok(())
    }

    /// 以默认的删除命中半径删除节点.
    #[inline]
    pub fn remove_node(&mut self, x: f64, y: f64) -> AnnotResult<()> {
        self.remove_node_within(x, y, REMOVE_HIT_RADIUS)
    }

    /// 整体替换节点集合. 含非有限值的 `(x, y)` 对会被静默丢弃.
    ///
    /// `x` 与 `y` 长度不同时, 多出的部分被忽略.
    pub fn set_nodes(&mut self, x: &[f64], y: &[f64]) {
        let (nx, ny): VecPair<f64> = izip!(x.iter().copied(), y.iter().copied())
            .filter(|(px, py)| px.is_finite() && py.is_finite())
            .unzip();
        self.x = nx;
        self.y = ny;
        self.invalidate();
        self.revalidate_exclusions();
    }

    /// 清空节点. 排除区间因无法吸附而一并被移除.
    #[inline]
    pub fn clear(&mut self) {
        self.set_nodes(&[], &[]);
    }

    /// 贪心最近邻路径顺序 (节点下标). 节点少于两个时为空.
    #[inline]
    pub fn get_path_order(&self) -> Vec<usize> {
        order::greedy_order(&self.x, &self.y, self.start_index)
    }

    /// 按路径顺序排列的节点坐标.
    pub fn ordered_nodes(&self) -> VecPair<f64> {
        self.get_path_order()
            .into_iter()
            .map(|i| (self.x[i], self.y[i]))
            .unzip()
    }

    /// 以参数步长 `resolution` 插值平滑路径.
    ///
    /// 少于四个有序节点 (或 `resolution` 不在 `(0, 1]` 内) 时返回空路径.
    pub fn interpolate(&self, resolution: f64) -> SampledPath {
        if !(resolution > 0.0 && resolution <= 1.0) {
            return SampledPath::default();
        }
        let (xs, ys) = self.ordered_nodes();
        if xs.len() < MIN_SPLINE_NODES {
            return SampledPath::default();
        }
        let (px, py) = parametric_spline_f64(
            ArrayView1::from(xs.as_slice()),
            ArrayView1::from(ys.as_slice()),
            resolution,
        );
        SampledPath::new(px, py)
    }

    /// 默认分辨率下的插值路径. 按需计算并缓存.
    pub fn path(&self) -> &SampledPath {
        self.cache
            .get_or_init(|| self.interpolate(DEFAULT_RESOLUTION))
    }

    /// 路径是否存在.
    #[inline]
    pub fn has_path(&self) -> bool {
        !self.path().is_empty()
    }

    /// 默认分辨率路径上离 `(x, y)` 最近的采样点. 没有路径时返回 `None`.
    #[inline]
    pub fn nearest_path_point(&self, x: f64, y: f64) -> Option<Point2d> {
        self.path().nearest(x, y)
    }

    /// 默认分辨率路径上位于 `start` 和 `end` 最近采样点之间的子路径 (左闭右开).
    pub fn region(&self, start: Point2d, end: Point2d) -> SampledPath {
        let path = self.path();
        match (path.argnearest(start.0, start.1), path.argnearest(end.0, end.1)) {
            (Some(i1), Some(i2)) => path.slice(i1.min(i2), i1.max(i2)),
            _ => SampledPath::default(),
        }
    }

    /// 把每个节点沿其处路径的法向平移 `distance`, 按路径顺序返回新坐标.
    ///
    /// 法向取路径上离该节点最近的采样点处的法向. 没有路径时返回空.
    pub fn expand_nodes(&self, distance: f64) -> VecPair<f64> {
        let path = self.interpolate(EXPAND_RESOLUTION);
        if path.len() < 2 {
            return (vec![], vec![]);
        }
        // 第 k 段差分的法向对应采样点 k + 1.
        let angles = path.normal_angles();
        let (xn, yn) = self.ordered_nodes();
        izip!(xn.iter(), yn.iter())
            .map(|(&nx, &ny)| {
                let i = izip!(path.x().iter().skip(1), path.y().iter().skip(1))
                    .enumerate()
                    .min_by_key(|&(k, (px, py))| {
                        (OrderedFloat((px - nx).powi(2) + (py - ny).powi(2)), k)
                    })
                    .map_or(0, |(k, _)| k);
                let a = angles[i + 1];
                (nx + distance * a.cos(), ny + distance * a.sin())
            })
            .unzip()
    }
}
