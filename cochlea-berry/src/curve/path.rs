//! 插值路径.

use crate::Point2d;
use itertools::izip;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use std::f64::consts::FRAC_PI_2;

/// 插值后的稠密路径. 索引模式为物理坐标 `(x, y)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampledPath {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl SampledPath {
    #[inline]
    pub(crate) fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), y.len());
        Self { x, y }
    }

    /// 采样点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// 路径是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// 采样点 x 坐标.
    #[inline]
    pub fn x(&self) -> &[f64] {
        self.x.as_slice()
    }

    /// 采样点 y 坐标.
    #[inline]
    pub fn y(&self) -> &[f64] {
        self.y.as_slice()
    }

    /// 第 `index` 个采样点. 越界时 panic.
    #[inline]
    pub fn point(&self, index: usize) -> Point2d {
        (self.x[index], self.y[index])
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> (Vec<f64>, Vec<f64>) {
        (self.x, self.y)
    }

    /// 距离 `(x, y)` 最近的采样点下标. 距离相同时取较小下标. 路径为空时返回 `None`.
    pub fn argnearest(&self, x: f64, y: f64) -> Option<usize> {
        izip!(self.x.iter(), self.y.iter())
            .enumerate()
            .min_by_key(|&(i, (px, py))| (OrderedFloat((px - x).powi(2) + (py - y).powi(2)), i))
            .map(|(i, _)| i)
    }

    /// 距离 `(x, y)` 最近的采样点.
    #[inline]
    pub fn nearest(&self, x: f64, y: f64) -> Option<Point2d> {
        self.argnearest(x, y).map(|i| self.point(i))
    }

    /// 相邻采样点之间的平均物理距离. 少于两个点时返回 `None`.
    pub fn mean_step(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let total: f64 = izip!(
            self.x.iter(),
            self.y.iter(),
            self.x.iter().skip(1),
            self.y.iter().skip(1)
        )
        .map(|(&x1, &y1, &x2, &y2)| ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt())
        .sum();
        Some(total / (self.len() - 1) as f64)
    }

    /// 截取下标 `[lb, ub)` 的子路径.
    pub fn slice(&self, lb: usize, ub: usize) -> SampledPath {
        let ub = ub.min(self.len());
        let lb = lb.min(ub);
        Self::new(self.x[lb..ub].to_vec(), self.y[lb..ub].to_vec())
    }

    /// 各采样点处与路径垂直的方向角.
    ///
    /// 切向由相邻采样点的差分 (视为复数) 的辐角给出, 加上 90 度即为法向.
    /// 第一个点沿用第一段的方向.
    pub fn normal_angles(&self) -> Vec<f64> {
        if self.len() < 2 {
            return vec![FRAC_PI_2; self.len()];
        }
        let mut angles = Vec::with_capacity(self.len());
        for (&x1, &y1, &x2, &y2) in izip!(
            self.x.iter(),
            self.y.iter(),
            self.x.iter().skip(1),
            self.y.iter().skip(1)
        ) {
            angles.push((y2 - y1).atan2(x2 - x1) + FRAC_PI_2);
        }
        angles.insert(0, angles[0]);
        angles
    }

    /// 把路径沿法向扩展为宽度为 `2 * width` 的条带.
    ///
    /// 返回的两个矩阵形状均为 `(steps, len)`, 第 `k` 行是所有采样点沿法向偏移
    /// `-width + 2 * width * k / (steps - 1)` 的结果.
    pub fn ribbon(&self, width: f64, steps: usize) -> (Array2<f64>, Array2<f64>) {
        debug_assert!(steps >= 2);
        let angles = self.normal_angles();
        let denom = (steps - 1) as f64;
        let rx = Array2::from_shape_fn((steps, self.len()), |(k, j)| {
            let d = width * angles[j].cos();
            self.x[j] - d + 2.0 * d * k as f64 / denom
        });
        let ry = Array2::from_shape_fn((steps, self.len()), |(k, j)| {
            let d = width * angles[j].sin();
            self.y[j] - d + 2.0 * d * k as f64 / denom
        });
        (rx, ry)
    }
}
