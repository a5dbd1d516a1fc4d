//! 排除区间: 路径上不参与分析的片段.
//!
//! 每个区间以两个端点表示, 端点总是吸附在默认分辨率路径的采样点上.
//! 节点变化后端点会重新吸附, 退化为单点的区间被丢弃.

use super::Points;
use crate::error::{AnnotError, AnnotResult};
use crate::Point2d;

/// 排除区间的两个端点.
pub type Exclusion = (Point2d, Point2d);

/// 合并重叠 (或首尾相接) 的下标区间.
///
/// 每个区间先被规整为 `lb <= ub`, 再按起点排序后依次合并.
pub fn merge_intervals(intervals: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    let mut intervals: Vec<(usize, usize)> = intervals
        .into_iter()
        .map(|(a, b)| (a.min(b), a.max(b)))
        .collect();
    intervals.sort_unstable();

    let mut ans: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
    for (lb, ub) in intervals {
        match ans.last_mut() {
            Some(last) if lb <= last.1 => last.1 = last.1.max(ub),
            _ => ans.push((lb, ub)),
        }
    }
    ans
}

impl Points {
    /// 加入排除区间. 两个端点被吸附到路径上最近的采样点.
    ///
    /// 吸附后两端重合时区间被丢弃, 返回 `Ok(false)`.
    pub fn add_exclusion(&mut self, start: Point2d, end: Point2d) -> AnnotResult<bool> {
        for &(x, y) in [start, end].iter() {
            if !(x.is_finite() && y.is_finite()) {
                return Err(AnnotError::InvalidCoordinate(x, y));
            }
        }
        let path = self.path();
        let (Some(i1), Some(i2)) = (path.argnearest(start.0, start.1), path.argnearest(end.0, end.1))
        else {
            return Err(AnnotError::MissingSpiral);
        };
        if i1 == i2 {
            log::debug!("排除区间两端吸附到同一点, 已忽略");
            return Ok(false);
        }
        let exclusion = (path.point(i1), path.point(i2));
        self.exclusions.push(exclusion);
        self.updated = true;
        Ok(true)
    }

    /// 把所有排除区间的端点重新吸附到当前路径, 丢弃退化的区间.
    ///
    /// 没有路径时所有区间都被丢弃. 节点变化后会自动调用.
    pub fn revalidate_exclusions(&mut self) {
        if self.exclusions.is_empty() {
            return;
        }
        let before = self.exclusions.len();
        let path = self.path();
        let kept: Vec<Exclusion> = self
            .exclusions
            .iter()
            .filter_map(|&((sx, sy), (ex, ey))| {
                let i1 = path.argnearest(sx, sy)?;
                let i2 = path.argnearest(ex, ey)?;
                (i1 != i2).then(|| (path.point(i1), path.point(i2)))
            })
            .collect();
        if kept.len() < before {
            log::warn!("丢弃了 {} 个退化的排除区间", before - kept.len());
        }
        if kept != self.exclusions {
            self.exclusions = kept;
            self.updated = true;
        }
    }

    /// 删除包含 `(x, y)` 最近路径采样点的第一个排除区间.
    pub fn remove_exclusion(&mut self, x: f64, y: f64) -> AnnotResult<()> {
        let path = self.path();
        let pi = path.argnearest(x, y).ok_or(AnnotError::NodeNotFound)?;
        let hit = self.exclusions.iter().position(|&((sx, sy), (ex, ey))| {
            match (path.argnearest(sx, sy), path.argnearest(ex, ey)) {
                (Some(a), Some(b)) => a.min(b) <= pi && pi <= a.max(b),
                _ => false,
            }
        });
        let i = hit.ok_or(AnnotError::NodeNotFound)?;
        self.exclusions.remove(i);
        self.updated = true;
        Ok(())
    }

    /// 当前排除区间在默认分辨率路径上的下标范围 (闭区间, `lb <= ub`), 与存储顺序一致.
    pub fn exclusion_regions(&self) -> Vec<(usize, usize)> {
        let path = self.path();
        self.exclusions
            .iter()
            .filter_map(|&((sx, sy), (ex, ey))| {
                let a = path.argnearest(sx, sy)?;
                let b = path.argnearest(ex, ey)?;
                Some((a.min(b), a.max(b)))
            })
            .collect()
    }

    /// 合并相互重叠的排除区间. 结果按起点排序.
    pub fn simplify_exclusions(&mut self) {
        let merged = merge_intervals(self.exclusion_regions());
        let path = self.path();
        let simplified: Vec<Exclusion> = merged
            .into_iter()
            .map(|(lb, ub)| (path.point(lb), path.point(ub)))
            .collect();
        if simplified != self.exclusions {
            self.exclusions = simplified;
            self.updated = true;
        }
    }

    /// 整体替换排除区间, 并重新吸附到当前路径.
    pub(crate) fn set_exclusions(&mut self, exclusions: Vec<Exclusion>) {
        self.exclusions = exclusions
            .into_iter()
            .filter(|&((sx, sy), (ex, ey))| {
                sx.is_finite() && sy.is_finite() && ex.is_finite() && ey.is_finite()
            })
            .collect();
        self.updated = true;
        self.revalidate_exclusions();
    }
}
