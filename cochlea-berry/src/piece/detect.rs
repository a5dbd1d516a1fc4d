//! 沿螺旋曲线的细胞自动检测.

use super::Piece;
use crate::consts::label::CellLabel;
use crate::error::{AnnotError, AnnotResult};
use crate::tile::Dim;
use crate::Point2d;
use ndarray::{s, ArrayView2};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// 一维序列的局部极大值下标.
///
/// 平台 (相邻相等值) 形式的极大值取平台中点 (偏左). 首尾元素不会被选中.
fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut ans = vec![];
    if n < 3 {
        return ans;
    }
    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                ans.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    ans
}

/// 查找一维序列的峰值, 要求任意两个峰的下标间距不小于 `distance`.
///
/// 从最高的峰开始保留, 依次删去与已保留峰距离过近的较低峰. 高度相同时下标较小者优先.
/// 返回的下标升序排列.
pub fn find_peaks(values: &[f64], distance: usize) -> Vec<usize> {
    let peaks = local_maxima(values);
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by_key(|&k| (Reverse(OrderedFloat(values[peaks[k]])), k));
    let mut keep = vec![true; peaks.len()];
    for j in order {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in (j + 1)..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }
    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

/// 在 `(x, y)` 处精化细胞位置.
///
/// 取下标窗口 `[round(x - rx), round(x + rx))` × `[round(y - ry), round(y + ry))`
/// (截断到图像内), 以窗口强度的 `power` 次幂为权重求质心. 窗口为空或权重全为 0 时
/// 返回原位置. 坐标均为 `(x, y)` 索引模式下的连续索引.
pub fn find_centroid(
    image: ArrayView2<f32>,
    x: f64,
    y: f64,
    rx: f64,
    ry: f64,
    power: i32,
) -> Point2d {
    let (w, h) = image.dim();
    let bound = |v: f64, n: usize| v.round().clamp(0.0, n as f64) as usize;
    let (xlb, xub) = (bound(x - rx, w), bound(x + rx, w));
    let (ylb, yub) = (bound(y - ry, h), bound(y + ry, h));
    if xlb >= xub || ylb >= yub {
        return (x, y);
    }

    let window = image.slice(s![xlb..xub, ylb..yub]);
    let (mut total, mut mx, mut my) = (0.0, 0.0, 0.0);
    for ((i, j), &v) in window.indexed_iter() {
        let wt = (v as f64).powi(power);
        total += wt;
        mx += wt * i as f64;
        my += wt * j as f64;
    }
    if !(total.is_finite() && total > 0.0) {
        return (x, y);
    }
    (xlb as f64 + mx / total, ylb as f64 + my / total)
}

impl Piece {
    /// 沿结构 `label` 的螺旋曲线自动检测细胞, 结果替换该结构的细胞标注.
    ///
    /// 1. 合并所有 tile;
    /// 2. 以细检测分辨率插值螺旋曲线;
    /// 3. 在平滑后的投影图像上沿宽为 `2 * ribbon_width` 的条带采样强度;
    /// 4. 以 `min_spacing` 换算出的最小采样间距寻峰;
    /// 5. 在每个峰附近 `ribbon_width` 范围内求强度质心, 换算回物理坐标.
    ///
    /// `channel` 为 `None` 时使用该结构的默认通道. 返回检测到的细胞个数.
    pub fn guess_cells(
        &mut self,
        label: CellLabel,
        ribbon_width: f64,
        min_spacing: f64,
        channel: Option<usize>,
    ) -> AnnotResult<usize> {
        if !(ribbon_width.is_finite() && ribbon_width > 0.0) {
            return Err(AnnotError::InvalidParameter("条带宽度必须为正"));
        }
        if !(min_spacing.is_finite() && min_spacing > 0.0) {
            return Err(AnnotError::InvalidParameter("细胞最小间距必须为正"));
        }
        let channel = channel.unwrap_or_else(|| label.default_channel());

        let path = self.spiral(label).interpolate(self.config.path_resolution());
        let Some(step) = path.mean_step().filter(|&d| d > 0.0) else {
            return Err(AnnotError::MissingSpiral);
        };

        let tile = self.merge_tiles()?;
        let intensity = tile.sample_along_path_with_steps(
            path.x(),
            path.y(),
            channel,
            Some(self.config.nucleus_radius()),
            Some(ribbon_width),
            self.config.ribbon_steps(),
        )?;
        let distance = ((min_spacing / step).floor() as usize).max(1);
        let peaks = find_peaks(&intensity, distance);
        log::debug!(
            "{label}: 路径 {} 个采样, 平均步长 {step:e}, 最小峰间距 {distance}, 初始峰 {} 个",
            path.len(),
            peaks.len()
        );

        let image = tile.sample_channel(channel, None, true)?;
        let rx = tile.to_index_delta(ribbon_width, Dim::X);
        let ry = tile.to_index_delta(ribbon_width, Dim::Y);
        let power = self.config.centroid_power();
        let (xs, ys): (Vec<f64>, Vec<f64>) = peaks
            .into_iter()
            .map(|k| {
                let (px, py) = path.point(k);
                let (ix, iy, _) = tile.to_index(px, py, None);
                let (cx, cy) = find_centroid(image.view(), ix, iy, rx, ry, power);
                let (x, y, _) = tile.to_physical(cx, cy, None);
                (x, y)
            })
            .unzip();

        let n = xs.len();
        self.cells_mut(label).set_nodes(&xs, &ys);
        log::info!("片段 {}: {label} 检测到 {n} 个细胞", self.name);
        Ok(n)
    }
}
