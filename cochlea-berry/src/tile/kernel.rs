//! 平滑核与二维卷积.

use crate::error::{AnnotError, AnnotResult};
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

/// 以物理半径 `radius` 构建归一化的球形平滑核, 再沿 z 方向求平均压缩为二维.
///
/// 像素半径 `r = max(round(radius / voxel_x), 1)`, 核边长为 `3r`,
/// 球心位于 `(3r - 1) / 2`. 返回的二维核元素和为 1.
pub fn sphere_kernel(radius: f64, voxel_x: f64) -> AnnotResult<Array2<f32>> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(AnnotError::InvalidParameter("平滑半径必须为正"));
    }
    if !(voxel_x.is_finite() && voxel_x > 0.0) {
        return Err(AnnotError::InvalidParameter("体素尺寸必须为正"));
    }
    let r = (radius / voxel_x).round().max(1.0);
    let side = 3 * r as usize;
    let c = (side - 1) as f64 / 2.0;
    let r2 = r * r;

    // 沿 z 求平均后再归一化, 等价于直接统计每个 (x, y) 上落在球内的体素个数.
    let mut ker = Array2::from_shape_fn((side, side), |(i, j)| {
        let d2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2);
        (0..side)
            .filter(|&k| d2 + (k as f64 - c).powi(2) <= r2)
            .count() as f32
    });
    let total = ker.sum();
    ker.mapv_inplace(|v| v / total);
    Ok(ker)
}

/// 计算输出的第 `i` 行.
fn convolve_row(
    image: &ArrayView2<f32>,
    kernel: &ArrayView2<f32>,
    i: usize,
    mut row: ArrayViewMut1<f32>,
) {
    let (h, w) = image.dim();
    let (kh, kw) = kernel.dim();
    let (oh, ow) = ((kh - 1) / 2, (kw - 1) / 2);
    for (j, out) in row.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for ((a, b), &k) in kernel.indexed_iter() {
            // image[i + oh - a, j + ow - b], 越界按 0 处理.
            let (Some(si), Some(sj)) = ((i + oh).checked_sub(a), (j + ow).checked_sub(b)) else {
                continue;
            };
            if si < h && sj < w {
                acc += image[(si, sj)] * k;
            }
        }
        *out = acc;
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 二维卷积, 输出与 `image` 同形状 (与输入中心对齐), 边界外按 0 填充.
///
/// 打开 `rayon` feature 时逐行并行计算.
pub fn convolve_same(image: ArrayView2<f32>, kernel: ArrayView2<f32>) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros(image.raw_dim());
    if kernel.is_empty() {
        return out;
    }
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(i, row)| convolve_row(&image, &kernel, i, row));
        } else {
            out.axis_iter_mut(Axis(0))
                .enumerate()
                .for_each(|(i, row)| convolve_row(&image, &kernel, i, row));
        }
    }
    out
}
