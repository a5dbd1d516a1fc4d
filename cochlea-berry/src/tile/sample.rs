//! 沿路径的强度采样.

use super::{convolve_same, Tile};
use crate::consts::RIBBON_STEPS;
use crate::curve::SampledPath;
use crate::error::{AnnotError, AnnotResult};
use itertools::izip;
use ndarray::ArrayView2;

/// 在 `(x, y)` 索引模式的图像上做双线性插值. 图像范围外的像素按 0 处理.
pub(crate) fn bilinear(image: &ArrayView2<f32>, x: f64, y: f64) -> f64 {
    let (w, h) = image.dim();
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let pixel = |i: f64, j: f64| -> f64 {
        if i < 0.0 || j < 0.0 || i >= w as f64 || j >= h as f64 {
            0.0
        } else {
            image[(i as usize, j as usize)] as f64
        }
    };
    pixel(x0, y0) * (1.0 - fx) * (1.0 - fy)
        + pixel(x0 + 1.0, y0) * fx * (1.0 - fy)
        + pixel(x0, y0 + 1.0) * (1.0 - fx) * fy
        + pixel(x0 + 1.0, y0 + 1.0) * fx * fy
}

impl Tile {
    /// 沿物理坐标路径 `(xs, ys)` 采样第 `channel` 个通道的最大强度投影.
    ///
    /// - `smooth_radius`: 先用该物理半径的平滑核卷积投影图像.
    /// - `ribbon_width`: 沿法向把路径扩展为宽 `2 * ribbon_width` 的条带,
    ///   每个路径位置取条带上的最大值.
    ///
    /// 条带法向采样数取默认值.
    #[inline]
    pub fn sample_along_path(
        &self,
        xs: &[f64],
        ys: &[f64],
        channel: usize,
        smooth_radius: Option<f64>,
        ribbon_width: Option<f64>,
    ) -> AnnotResult<Vec<f64>> {
        self.sample_along_path_with_steps(
            xs,
            ys,
            channel,
            smooth_radius,
            ribbon_width,
            RIBBON_STEPS,
        )
    }

    /// 同 [`Tile::sample_along_path`], 但由调用方指定条带法向采样数 `steps` (至少为 2).
    pub fn sample_along_path_with_steps(
        &self,
        xs: &[f64],
        ys: &[f64],
        channel: usize,
        smooth_radius: Option<f64>,
        ribbon_width: Option<f64>,
        steps: usize,
    ) -> AnnotResult<Vec<f64>> {
        if xs.len() != ys.len() {
            return Err(AnnotError::InvalidParameter("x 值和 y 值必须一一对应"));
        }
        let bad = izip!(xs.iter(), ys.iter()).find(|(x, y)| !(x.is_finite() && y.is_finite()));
        if let Some((&x, &y)) = bad {
            return Err(AnnotError::InvalidCoordinate(x, y));
        }

        let mut image = self.sample_channel(channel, None, true)?;
        if let Some(r) = smooth_radius {
            let kernel = self.detection_kernel(r)?;
            image = convolve_same(image.view(), kernel.view());
        }
        let image = image.view();
        let at = |x: f64, y: f64| {
            let (i, j, _) = self.to_index(x, y, None);
            bilinear(&image, i, j)
        };

        match ribbon_width {
            None => Ok(izip!(xs.iter(), ys.iter()).map(|(&x, &y)| at(x, y)).collect()),
            Some(w) => {
                if !(w.is_finite() && w > 0.0) {
                    return Err(AnnotError::InvalidParameter("条带宽度必须为正"));
                }
                if steps < 2 {
                    return Err(AnnotError::InvalidParameter("条带至少需要两个采样"));
                }
                let path = SampledPath::new(xs.to_vec(), ys.to_vec());
                let (rx, ry) = path.ribbon(w, steps);
                let ans = izip!(rx.columns(), ry.columns())
                    .map(|(cx, cy)| {
                        izip!(cx.iter(), cy.iter())
                            .map(|(&x, &y)| at(x, y))
                            .fold(f64::NEG_INFINITY, f64::max)
                    })
                    .collect();
                Ok(ans)
            }
        }
    }
}
