//! 投影图像的持久化存储.

use super::Tile;
use crate::config::{ChannelConfig, Rgb};
use image::{ImageResult, Rgb as RgbPixel, RgbImage};
use ndarray::Array2;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 图像不会按原样保存: 每个通道按自身最大值归一化, 再以通道的显示颜色叠加为 RGB.
pub trait ImgWriteVis {
    /// 以 `colors` 中的通道颜色渲染, 并保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P, colors: &ChannelConfig) -> ImageResult<()>;
}

impl Tile {
    /// 通道 `index` 的显示颜色. 通道名未登记时按序号回退.
    fn display_color(&self, index: usize, colors: &ChannelConfig) -> Rgb {
        self.channel_names()
            .get(index)
            .and_then(|name| colors.color(name))
            .unwrap_or_else(|| ChannelConfig::fallback(index))
    }

    /// 把所有通道的最大强度投影渲染为 8-bit RGB 图像.
    ///
    /// 图像宽为 x 方向, 高为 y 方向, y 向上增长 (第一行对应最大的 y).
    pub fn projection_rgb(&self, colors: &ChannelConfig) -> RgbImage {
        let (nx, ny, _) = self.shape();
        let mut acc = Array2::<[f32; 3]>::from_elem((nx, ny), [0.0; 3]);
        for c in 0..self.channels() {
            let Ok(proj) = self.sample_channel(c, None, true) else {
                continue;
            };
            let peak = proj.fold(0.0f32, |a, &b| a.max(b));
            if !(peak > 0.0) {
                continue;
            }
            let rgb = self.display_color(c, colors);
            for (px, &v) in acc.iter_mut().zip(proj.iter()) {
                let v = v.max(0.0) / peak;
                for (dst, &ch) in px.iter_mut().zip(rgb.iter()) {
                    *dst += v * ch as f32;
                }
            }
        }

        let mut buf = RgbImage::new(nx as u32, ny as u32);
        for ((x, y), px) in acc.indexed_iter() {
            let pix = px.map(|v| v.round().clamp(0.0, 255.0) as u8);
            buf.put_pixel(x as u32, (ny - 1 - y) as u32, RgbPixel(pix));
        }
        buf
    }
}

/// 保存所有通道的最大强度投影.
impl ImgWriteVis for Tile {
    fn save<P: AsRef<Path>>(&self, path: P, colors: &ChannelConfig) -> ImageResult<()> {
        self.projection_rgb(colors).save(path)
    }
}
