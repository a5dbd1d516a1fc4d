//! 不可变配置.
//!
//! 配置在构造时一次性传入, 之后只读. 若要修改, 应当创建新的实例.

use crate::consts::{CENTROID_POWER, DETECT_RESOLUTION, NUCLEUS_RADIUS, RIBBON_STEPS};
use crate::error::{AnnotError, AnnotResult};

/// 细胞检测流程参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DetectConfig {
    nucleus_radius: f64,
    path_resolution: f64,
    centroid_power: i32,
    ribbon_steps: usize,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            nucleus_radius: NUCLEUS_RADIUS,
            path_resolution: DETECT_RESOLUTION,
            centroid_power: CENTROID_POWER,
            ribbon_steps: RIBBON_STEPS,
        }
    }
}

impl DetectConfig {
    /// 构建检测参数.
    ///
    /// `nucleus_radius` 为细胞核期望半径, `path_resolution` 为沿曲线的插值步长
    /// (取值 `(0, 1]`), `centroid_power` 为质心精化幂次, `ribbon_steps` 为条带法向采样数.
    pub fn new(
        nucleus_radius: f64,
        path_resolution: f64,
        centroid_power: i32,
        ribbon_steps: usize,
    ) -> AnnotResult<Self> {
        if !(nucleus_radius.is_finite() && nucleus_radius > 0.0) {
            return Err(AnnotError::InvalidParameter("细胞核半径必须为正"));
        }
        if !(path_resolution > 0.0 && path_resolution <= 1.0) {
            return Err(AnnotError::InvalidParameter("插值步长必须位于 (0, 1]"));
        }
        if centroid_power < 1 {
            return Err(AnnotError::InvalidParameter("质心幂次至少为 1"));
        }
        if ribbon_steps < 2 {
            return Err(AnnotError::InvalidParameter("条带至少需要两个采样"));
        }
        Ok(Self {
            nucleus_radius,
            path_resolution,
            centroid_power,
            ribbon_steps,
        })
    }

    /// 细胞核期望半径.
    #[inline]
    pub fn nucleus_radius(&self) -> f64 {
        self.nucleus_radius
    }

    /// 沿曲线的插值步长.
    #[inline]
    pub fn path_resolution(&self) -> f64 {
        self.path_resolution
    }

    /// 质心精化幂次.
    #[inline]
    pub fn centroid_power(&self) -> i32 {
        self.centroid_power
    }

    /// 条带法向采样数.
    #[inline]
    pub fn ribbon_steps(&self) -> usize {
        self.ribbon_steps
    }
}

/// 8-bit RGB 颜色.
pub type Rgb = [u8; 3];

/// 通道显示颜色表.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    entries: Vec<(String, Rgb)>,
}

const RED: Rgb = [255, 0, 0];
const GREEN: Rgb = [0, 255, 0];
const BLUE: Rgb = [0, 0, 255];
const WHITE: Rgb = [255, 255, 255];

impl Default for ChannelConfig {
    fn default() -> Self {
        // 解析通道信息失败时, 通道会被标记为 "Unknown n".
        Self::new([
            ("CtBP2", RED),
            ("MyosinVIIa", BLUE),
            ("GluR2", GREEN),
            ("GlueR2", GREEN),
            ("PMT", WHITE),
            ("DAPI", WHITE),
            ("Unknown 1", RED),
            ("Unknown 2", GREEN),
            ("Unknown 3", BLUE),
        ])
    }
}

impl ChannelConfig {
    /// 由 `(通道名, 颜色)` 构建颜色表. 重名时以先出现者为准.
    pub fn new<S: Into<String>, I: IntoIterator<Item = (S, Rgb)>>(it: I) -> Self {
        let mut entries: Vec<(String, Rgb)> = vec![];
        for (name, rgb) in it {
            let name = name.into();
            if entries.iter().all(|(n, _)| *n != name) {
                entries.push((name, rgb));
            }
        }
        Self { entries }
    }

    /// 查询通道显示颜色. 未登记的通道返回 `None`.
    pub fn color(&self, name: &str) -> Option<Rgb> {
        self.entries
            .iter()
            .find_map(|(n, rgb)| (n == name).then_some(*rgb))
    }

    /// 按通道序号给出回退颜色: 依次为红、绿、蓝, 其余为白色.
    #[inline]
    pub fn fallback(index: usize) -> Rgb {
        match index {
            0 => RED,
            1 => GREEN,
            2 => BLUE,
            _ => WHITE,
        }
    }
}
