//! 通用常量.
//!
//! 物理坐标统一以米为单位, 与显微镜元数据保持一致.

/// 新增节点时的判重半径. 与已有节点距离小于该值的新节点会被忽略.
pub const ADD_HIT_RADIUS: f64 = 2.5e-6;

/// 删除节点时的命中半径.
pub const REMOVE_HIT_RADIUS: f64 = 25e-6;

/// 默认插值分辨率 (样条参数步长). 用于吸附排除区间端点.
pub const DEFAULT_RESOLUTION: f64 = 0.001;

/// 计算节点法向时使用的粗插值分辨率.
pub const EXPAND_RESOLUTION: f64 = 0.01;

/// 细胞检测时沿螺旋曲线的插值分辨率.
pub const DETECT_RESOLUTION: f64 = 0.0001;

/// 拟合样条所需的最少节点数.
pub const MIN_SPLINE_NODES: usize = 4;

/// 细胞核的期望半径.
pub const NUCLEUS_RADIUS: f64 = 2.5e-6;

/// 质心精化时对窗口强度取的幂次.
pub const CENTROID_POWER: i32 = 4;

/// 条带采样在法向上的采样个数.
pub const RIBBON_STEPS: usize = 100;

/// 合并后复合体数据的通道数 (便于直接作为 RGB 显示).
pub const MERGED_CHANNELS: usize = 3;

/// 手动平移 tile 时, 单步平移量相当于多少个 x 方向体素.
pub const MOVE_STEP_VOXELS: f64 = 5.0;

/// 结构标签, 即四排毛细胞加一个额外分组.
pub mod label {
    use std::fmt;

    #[cfg(feature = "serde")]
    use serde::{Deserialize, Serialize};

    /// 耳蜗毛细胞行的结构标签.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub enum CellLabel {
        /// 内毛细胞.
        #[cfg_attr(feature = "serde", serde(rename = "IHC"))]
        Ihc,

        /// 第一排外毛细胞.
        #[cfg_attr(feature = "serde", serde(rename = "OHC1"))]
        Ohc1,

        /// 第二排外毛细胞.
        #[cfg_attr(feature = "serde", serde(rename = "OHC2"))]
        Ohc2,

        /// 第三排外毛细胞.
        #[cfg_attr(feature = "serde", serde(rename = "OHC3"))]
        Ohc3,

        /// 额外分组.
        #[cfg_attr(feature = "serde", serde(rename = "Extra"))]
        Extra,
    }

    /// 全部结构标签, 按固定顺序排列.
    pub const ALL_LABELS: [CellLabel; 5] = [
        CellLabel::Ihc,
        CellLabel::Ohc1,
        CellLabel::Ohc2,
        CellLabel::Ohc3,
        CellLabel::Extra,
    ];

    impl CellLabel {
        /// 持久化文档中使用的名字.
        #[inline]
        pub const fn as_str(&self) -> &'static str {
            match self {
                CellLabel::Ihc => "IHC",
                CellLabel::Ohc1 => "OHC1",
                CellLabel::Ohc2 => "OHC2",
                CellLabel::Ohc3 => "OHC3",
                CellLabel::Extra => "Extra",
            }
        }

        /// 在 [`ALL_LABELS`] 中的位置.
        #[inline]
        pub const fn index(&self) -> usize {
            *self as usize
        }

        /// 检测该类细胞时默认使用的通道.
        ///
        /// 内毛细胞用通道 0 (CtBP2), 其它用通道 1 (MyosinVIIa).
        #[inline]
        pub const fn default_channel(&self) -> usize {
            match self {
                CellLabel::Ihc => 0,
                _ => 1,
            }
        }
    }

    impl fmt::Display for CellLabel {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }
}
