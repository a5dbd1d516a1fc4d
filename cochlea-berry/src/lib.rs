#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 在多 tile、多通道的耳蜗显微体数据上编辑螺旋曲线标注, 并沿曲线自动检测毛细胞.
//!
//! 该 crate 只负责几何标注与检测引擎, 不负责交互界面、绘制以及显微镜原始格式的读取.
//! 调用方需要把每个 tile 以 "物理原点 + 体素尺寸 + 4D 强度数组" 的形式交给本 crate.
//!
//! # 注意
//!
//! 1. 物理坐标统一以米为单位. 体数据索引模式统一为 `(x, y, z, channel)`,
//!   二维投影的索引模式为 `(x, y)`.
//! 2. 所有操作都是单线程同步完成的 (除了可选的 `rayon` 平滑卷积).
//!   `Piece` 及其曲线模型不提供内部锁, 调用方需要保证同一时刻只有一处在修改它们.
//! 3. 可恢复的错误统一通过 [`AnnotError`] 返回. 违反内部约定时程序会直接 panic.
//!
//! # 开发计划
//!
//! ### 参数三次样条 ✅
//!
//! 以归一化累计弦长为参数, 自然边界条件, 系数方程组交给 `ndarray-linalg` 求解.
//!
//! 实现位于 `cochlea-berry/src/fitting`.
//!
//! ### 曲线模型 ✅
//!
//! 1. 节点去重、按命中半径删除. ✅
//! 2. 贪心最近邻路径排序, 距离相同时取较小下标. ✅
//! 3. 排除区间的吸附、自修复、删除与合并. ✅
//! 4. 沿法向平移节点 (克隆螺旋曲线). ✅
//!
//! 实现位于 `cochlea-berry/src/curve`.
//!
//! ### 体数据 tile ✅
//!
//! 物理坐标与索引的仿射变换, 最大强度投影, 球形平滑核, 条带采样, PNG 导出.
//!
//! 实现位于 `cochlea-berry/src/tile`.
//!
//! ### 片段 (piece) 与细胞检测 ✅
//!
//! z 方向对齐, 合并 tile, 沿螺旋曲线找峰并用质心精化位置.
//!
//! 实现位于 `cochlea-berry/src/piece`.
//!
//! ### 分析文档的持久化 ✅
//!
//! JSON 文档的读写, 兼容旧字段名, 过滤非有限坐标.
//!
//! 实现位于 `cochlea-berry/src/state`.
//!
//! ### 多片段 (整个耳蜗) 的聚合 ⌛️
//!
//! 目前每个片段独立打开和保存.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 二维物理坐标 (或连续索引).
pub type Point2d = (f64, f64);

/// 三维物理坐标 (或连续索引).
pub type Point3d = (f64, f64, f64);

pub mod consts;

pub mod config;

mod error;

pub use error::{AnnotError, AnnotResult};

pub mod fitting;

pub mod curve;

pub mod tile;

pub mod piece;

pub mod state;

pub mod prelude;
