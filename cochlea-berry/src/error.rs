//! 运行时错误.

use std::path::PathBuf;
use thiserror::Error;

/// 标注编辑、采样、检测与持久化的运行时错误.
///
/// 所有错误都是局部、可恢复的, 由调用方决定如何呈现.
#[derive(Debug, Error)]
pub enum AnnotError {
    /// 坐标不是有限值.
    #[error("坐标必须是有限值, 但得到 ({0}, {1})")]
    InvalidCoordinate(f64, f64),

    /// 命中半径内没有可删除的节点或排除区间.
    #[error("附近没有节点")]
    NodeNotFound,

    /// 既没有指定 z 切片, 也没有要求投影.
    #[error("未指定 z 切片且不做投影, 无法确定二维图像")]
    AmbiguousSlice,

    /// 参数非法 (非正的半径、间距、体素尺寸等).
    #[error("参数非法: {0}")]
    InvalidParameter(&'static str),

    /// 螺旋曲线节点不足, 不存在可供采样的路径.
    #[error("螺旋曲线节点不足, 不存在插值路径")]
    MissingSpiral,

    /// 找不到已保存的分析文件.
    #[error("未找到已保存的分析: {}", .0.display())]
    NoSavedAnalysis(PathBuf),

    /// 分析文件无法解析或与当前数据不匹配.
    #[error("分析文件损坏: {0}")]
    CorruptAnalysis(String),

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 本 crate 的通用结果类型.
pub type AnnotResult<T> = Result<T, AnnotError>;
