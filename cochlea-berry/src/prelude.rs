//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Point2d, Point3d};

pub use crate::{AnnotError, AnnotResult};

pub use crate::config::{ChannelConfig, DetectConfig, Rgb};
pub use crate::consts::label::{CellLabel, ALL_LABELS};

pub use crate::curve::{Exclusion, Points, SampledPath};
pub use crate::piece::Piece;
pub use crate::tile::{Dim, Direction, Extent, ImgWriteVis, Tile};

pub use crate::state::{PieceState, PointsState, TileState};

#[cfg(feature = "serde")]
pub use crate::state::{AnalysisDoc, AnalysisStore};
