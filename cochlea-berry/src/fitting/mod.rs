//! 曲线拟合.
//!
//! 给定一系列有序点 `(x, y)`, 该模块可以拟合出一条经过所有点的平滑参数曲线.

use ndarray::{Array1, ArrayView1};

mod cubic_spline;

use cubic_spline::CubicSplineImp;

type VecPair<T> = (Vec<T>, Vec<T>);

/// 参数化三次样条曲线 `t -> (x(t), y(t))`, `t ∈ [0, 1]`.
///
/// 参数 `t` 取归一化的累计弦长, 因此 `t = 0` 和 `t = 1` 分别对应首尾节点.
#[derive(Clone, Debug)]
pub struct ParametricSpline {
    sx: CubicSplineImp<f64>,
    sy: CubicSplineImp<f64>,
}

impl ParametricSpline {
    /// 拟合经过 `x`, `y` 所有点的参数样条.
    ///
    /// 相邻重合的点会被合并. 如果剩余的不同点少于三个 (或系数方程组无法求解), 返回 `None`.
    pub fn fit(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<Self> {
        assert_eq!(x.len(), y.len(), "x 值和 y 值必须一一对应");

        let mut px: Vec<f64> = Vec::with_capacity(x.len());
        let mut py: Vec<f64> = Vec::with_capacity(y.len());
        let mut chord: Vec<f64> = Vec::with_capacity(x.len());
        for (&cx, &cy) in x.iter().zip(y.iter()) {
            match (px.last(), py.last()) {
                (Some(&lx), Some(&ly)) => {
                    let d = ((cx - lx).powi(2) + (cy - ly).powi(2)).sqrt();
                    if d > 0.0 {
                        chord.push(chord[chord.len() - 1] + d);
                        px.push(cx);
                        py.push(cy);
                    }
                }
                _ => {
                    chord.push(0.0);
                    px.push(cx);
                    py.push(cy);
                }
            }
        }
        if px.len() < 3 {
            return None;
        }

        let total = chord[chord.len() - 1];
        let u = Array1::from_vec(chord).mapv_into(|c| c / total);
        let px = Array1::from_vec(px);
        let py = Array1::from_vec(py);
        Some(Self {
            sx: CubicSplineImp::new(u.view(), px.view())?,
            sy: CubicSplineImp::new(u.view(), py.view())?,
        })
    }

    /// 求参数 `t` 处的点.
    #[inline]
    pub fn eval(&self, t: f64) -> (f64, f64) {
        (self.sx.eval(t), self.sy.eval(t))
    }

    /// 以步长 `resolution` 在 `[0, 1]` 上等参数重采样, 首尾参数 0 和 1 一定被选取.
    pub fn sample(&self, resolution: f64) -> VecPair<f64> {
        assert!(resolution > 0.0 && resolution <= 1.0);
        let n = (1.0 / resolution - 1e-9).ceil() as usize;
        let mut xs = Vec::with_capacity(n + 1);
        let mut ys = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let (px, py) = self.eval((i as f64 * resolution).min(1.0));
            xs.push(px);
            ys.push(py);
        }
        (xs, ys)
    }
}

/// 拟合参数三次样条并以步长 `resolution` 重采样.
///
/// 如果不同点少于三个, 返回两个空 `Vec`.
pub fn parametric_spline_f64(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    resolution: f64,
) -> VecPair<f64> {
    match ParametricSpline::fit(x, y) {
        Some(s) => s.sample(resolution),
        None => (vec![], vec![]),
    }
}
