//! 三次样条曲线.

use ndarray::{s, Array1, Array2, ArrayView1};
use ndarray_linalg::{Lapack, Scalar, Solve};
use num::Float;

// ref: https://zhuanlan.zhihu.com/p/628508199

/// 自然边界条件下的三次样条.
///
/// 第 `i` 段 (`x[i] <= t <= x[i + 1]`) 的表达式为
/// `y[i] + b[i] * dx + c[i] * dx^2 + d[i] * dx^3`, 其中 `dx = t - x[i]`.
#[derive(Clone, Debug)]
pub(crate) struct CubicSplineImp<T: Float + Scalar + Lapack> {
    x: Array1<T>,
    y: Array1<T>,

    /// shape: `(len - 1, 3)`, 三列依次为 `b`, `c`, `d`.
    coe: Array2<T>,
}

impl<T: Float + Scalar + Lapack> CubicSplineImp<T> {
    /// 拟合经过所有节点的样条. 系数方程组无法求解时返回 `None`.
    #[inline]
    pub fn new(x: ArrayView1<T>, y: ArrayView1<T>) -> Option<Self> {
        assert_eq!(x.len(), y.len(), "x 值和 y 值必须一一对应");
        assert!(x.len() >= 3, "该样条曲线至少需要三个点");
        assert!(
            x.windows(2).into_iter().all(|v| v[0] < v[1]),
            "x 值必须严格递增"
        );

        let coe = Self::spline_coefficient(x, y)?;
        Some(Self {
            x: x.to_owned(),
            y: y.to_owned(),
            coe,
        })
    }

    /// 求样条在 `t` 处的值. 区间外按首尾两段外推.
    pub fn eval(&self, t: T) -> T {
        let i = self.segment(t);
        let dx = t - self.x[i];
        let (b, c, d) = (self.coe[(i, 0)], self.coe[(i, 1)], self.coe[(i, 2)]);
        ((d * dx + c) * dx + b) * dx + self.y[i]
    }

    /// 定位 `t` 所在的段. 返回满足 `x[i] <= t` 的最大段下标.
    fn segment(&self, t: T) -> usize {
        let last = self.x.len() - 2;
        if t <= self.x[0] {
            return 0;
        }
        if t >= self.x[last] {
            return last;
        }
        // 不变式: x[lo] <= t < x[hi]
        let (mut lo, mut hi) = (0, last);
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.x[mid] <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn array1_diff(arr: ArrayView1<T>) -> Array1<T> {
        let vector: Vec<T> = arr.windows(2).into_iter().map(|v| v[1] - v[0]).collect();
        Array1::from_vec(vector)
    }

    fn spline_coefficient(x: ArrayView1<T>, y: ArrayView1<T>) -> Option<Array2<T>> {
        let len = x.len();
        let one = T::one();
        let two = one + one;
        let three = two + one;

        let dx = Self::array1_diff(x);
        let dy = Self::array1_diff(y);

        // 三对角系数矩阵, 自然边界: 两端二阶导为 0.
        let mut a = Array2::<T>::zeros((len, len));
        let mut r = Array1::<T>::zeros(len);
        for i in 1..(len - 1) {
            a.slice_mut(s![i, (i - 1)..=(i + 1)]).assign(&ArrayView1::from(&[
                dx[i - 1],
                two * (dx[i - 1] + dx[i]),
                dx[i],
            ]));
            r[i] = three * (dy[i] / dx[i] - dy[i - 1] / dx[i - 1]);
        }
        a[(0, 0)] = one;
        a[(len - 1, len - 1)] = one;

        let c = match a.solve(&r) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("样条系数求解失败: {e}");
                return None;
            }
        };

        let mut coe: Array2<T> = Array2::zeros((len - 1, 3));
        for i in 0..(len - 1) {
            coe[(i, 1)] = c[i];
            coe[(i, 2)] = (c[i + 1] - c[i]) / (three * dx[i]);
            coe[(i, 0)] = dy[i] / dx[i] - dx[i] * (two * c[i] + c[i + 1]) / three;
        }
        Some(coe)
    }
}
