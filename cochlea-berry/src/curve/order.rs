//! 节点的路径顺序.

use ordered_float::OrderedFloat;

/// 贪心最近邻排序.
///
/// 从第 `start` 个节点出发, 每次选取剩余节点中离上一个被选节点最近的一个,
/// 直至全部选完. 这只是穿过散点路径的近似, 不求解旅行商问题, 时间复杂度 O(n^2).
///
/// - 距离相同时, 取原始下标较小的节点.
/// - `start` 越界时按最后一个节点处理.
/// - 节点少于两个时返回空 `Vec`.
pub(crate) fn greedy_order(x: &[f64], y: &[f64], start: usize) -> Vec<usize> {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    if n < 2 {
        return vec![];
    }

    // 剩余节点保持原始下标的升序, 因此 `min_by_key` 的首个最小值就是最小下标.
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut path = Vec::with_capacity(n);
    let mut i = start.min(n - 1);
    while remaining.len() > 1 {
        let cur = remaining.remove(i);
        path.push(cur);
        let (cx, cy) = (x[cur], y[cur]);
        i = remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, &j)| OrderedFloat((x[j] - cx).powi(2) + (y[j] - cy).powi(2)))
            .map(|(k, _)| k)
            .unwrap_or(0);
    }
    path.extend(remaining);
    path
}

#[cfg(test)]
mod tests {
    use super::greedy_order;

    #[test]
    fn test_order_small() {
        assert!(greedy_order(&[], &[], 0).is_empty());
        assert!(greedy_order(&[1.0], &[1.0], 0).is_empty());
        assert_eq!(greedy_order(&[0.0, 1.0], &[0.0, 0.0], 1), vec![1, 0]);
    }

    /// 打乱顺序的直线节点应当被重新串联起来.
    #[test]
    fn test_order_scattered_line() {
        let x = [3.0, 0.0, 2.0, 4.0, 1.0];
        let y = [0.0; 5];
        assert_eq!(greedy_order(&x, &y, 1), vec![1, 4, 2, 0, 3]);
        // 从中间出发时会先走向最近的一侧, 再跳回另一侧.
        assert_eq!(greedy_order(&x, &y, 2), vec![2, 0, 3, 4, 1]);
    }

    /// 等距时取下标较小的节点.
    #[test]
    fn test_order_tie_break() {
        let x = [0.0, 1.0, -1.0];
        let y = [0.0, 0.0, 0.0];
        assert_eq!(greedy_order(&x, &y, 0), vec![0, 1, 2]);
        let x = [0.0, -1.0, 1.0];
        assert_eq!(greedy_order(&x, &y, 0), vec![0, 1, 2]);
    }

    #[test]
    fn test_order_start_out_of_range() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0; 3];
        assert_eq!(greedy_order(&x, &y, 10), vec![2, 1, 0]);
    }

    /// 相同输入多次排序结果一致.
    #[test]
    fn test_order_idempotent() {
        let x = [0.3, 5.0, 1.2, 2.2, 3.9, 0.0];
        let y = [1.0, 0.2, 0.7, 0.1, 2.0, 0.0];
        let first = greedy_order(&x, &y, 3);
        for _ in 0..5 {
            assert_eq!(greedy_order(&x, &y, 3), first);
        }
        assert_eq!(first.len(), 6);
    }
}
