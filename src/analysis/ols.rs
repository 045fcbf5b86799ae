//! Ordinary least squares via the normal equations.

/// Pivots smaller than this are treated as zero.
const PIVOT_EPSILON: f64 = 1e-12;

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` for a singular system.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Coefficients `[intercept, b1, .., bk]` of `y` regressed on `columns`.
pub fn fit(y: &[f64], columns: &[&[f64]]) -> Option<Vec<f64>> {
    let p = columns.len() + 1;
    let n = y.len();
    let regressor = |row: usize, k: usize| if k == 0 { 1.0 } else { columns[k - 1][row] };

    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for row in 0..n {
        for i in 0..p {
            let xi = regressor(row, i);
            xty[i] += xi * y[row];
            for j in i..p {
                xtx[i][j] += xi * regressor(row, j);
            }
        }
    }
    for i in 0..p {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }
    solve_linear_system(xtx, xty)
}

/// Coefficient of determination of the OLS fit, clamped to `[0, 1]`.
/// A singular design or a constant response gives 0.
pub fn r_squared(y: &[f64], columns: &[&[f64]]) -> f64 {
    let n = y.len();
    if n == 0 {
        return 0.0;
    }
    let Some(beta) = fit(y, columns) else {
        return 0.0;
    };
    let mean = y.iter().sum::<f64>() / n as f64;
    let (mut ss_res, mut ss_tot) = (0.0, 0.0);
    for row in 0..n {
        let fitted = beta[0]
            + columns
                .iter()
                .zip(&beta[1..])
                .map(|(c, b)| c[row] * b)
                .sum::<f64>();
        ss_res += (y[row] - fitted).powi(2);
        ss_tot += (y[row] - mean).powi(2);
    }
    if ss_tot == 0.0 {
        return 0.0;
    }
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

/// Pearson correlation; 0 when either series is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        sxy / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_with_row_swap() {
        // First pivot is zero, so a row exchange is required.
        let a = vec![vec![0.0, 2.0], vec![1.0, 1.0]];
        let x = solve_linear_system(a, vec![4.0, 3.0]).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_system_is_none() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve_linear_system(a, vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn recovers_exact_linear_relation() {
        let x1 = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x2 = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 + 2.0 * a - b).collect();
        let beta = fit(&y, &[&x1, &x2]).unwrap();
        assert_relative_eq!(beta[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(beta[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(beta[2], -1.0, epsilon = 1e-9);
        assert_relative_eq!(r_squared(&y, &[&x1, &x2]), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn duplicate_regressors_give_zero_r_squared() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0];
        assert_eq!(r_squared(&y, &[&x, &x]), 0.0);
    }

    #[test]
    fn pearson_matches_hand_computation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0];
        assert_relative_eq!(pearson(&x, &y), 10.0 / 148f64.sqrt(), epsilon = 1e-12);
        assert_eq!(pearson(&x, &[1.0; 5]), 0.0);
    }
}
