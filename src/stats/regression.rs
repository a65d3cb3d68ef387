//! Least-squares fit of bin counts against their index
//!
//! The independent variable is the bin position `1..=N` within the window, so
//! its moments are fixed for a given window size and computed once. Each fit
//! then needs a single pass over the `N` counts.
//!
//! Both variables use the same sample size `N`. For an exact linear series
//! `y = a + b*x` the fitted slope is `b` and `r_squared` is 1.

/// Result of one fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Change in count per bin
    pub slope: f64,
    /// Coefficient of determination; 0 when either variable has no spread
    pub r_squared: f64,
}

/// Precomputed index moments for windows of size `N`
#[derive(Debug, Clone)]
pub struct IndexRegression {
    n: usize,
    sum_x: f64,
    /// Sum of squared deviations of X from its mean
    var_x: f64,
}

impl IndexRegression {
    pub fn new(n: usize) -> Self {
        let nf = n as f64;
        let sum_x = nf * (nf + 1.0) / 2.0;
        let sum_sq_x = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 6.0;
        let var_x = if n > 0 { sum_sq_x - sum_x * sum_x / nf } else { 0.0 };

        Self { n, sum_x, var_x }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Fit `ys` (in window order) against `X = 1..=N`
    ///
    /// Only the first `N` values are used; a shorter series is treated as if
    /// the missing values were zero.
    pub fn fit<'a, I>(&self, ys: I) -> LinearFit
    where
        I: IntoIterator<Item = &'a u64>,
    {
        if self.n == 0 {
            return LinearFit {
                slope: 0.0,
                r_squared: 0.0,
            };
        }

        let mut sum_y = 0.0;
        let mut sum_sq_y = 0.0;
        let mut sum_xy = 0.0;

        for (i, &y) in ys.into_iter().take(self.n).enumerate() {
            let x = (i + 1) as f64;
            let y = y as f64;
            sum_y += y;
            sum_sq_y += y * y;
            sum_xy += x * y;
        }

        let nf = self.n as f64;
        let cov = sum_xy - self.sum_x * sum_y / nf;
        let var_y = sum_sq_y - sum_y * sum_y / nf;

        let slope = if self.var_x > 0.0 { cov / self.var_x } else { 0.0 };

        // var_y can go slightly negative from rounding on a flat series
        let r_squared = if self.var_x > 0.0 && var_y > 0.0 {
            (cov * cov) / (self.var_x * var_y)
        } else {
            0.0
        };

        LinearFit { slope, r_squared }
    }
}
