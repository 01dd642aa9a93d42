/// Feature standardization (zero mean, unit variance per column)

use crate::util::stats;

pub struct StandardScaler;

impl StandardScaler {
    /// Standardize each column. Zero-variance columns keep a unit scale so
    /// constant features map to zero instead of NaN.
    pub fn fit_transform(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        if rows.is_empty() {
            return Vec::new();
        }
        let dims = rows[0].len();
        let mut means = vec![0.0; dims];
        let mut scales = vec![1.0; dims];

        for d in 0..dims {
            let column: Vec<f64> = rows.iter().map(|r| r[d]).collect();
            means[d] = stats::mean(&column);
            let std = stats::std_dev(&column);
            scales[d] = if std > 0.0 { std } else { 1.0 };
        }

        rows.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(d, v)| (v - means[d]) / scales[d])
                    .collect()
            })
            .collect()
    }
}
