/// Seeded unsupervised methods backing the anomaly detectors

pub mod dbscan;
pub mod isolation_forest;
pub mod kmeans;
pub mod lof;
pub mod scaler;

pub use dbscan::Dbscan;
pub use isolation_forest::{IsolationFit, IsolationForest};
pub use kmeans::{KMeans, KMeansFit};
pub use lof::LocalOutlierFactor;
pub use scaler::StandardScaler;
