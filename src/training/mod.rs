pub mod data_loader;
pub mod dataset;
pub mod loss;
pub mod optimizer;
pub mod trainer;

pub use self::data_loader::{center_crop, Batch, DataLoader};
pub use self::dataset::{Dataset, DatasetProvider, PatchPair, SyntheticProvider};
pub use self::loss::{Loss, Metric};
pub use self::optimizer::{Adam, Optimizer};
pub use self::trainer::{EpochSummary, Evaluation, FitOptions, History, Trainer};
