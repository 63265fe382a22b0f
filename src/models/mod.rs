pub mod repository;
pub mod commit;
pub mod dataset;
pub mod analysis;
pub mod stats;

pub use repository::*;
pub use commit::*;
pub use dataset::*;
pub use analysis::*;
pub use stats::*;
