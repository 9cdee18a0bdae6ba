pub mod stub;
pub mod traits;

pub use stub::{SignCatalog, StubDetector};
pub use traits::Detector;
