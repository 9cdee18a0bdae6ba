pub mod driver;
pub mod history;
pub mod state;

pub use driver::{Observer, SmootherHandle};
pub use history::History;
pub use state::{ProcessingState, RecognitionSmoother, Snapshot};
