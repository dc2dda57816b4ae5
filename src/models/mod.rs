pub mod exam;
pub mod identity;
pub mod outcome;
pub mod slice;

pub use exam::{AcquisitionGeometry, Exam, SeriesContext, Subject, SubSeries};
pub use identity::Uid;
pub use outcome::{RunSummary, TransferOutcome, Verdict};
pub use slice::{Dimensions, PixelGrid, Slice, SpatialMetadata};
