pub mod multi_tf;
pub mod pivot;
pub mod threshold;

pub use multi_tf::MultiTimeframeConfirm;
pub use pivot::PivotReversal;
pub use threshold::ThresholdCross;
