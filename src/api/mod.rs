pub mod selector;

pub use selector::{
    export_frames, write_frame_list, write_summary, EdgeSummary, Selection, SelectionSummary,
    SparseFrameSelector,
};
