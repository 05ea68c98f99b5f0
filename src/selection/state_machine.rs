/// Scan position of the greedy keyframe search, in frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Anchor { anchor: usize },
    Probing { anchor: usize, target: usize },
    Cut { anchor: usize, target: usize },
    Done,
}

impl ScanState {
    pub fn new(start: usize) -> Self {
        ScanState::Anchor { anchor: start }
    }

    /// `overlap` is the measured overlap of the current probe and is only
    /// read in `Probing`; a missing value counts as no overlap.
    pub fn transition(&self, overlap: Option<f64>, config: &ScanConfig) -> (ScanState, ScanAction) {
        match *self {
            ScanState::Anchor { anchor } => {
                if anchor + 1 >= config.range_end {
                    (ScanState::Done, ScanAction::Finish)
                } else {
                    let target = anchor + 1;
                    (
                        ScanState::Probing { anchor, target },
                        ScanAction::Probe { anchor, target },
                    )
                }
            }

            ScanState::Probing { anchor, target } => {
                let overlap = overlap.unwrap_or(0.0);
                if overlap < config.overlap_threshold {
                    (
                        ScanState::Cut { anchor, target },
                        ScanAction::RecordCut { anchor, target },
                    )
                } else if target + 1 < config.range_end {
                    // 冗余帧，继续向后探测
                    let target = target + 1;
                    (
                        ScanState::Probing { anchor, target },
                        ScanAction::Probe { anchor, target },
                    )
                } else {
                    (ScanState::Done, ScanAction::Finish)
                }
            }

            ScanState::Cut { target, .. } => (ScanState::Anchor { anchor: target }, ScanAction::Continue),

            ScanState::Done => (ScanState::Done, ScanAction::Finish),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ScanState::Done)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    /// Measure the overlap of `anchor` and `target` before the next step.
    Probe { anchor: usize, target: usize },
    /// Keep `target` as the next keyframe and release the finished window.
    RecordCut { anchor: usize, target: usize },
    Continue,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    pub overlap_threshold: f64,
    /// 不含上界
    pub range_end: usize,
}
