use std::fmt;

use crate::OperationId;

/// Everything the pipeline reports to a frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackerEvent {
    /// One complete transcript line, already prefixed with `[HH:MM:SS]`.
    Log {
        op_id: OperationId,
        level: LogLevel,
        line: String,
    },
    /// The pipeline entered a new stage.
    Stage {
        op_id: OperationId,
        stage: PipelineStage,
    },
    /// The pipeline reached a terminal stage. `error` is set on failure.
    Finished {
        op_id: OperationId,
        error: Option<String>,
    },
}

impl UnpackerEvent {
    pub fn op_id(&self) -> OperationId {
        match self {
            Self::Log { op_id, .. } | Self::Stage { op_id, .. } | Self::Finished { op_id, .. } => {
                *op_id
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Pipeline state for a single install attempt.
///
/// ```text
/// Idle -> Extracting -> Detecting -> Staging -> Building -> Installing -> Done
///                                           \-> Copying ----------------/
/// ```
///
/// Any non-terminal stage may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Idle,
    Extracting,
    Detecting,
    Staging,
    Building,
    Copying,
    Installing,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Detecting)
                | (Detecting, Staging)
                | (Staging, Building)
                | (Staging, Copying)
                | (Building, Installing)
                | (Installing, Done)
                | (Copying, Done)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Detecting => "detecting",
            Self::Staging => "staging",
            Self::Building => "building",
            Self::Copying => "copying",
            Self::Installing => "installing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
