use std::fmt;

/// Failure while applying a single effect. Fatal for the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    PathNotFound(String),
    TypeMismatch { path: String, detail: String },
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathNotFound(path) => write!(f, "path not found: {path}"),
            Self::TypeMismatch { path, detail } => {
                write!(f, "type mismatch at {path}: {detail}")
            }
        }
    }
}

impl std::error::Error for EffectError {}

/// The only failure mode that prevents history progression: an effect failed
/// mid-tick, the cloned state was discarded, and no record was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickAborted {
    pub storylet_id: String,
    pub effect_index: usize,
    pub reason: String,
}

impl fmt::Display for TickAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick aborted at storylet {} effect {}: {}",
            self.storylet_id, self.effect_index, self.reason
        )
    }
}

impl std::error::Error for TickAborted {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickError {
    Aborted(TickAborted),
    UnknownStorylet(String),
    OnceViolation(String),
    OrderingViolation { storylet_id: String, detail: String },
    TickRangeInvalid { from_tick: u64, to_tick: u64 },
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(aborted) => write!(f, "{aborted}"),
            Self::UnknownStorylet(storylet_id) => {
                write!(f, "unknown storylet: {storylet_id}")
            }
            Self::OnceViolation(storylet_id) => {
                write!(f, "once violation: storylet {storylet_id} has already fired")
            }
            Self::OrderingViolation {
                storylet_id,
                detail,
            } => write!(f, "ordering violation for storylet {storylet_id}: {detail}"),
            Self::TickRangeInvalid { from_tick, to_tick } => {
                write!(f, "invalid tick range: from {from_tick} to {to_tick}")
            }
        }
    }
}

impl std::error::Error for TickError {}

impl From<TickAborted> for TickError {
    fn from(value: TickAborted) -> Self {
        Self::Aborted(value)
    }
}
