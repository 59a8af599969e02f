//! v1 cross-boundary contracts for the director engine, API, and persistence.

pub mod api;
pub mod canon;
pub mod config;
pub mod record;
pub mod serde_seed;
pub mod storylet;
pub mod value;
pub mod world;

pub const SCHEMA_VERSION_V1: &str = "1.0";

pub use api::{ApiError, ErrorCode};
pub use config::{DirectorConfig, EvaluationMode, PacingPreference};
pub use record::{
    JudgeVerdict, NlEvaluation, RejectedStorylet, SelectedStorylet, StateDiffEntry, TickRecord,
};
pub use storylet::{
    ConditionOp, ConditionScope, Effect, EffectOp, EffectScope, NaturalCondition, Precondition,
    Storylet, TypedCondition,
};
pub use value::Value;
pub use world::{canonical_pair, CharacterState, Project, RelationshipState, WorldState};
