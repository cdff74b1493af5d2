pub mod checkpoint;
pub mod config;
pub mod good_states;
pub mod outcome;
pub mod region;
pub mod sample;

pub use checkpoint::{
    blend, Architecture, CheckpointTag, ControllerCheckpoint, ParameterTransaction,
};
pub use config::{
    AnnealingConfig, Benchmark, BlendConfig, CheckpointOfRecord, Config, EnergyKind,
    LoggingConfig, PlantConfig, RepairLoopConfig,
};
pub use good_states::{GoodState, GoodStateSet};
pub use outcome::{
    IterationRecord, RepairCase, RepairCaseCounters, RepairReport, SkipReason,
};
pub use region::{Interval, Region, RegionColor, RegionId, RegionPriority, Verdict};
pub use sample::{bad_states_of, SampledState, StateVector};
