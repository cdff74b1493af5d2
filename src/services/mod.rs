pub mod annealer;
pub mod blend_search;
pub mod region_model;
pub mod repair_orchestrator;

pub use annealer::{Annealer, AnnealingOutcome, StepDecision};
pub use blend_search::{BlendOutcome, BlendProbe, BlendSearch, MonotonicityReport};
pub use region_model::{
    color_regions, red_queue, regions_with_color, seed_good_states, sort_regions,
    summarize_regions, RegionSummary,
};
pub use repair_orchestrator::{RepairCollaborators, RepairEvent, RepairOrchestrator};
