//! Corrective transforms and the order-checked pipeline that composes them.
//!
//! Every transform rewrites the graph in place and returns how many records it
//! changed. Transforms assume the invariants left by earlier steps, so a
//! [`Pipeline`] refuses step orders that would break them.

pub mod flows;
pub mod location;

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::config::RepairConfig;
use crate::graph::Graph;

pub use flows::{
    apply_opposite_direction, assign_reference_units, delete_flow_categories,
    demote_non_reference_products, normalize_input_key, DeletionOutcome,
};
pub use location::{
    backfill_process_locations, inherit_exchange_locations, normalize_locations_for_export,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStep {
    NormalizeInputKey,
    DeleteFlowCategories,
    DemoteNonReferenceProducts,
    OppositeDirectionWaste,
    AssignReferenceUnits,
    BackfillProcessLocations,
    InheritExchangeLocations,
    NormalizeLocationsForExport,
}

impl RepairStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NormalizeInputKey => "normalize_input_key",
            Self::DeleteFlowCategories => "delete_flow_categories",
            Self::DemoteNonReferenceProducts => "demote_non_reference_products",
            Self::OppositeDirectionWaste => "opposite_direction_waste",
            Self::AssignReferenceUnits => "assign_reference_units",
            Self::BackfillProcessLocations => "backfill_process_locations",
            Self::InheritExchangeLocations => "inherit_exchange_locations",
            Self::NormalizeLocationsForExport => "normalize_locations_for_export",
        }
    }
}

impl fmt::Display for RepairStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pairs `(earlier, later)` that must keep this relative order when both are
/// scheduled.
const ORDER_RULES: &[(RepairStep, RepairStep)] = &[
    (RepairStep::NormalizeInputKey, RepairStep::DemoteNonReferenceProducts),
    (RepairStep::NormalizeInputKey, RepairStep::OppositeDirectionWaste),
    (RepairStep::DemoteNonReferenceProducts, RepairStep::OppositeDirectionWaste),
    (RepairStep::DemoteNonReferenceProducts, RepairStep::AssignReferenceUnits),
    (RepairStep::OppositeDirectionWaste, RepairStep::AssignReferenceUnits),
    (RepairStep::BackfillProcessLocations, RepairStep::InheritExchangeLocations),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("step '{0}' is scheduled more than once")]
    Duplicate(RepairStep),
    #[error("step '{later}' must run after '{earlier}'")]
    OutOfOrder {
        earlier: RepairStep,
        later: RepairStep,
    },
    #[error("step '{0}' must be the last step")]
    NotLast(RepairStep),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: RepairStep,
    pub changed: usize,
    /// Flow-table entries dropped by category deletion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows_removed: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub steps: Vec<StepOutcome>,
}

impl RepairReport {
    pub fn total_changed(&self) -> usize {
        self.steps.iter().map(|outcome| outcome.changed).sum()
    }

    pub fn changed_by(&self, step: RepairStep) -> Option<usize> {
        self.steps
            .iter()
            .find(|outcome| outcome.step == step)
            .map(|outcome| outcome.changed)
    }
}

/// An ordered list of repair steps plus the settings they read.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<RepairStep>,
    config: RepairConfig,
}

impl Pipeline {
    pub fn new(steps: Vec<RepairStep>, config: RepairConfig) -> Result<Self, PipelineError> {
        for (index, step) in steps.iter().enumerate() {
            if steps[..index].contains(step) {
                return Err(PipelineError::Duplicate(*step));
            }
        }

        let position = |step: RepairStep| steps.iter().position(|s| *s == step);
        for &(earlier, later) in ORDER_RULES {
            if let (Some(a), Some(b)) = (position(earlier), position(later)) {
                if a > b {
                    return Err(PipelineError::OutOfOrder { earlier, later });
                }
            }
        }

        let export = RepairStep::NormalizeLocationsForExport;
        if let Some(index) = position(export) {
            if index + 1 != steps.len() {
                return Err(PipelineError::NotLast(export));
            }
        }

        Ok(Self { steps, config })
    }

    /// The default cleanup order. Category deletion is scheduled only when
    /// categories are configured; export normalization only when enabled.
    pub fn standard(config: &RepairConfig) -> Self {
        let mut steps = vec![RepairStep::NormalizeInputKey];
        if !config.delete_categories.is_empty() {
            steps.push(RepairStep::DeleteFlowCategories);
        }
        steps.extend([
            RepairStep::DemoteNonReferenceProducts,
            RepairStep::OppositeDirectionWaste,
            RepairStep::AssignReferenceUnits,
            RepairStep::BackfillProcessLocations,
            RepairStep::InheritExchangeLocations,
        ]);
        if config.normalize_locations_for_export {
            steps.push(RepairStep::NormalizeLocationsForExport);
        }
        Self {
            steps,
            config: config.clone(),
        }
    }

    pub fn steps(&self) -> &[RepairStep] {
        &self.steps
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub fn run(&self, graph: &mut Graph) -> RepairReport {
        let mut report = RepairReport::default();
        for &step in &self.steps {
            let outcome = self.apply(step, graph);
            info!(
                step = %step,
                changed = outcome.changed,
                flows_removed = outcome.flows_removed,
                "repair step applied"
            );
            report.steps.push(outcome);
        }
        report
    }

    fn apply(&self, step: RepairStep, graph: &mut Graph) -> StepOutcome {
        let config = &self.config;
        let mut flows_removed = None;
        let changed = match step {
            RepairStep::NormalizeInputKey => normalize_input_key(graph),
            RepairStep::DeleteFlowCategories => {
                let deleted = delete_flow_categories(graph, &config.delete_categories);
                flows_removed = Some(deleted.flows_removed);
                deleted.exchanges_removed
            }
            RepairStep::DemoteNonReferenceProducts => demote_non_reference_products(graph),
            RepairStep::OppositeDirectionWaste => {
                apply_opposite_direction(graph, &config.waste_cutoff_marker)
            }
            RepairStep::AssignReferenceUnits => assign_reference_units(graph),
            RepairStep::BackfillProcessLocations => {
                backfill_process_locations(graph, &config.default_location.to_record())
            }
            RepairStep::InheritExchangeLocations => inherit_exchange_locations(graph),
            RepairStep::NormalizeLocationsForExport => {
                normalize_locations_for_export(graph, &config.export_location_sentinel)
            }
        };
        StepOutcome {
            step,
            changed,
            flows_removed,
        }
    }
}
