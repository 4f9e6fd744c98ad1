//! Pure validators over the graph. None of them mutate; each returns the
//! defects it found, and [`validate_all`] bundles the standing checks.

pub mod allocation;
pub mod structure;

use serde::Serialize;

use crate::graph::Graph;
use crate::report::Sheet;

pub use allocation::{
    allocation_index, find_faulty_allocation_factors, find_unallocatable_processes,
    AllocationFactorDefect, AllocationIndex, AllocationShare, UnallocatableProcess,
};
pub use structure::{
    find_avoided_product_inputs, find_location_issues, find_production_exchange_errors,
    find_unit_references, AvoidedProductInput, LocationDefect, ProductionExchangeDefect,
    ProductionExchangeDetail, UnitReferenceDefect,
};

pub const PRODUCTION_EXCHANGE_SHEET: &str = "productionExchanges";
pub const LOCATION_SHEET: &str = "missingLocations";
pub const ALLOCATION_FACTOR_SHEET: &str = "faultyAllocationFactors";
pub const UNALLOCATABLE_SHEET: &str = "unallocatableProcesses";
pub const AVOIDED_INPUT_SHEET: &str = "avoidedProductInputs";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub processes_scanned: usize,
    pub physical_processes: usize,
    pub production_exchange_defects: usize,
    pub location_defects: usize,
    pub allocation_factor_defects: usize,
    pub unallocatable_processes: usize,
    pub avoided_product_inputs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub summary: ValidationSummary,
    pub production_exchanges: Vec<ProductionExchangeDefect>,
    pub locations: Vec<LocationDefect>,
    pub allocation_factors: Vec<AllocationFactorDefect>,
    pub unallocatable: Vec<UnallocatableProcess>,
    pub avoided_product_inputs: Vec<AvoidedProductInput>,
}

impl ValidationReport {
    pub fn defect_count(&self) -> usize {
        self.production_exchanges.len()
            + self.locations.len()
            + self.allocation_factors.len()
            + self.unallocatable.len()
            + self.avoided_product_inputs.len()
    }

    pub fn is_clean(&self) -> bool {
        self.defect_count() == 0
    }

    pub fn to_sheets(&self) -> Vec<Sheet> {
        vec![
            Sheet::from_records(PRODUCTION_EXCHANGE_SHEET, &self.production_exchanges),
            Sheet::from_records(LOCATION_SHEET, &self.locations),
            Sheet::from_records(ALLOCATION_FACTOR_SHEET, &self.allocation_factors),
            Sheet::from_records(UNALLOCATABLE_SHEET, &self.unallocatable),
            Sheet::from_records(AVOIDED_INPUT_SHEET, &self.avoided_product_inputs),
        ]
    }
}

pub fn validate_all(graph: &Graph) -> ValidationReport {
    let production_exchanges = find_production_exchange_errors(graph);
    let locations = find_location_issues(graph);
    let allocation_factors = find_faulty_allocation_factors(graph);
    let unallocatable = find_unallocatable_processes(graph);
    let avoided_product_inputs = find_avoided_product_inputs(graph);

    let summary = ValidationSummary {
        processes_scanned: graph.processes.len(),
        physical_processes: graph.physical_processes().count(),
        production_exchange_defects: production_exchanges.len(),
        location_defects: locations.len(),
        allocation_factor_defects: allocation_factors.len(),
        unallocatable_processes: unallocatable.len(),
        avoided_product_inputs: avoided_product_inputs.len(),
    };

    ValidationReport {
        summary,
        production_exchanges,
        locations,
        allocation_factors,
        unallocatable,
        avoided_product_inputs,
    }
}
