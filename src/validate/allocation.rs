//! Allocation checks: incomplete allocation factors and processes whose
//! default allocation method has no factors to back it.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::graph::{AllocationType, Graph, Process};
use crate::report::{optional_cell, TabularRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationFactorDefect {
    pub process_id: String,
    pub allocation_type: String,
    pub missing_components: Vec<String>,
    /// Position of the factor within the process's `allocationFactors`.
    pub factor_index: usize,
}

impl TabularRecord for AllocationFactorDefect {
    fn columns() -> &'static [&'static str] {
        &["process_id", "allocation_type", "missing_components", "factor_index"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.process_id.clone(),
            self.allocation_type.clone(),
            self.missing_components.join(", "),
            self.factor_index.to_string(),
        ]
    }
}

/// Factors without a `product`, and causal factors without an `exchange`.
pub fn find_faulty_allocation_factors(graph: &Graph) -> Vec<AllocationFactorDefect> {
    let mut defects = Vec::new();
    for (process_id, process) in graph.physical_processes() {
        for (index, factor) in process.allocation_factors.iter().enumerate() {
            let mut missing = Vec::new();
            if factor.product.is_none() {
                missing.push("product".to_string());
            }
            let is_causal = factor.allocation_type == Some(AllocationType::Causal);
            if is_causal && factor.exchange.is_none() {
                missing.push("exchange".to_string());
            }
            if missing.is_empty() {
                continue;
            }
            defects.push(AllocationFactorDefect {
                process_id: process_id.clone(),
                allocation_type: factor
                    .allocation_type
                    .as_ref()
                    .map_or("UNKNOWN_ALLOCATION", |kind| kind.as_str())
                    .to_string(),
                missing_components: missing,
                factor_index: index,
            });
        }
    }
    info!(found = defects.len(), "allocation factor scan complete");
    defects
}

/// Share recorded for one product under one allocation method.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationShare {
    /// Causal allocation: per exchange flow.
    Causal(BTreeMap<String, Option<f64>>),
    Whole(Option<f64>),
}

/// `allocationType -> productId -> share`.
pub type AllocationIndex = BTreeMap<String, BTreeMap<String, AllocationShare>>;

/// Index the allocation factors of `process`. Causal factors missing their
/// product or exchange flow id are skipped with a warning; other factors
/// without a product id are skipped silently.
pub fn allocation_index(process: &Process) -> AllocationIndex {
    let mut index = AllocationIndex::new();
    for factor in &process.allocation_factors {
        let Some(allocation_type) = factor.allocation_type.as_ref() else {
            continue;
        };
        if *allocation_type == AllocationType::Causal {
            let (Some(product), Some(flow)) = (factor.product_id(), factor.exchange_flow_id())
            else {
                warn!(
                    process_id = %process.id,
                    "skipping malformed CAUSAL_ALLOCATION factor"
                );
                continue;
            };
            let share = index
                .entry(allocation_type.as_str().to_string())
                .or_default()
                .entry(product.to_string())
                .or_insert_with(|| AllocationShare::Causal(BTreeMap::new()));
            if let AllocationShare::Causal(by_flow) = share {
                by_flow.insert(flow.to_string(), factor.value);
            }
        } else if let Some(product) = factor.product_id() {
            index
                .entry(allocation_type.as_str().to_string())
                .or_default()
                .insert(product.to_string(), AllocationShare::Whole(factor.value));
        }
    }
    index
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnallocatableProcess {
    pub process_id: String,
    pub process_name: Option<String>,
    pub default_method: String,
    pub available_methods: Vec<String>,
}

impl TabularRecord for UnallocatableProcess {
    fn columns() -> &'static [&'static str] {
        &["process_id", "process_name", "default_method", "available_methods"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.process_id.clone(),
            optional_cell(self.process_name.as_deref()),
            self.default_method.clone(),
            self.available_methods.join(", "),
        ]
    }
}

/// Physical processes with allocation factors whose default allocation method
/// has no factors of that type.
pub fn find_unallocatable_processes(graph: &Graph) -> Vec<UnallocatableProcess> {
    let mut defects = Vec::new();
    for (process_id, process) in graph.physical_processes() {
        if process.allocation_factors.is_empty() {
            continue;
        }
        let Some(default_method) = process.default_allocation_method.as_ref() else {
            continue;
        };
        let index = allocation_index(process);
        if index.contains_key(default_method.as_str()) {
            continue;
        }
        defects.push(UnallocatableProcess {
            process_id: process_id.clone(),
            process_name: process.name.clone(),
            default_method: default_method.as_str().to_string(),
            available_methods: index.keys().cloned().collect(),
        });
    }
    info!(found = defects.len(), "unallocatable process scan complete");
    defects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AllocationExchange, AllocationFactor, ProcessKind, Reference};

    fn causal(product: Option<&str>, flow: Option<&str>, value: f64) -> AllocationFactor {
        AllocationFactor {
            allocation_type: Some(AllocationType::Causal),
            product: product.map(Reference::with_id),
            exchange: flow.map(|flow| AllocationExchange {
                flow: Some(Reference::with_id(flow)),
                ..AllocationExchange::default()
            }),
            value: Some(value),
            ..AllocationFactor::default()
        }
    }

    #[test]
    fn causal_factors_index_by_product_then_flow() {
        let mut process = Process::new("p1", "refinery", ProcessKind::Multifunctional);
        process.allocation_factors = vec![
            causal(Some("gasoline"), Some("crude"), 0.6),
            causal(Some("gasoline"), Some("power"), 0.4),
            causal(None, Some("crude"), 0.1),
        ];

        let index = allocation_index(&process);
        let AllocationShare::Causal(by_flow) = &index["CAUSAL_ALLOCATION"]["gasoline"] else {
            panic!("expected causal share");
        };
        assert_eq!(by_flow.len(), 2);
        assert_eq!(by_flow["crude"], Some(0.6));
    }

    #[test]
    fn physical_factor_without_product_is_flagged_with_index() {
        let mut graph = Graph::default();
        let mut process = Process::new("p1", "refinery", ProcessKind::Process);
        process.allocation_factors = vec![
            causal(Some("gasoline"), Some("crude"), 1.0),
            AllocationFactor {
                allocation_type: Some(AllocationType::Physical),
                value: Some(1.0),
                ..AllocationFactor::default()
            },
            causal(Some("diesel"), None, 1.0),
        ];
        graph.insert_process(process);

        let defects = find_faulty_allocation_factors(&graph);
        assert_eq!(defects.len(), 2);
        assert_eq!(defects[0].factor_index, 1);
        assert_eq!(defects[0].missing_components, vec!["product"]);
        assert_eq!(defects[1].factor_index, 2);
        assert_eq!(defects[1].missing_components, vec!["exchange"]);
    }
}
