//! Exchange and flow rewrites: direction-key folding, product-flow demotion,
//! the opposite-direction waste convention, reference-unit assignment and
//! category deletion.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::graph::{FlowId, FlowType, Graph, ProcessId};

/// Fold the legacy `isInput` key into `input`. An explicit `input` wins when
/// both are present.
pub fn normalize_input_key(graph: &mut Graph) -> usize {
    let mut changed = 0;
    for process in graph.processes.values_mut() {
        for exchange in &mut process.exchanges {
            let Some(alias) = exchange.is_input_alias.take() else {
                continue;
            };
            if exchange.input.is_none() {
                exchange.input = Some(alias);
            }
            changed += 1;
        }
    }
    info!(changed, "input key normalization complete");
    changed
}

/// Reclassify product flows of non-reference exchanges as technosphere flows.
///
/// A flow that is the quantitative reference of any exchange in the graph is
/// left alone, as is a flow already marked as an input.
pub fn demote_non_reference_products(graph: &mut Graph) -> usize {
    let protected: BTreeSet<FlowId> = graph
        .processes
        .values()
        .flat_map(|process| process.exchanges.iter())
        .filter(|exchange| exchange.is_quantitative_reference())
        .filter_map(|exchange| exchange.flow.clone())
        .collect();

    let candidates: BTreeSet<FlowId> = graph
        .processes
        .values()
        .flat_map(|process| process.exchanges.iter())
        .filter(|exchange| !exchange.is_quantitative_reference())
        .filter_map(|exchange| exchange.flow.clone())
        .filter(|flow_id| !protected.contains(flow_id))
        .collect();

    let mut changed = 0;
    for flow_id in candidates {
        let Some(flow) = graph.flows.get_mut(&flow_id) else {
            continue;
        };
        if flow.is_type(&FlowType::Product) && !flow.is_input() {
            flow.flow_type = Some(FlowType::Technosphere);
            debug!(flow_id = %flow_id, "product flow demoted");
            changed += 1;
        }
    }
    info!(changed, protected = protected.len(), "flow type demotion complete");
    changed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WasteEdit {
    /// Waste leaving a process becomes a negative input.
    Consume,
    /// Waste entering a treatment process becomes its negative reference output.
    Promote,
}

/// Apply the opposite-direction waste convention to physical processes.
///
/// Eligible flows are waste flows whose category does not contain `cutoff`
/// and that have not been reclassified yet (`input` unset). The whole rewrite
/// is planned against the unmodified graph, then applied. When one flow is
/// both produced and treated, the promote edit wins on the flow record.
pub fn apply_opposite_direction(graph: &mut Graph, cutoff: &str) -> usize {
    let mut exchange_edits: Vec<(ProcessId, usize, WasteEdit)> = Vec::new();
    let mut flow_edits: BTreeMap<FlowId, WasteEdit> = BTreeMap::new();

    for (process_id, process) in graph.physical_processes() {
        for (index, exchange) in process.exchanges.iter().enumerate() {
            let Some(flow) = graph.flow_of(exchange) else {
                continue;
            };
            if !flow.is_type(&FlowType::Waste) || flow.input.is_some() {
                continue;
            }
            if flow
                .category
                .as_deref()
                .map_or(false, |category| category.contains(cutoff))
            {
                continue;
            }
            let edit = if exchange.is_input() {
                WasteEdit::Promote
            } else {
                WasteEdit::Consume
            };
            exchange_edits.push((process_id.clone(), index, edit));
            let slot = flow_edits.entry(flow.id.clone()).or_insert(edit);
            if edit == WasteEdit::Promote {
                *slot = WasteEdit::Promote;
            }
        }
    }

    for (process_id, index, edit) in &exchange_edits {
        let Some(exchange) = graph
            .processes
            .get_mut(process_id)
            .and_then(|process| process.exchanges.get_mut(*index))
        else {
            continue;
        };
        exchange.amount = exchange.amount.map(|amount| -amount);
        exchange.is_input_alias = None;
        match edit {
            WasteEdit::Consume => exchange.input = Some(true),
            WasteEdit::Promote => {
                exchange.input = Some(false);
                exchange.is_quantitative_reference = Some(true);
            }
        }
    }

    for (flow_id, edit) in &flow_edits {
        let Some(flow) = graph.flows.get_mut(flow_id) else {
            continue;
        };
        match edit {
            WasteEdit::Consume => flow.input = Some(true),
            WasteEdit::Promote => {
                flow.input = Some(false);
                flow.flow_type = Some(FlowType::Product);
            }
        }
    }

    let promoted = flow_edits
        .values()
        .filter(|edit| **edit == WasteEdit::Promote)
        .count();
    info!(
        exchanges = exchange_edits.len(),
        flows = flow_edits.len(),
        promoted,
        "opposite-direction waste transform complete"
    );
    exchange_edits.len()
}

/// Copy the unit of a physical process's lone production exchange onto the
/// process. Processes with zero or several production exchanges are skipped.
pub fn assign_reference_units(graph: &mut Graph) -> usize {
    let Graph {
        processes, flows, ..
    } = &mut *graph;

    let mut changed = 0;
    for process in processes.values_mut().filter(|process| process.is_physical()) {
        let mut production = process.exchanges.iter().filter(|exchange| {
            exchange.is_output()
                && exchange
                    .flow_id()
                    .and_then(|id| flows.get(id))
                    .map_or(false, |flow| flow.is_type(&FlowType::Product))
        });
        let (Some(reference), None) = (production.next(), production.next()) else {
            continue;
        };
        let Some(unit) = reference.unit.clone() else {
            continue;
        };
        if process.unit.as_ref() != Some(&unit) {
            process.unit = Some(unit);
            changed += 1;
        }
    }
    info!(changed, "reference unit assignment complete");
    changed
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub exchanges_removed: usize,
    pub flows_removed: usize,
}

/// Remove input exchanges whose flow category is one of `categories`, then
/// drop those flows from the table when nothing references them any more.
pub fn delete_flow_categories(graph: &mut Graph, categories: &[String]) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();
    if categories.is_empty() {
        return outcome;
    }
    let wanted: BTreeSet<&str> = categories.iter().map(String::as_str).collect();

    let Graph {
        processes, flows, ..
    } = &mut *graph;

    let mut candidates: BTreeSet<FlowId> = BTreeSet::new();
    for process in processes.values_mut() {
        let before = process.exchanges.len();
        process.exchanges.retain(|exchange| {
            if !exchange.is_input() {
                return true;
            }
            let Some(flow) = exchange.flow_id().and_then(|id| flows.get(id)) else {
                return true;
            };
            let doomed = flow
                .category
                .as_deref()
                .map_or(false, |category| wanted.contains(category));
            if doomed {
                candidates.insert(flow.id.clone());
            }
            !doomed
        });
        outcome.exchanges_removed += before - process.exchanges.len();
    }

    for flow_id in candidates {
        if graph.is_flow_referenced(&flow_id) {
            debug!(flow_id = %flow_id, "flow kept, still referenced by an output");
            continue;
        }
        if graph.flows.remove(&flow_id).is_some() {
            outcome.flows_removed += 1;
        }
    }

    info!(
        exchanges_removed = outcome.exchanges_removed,
        flows_removed = outcome.flows_removed,
        categories = ?categories,
        "category deletion complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Exchange, Flow, Process, ProcessKind, Reference};

    #[test]
    fn explicit_input_wins_over_alias() {
        let mut graph = Graph::default();
        let mut exchange = Exchange::new("f", false, 1.0);
        exchange.is_input_alias = Some(true);
        graph.insert_process(Process::new("p", "p", ProcessKind::Process).with_exchange(exchange));

        assert_eq!(normalize_input_key(&mut graph), 1);
        let exchange = &graph.processes["p"].exchanges[0];
        assert_eq!(exchange.input, Some(false));
        assert_eq!(exchange.is_input_alias, None);
        assert_eq!(normalize_input_key(&mut graph), 0);
    }

    #[test]
    fn reference_flow_is_protected_even_when_used_elsewhere() {
        let mut graph = Graph::default();
        graph.insert_flow(Flow::new("steel", "steel", "metals", FlowType::Product));
        let mut reference = Exchange::new("steel", false, 1.0);
        reference.is_quantitative_reference = Some(true);
        graph.insert_process(Process::new("mill", "mill", ProcessKind::Process).with_exchange(reference));
        graph.insert_process(
            Process::new("scrap", "scrap", ProcessKind::Process)
                .with_exchange(Exchange::new("steel", false, 0.1)),
        );

        assert_eq!(demote_non_reference_products(&mut graph), 0);
        assert!(graph.flows["steel"].is_type(&FlowType::Product));
    }

    #[test]
    fn cutoff_waste_is_untouched() {
        let mut graph = Graph::default();
        graph.insert_flow(Flow::new(
            "ash",
            "ash",
            "CUTOFF Waste Flows/ash",
            FlowType::Waste,
        ));
        graph.insert_process(
            Process::new("p", "boiler", ProcessKind::Process)
                .with_exchange(Exchange::new("ash", false, 2.0)),
        );

        assert_eq!(apply_opposite_direction(&mut graph, "CUTOFF Waste Flows"), 0);
        assert_eq!(graph.processes["p"].exchanges[0].amount, Some(2.0));
        assert_eq!(graph.flows["ash"].input, None);
    }

    #[test]
    fn shared_waste_flow_is_promoted_and_consumed() {
        let mut graph = Graph::default();
        graph.insert_flow(Flow::new("sludge", "sludge", "Hazardous", FlowType::Waste));
        graph.insert_process(
            Process::new("plant", "plant", ProcessKind::Process)
                .with_exchange(Exchange::new("sludge", false, 3.0)),
        );
        graph.insert_process(
            Process::new("treat", "treatment", ProcessKind::Process)
                .with_exchange(Exchange::new("sludge", true, 1.0)),
        );

        assert_eq!(apply_opposite_direction(&mut graph, "CUTOFF Waste Flows"), 2);
        let produced = &graph.processes["plant"].exchanges[0];
        assert_eq!(produced.amount, Some(-3.0));
        assert!(produced.is_input());
        let treated = &graph.processes["treat"].exchanges[0];
        assert_eq!(treated.amount, Some(-1.0));
        assert!(treated.is_output());
        assert_eq!(graph.flows["sludge"].input, Some(false));
        assert!(graph.flows["sludge"].is_type(&FlowType::Product));

        assert_eq!(apply_opposite_direction(&mut graph, "CUTOFF Waste Flows"), 0);
        assert_eq!(graph.processes["treat"].exchanges[0].amount, Some(-1.0));
    }

    #[test]
    fn lone_production_unit_moves_to_process() {
        let mut graph = Graph::default();
        graph.insert_flow(Flow::new("steel", "steel", "metals", FlowType::Product));
        let mut output = Exchange::new("steel", false, 1.0);
        output.unit = Some(Reference::with_id("kg"));
        graph.insert_process(Process::new("mill", "mill", ProcessKind::Process).with_exchange(output));

        assert_eq!(assign_reference_units(&mut graph), 1);
        assert_eq!(
            graph.processes["mill"].unit.as_ref().and_then(|unit| unit.id.as_deref()),
            Some("kg")
        );
        assert_eq!(assign_reference_units(&mut graph), 0);
    }
}
