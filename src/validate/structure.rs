//! Structural scans over processes and exchanges: stale unit references,
//! production-exchange cardinality, location completeness, avoided inputs.

use serde::Serialize;
use tracing::info;

use crate::graph::{Graph, Process};
use crate::report::{optional_cell, TabularRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReferenceDefect {
    pub process_id: String,
    pub exchange_index: usize,
    pub flow_id: Option<String>,
    pub unit_id: String,
}

impl TabularRecord for UnitReferenceDefect {
    fn columns() -> &'static [&'static str] {
        &["process_id", "exchange_index", "flow_id", "unit_id"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.process_id.clone(),
            self.exchange_index.to_string(),
            optional_cell(self.flow_id.as_deref()),
            self.unit_id.clone(),
        ]
    }
}

/// Every exchange whose unit reference carries `unit_id`. Used to locate a
/// stale unit-group identifier before remapping it.
pub fn find_unit_references(graph: &Graph, unit_id: &str) -> Vec<UnitReferenceDefect> {
    let mut defects = Vec::new();
    for (process_id, process) in &graph.processes {
        for (index, exchange) in process.exchanges.iter().enumerate() {
            if exchange.unit_id() == Some(unit_id) {
                defects.push(UnitReferenceDefect {
                    process_id: process_id.clone(),
                    exchange_index: index,
                    flow_id: exchange.flow.clone(),
                    unit_id: unit_id.to_string(),
                });
            }
        }
    }
    info!(unit_id, found = defects.len(), "unit reference scan complete");
    defects
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionExchangeDetail {
    pub flow_id: Option<String>,
    pub flow_name: Option<String>,
    pub is_input: bool,
}

/// A physical process without exactly one production exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionExchangeDefect {
    pub process_id: String,
    pub process_name: Option<String>,
    pub production_exchanges: Vec<ProductionExchangeDetail>,
}

impl ProductionExchangeDefect {
    pub fn count(&self) -> usize {
        self.production_exchanges.len()
    }
}

impl TabularRecord for ProductionExchangeDefect {
    fn columns() -> &'static [&'static str] {
        &["process_id", "process_name", "production_exchange_count", "production_flows"]
    }

    fn cells(&self) -> Vec<String> {
        let flows = self
            .production_exchanges
            .iter()
            .map(|detail| {
                format!(
                    "{} (input={})",
                    detail.flow_name.as_deref().unwrap_or("Unknown"),
                    detail.is_input
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        vec![
            self.process_id.clone(),
            optional_cell(self.process_name.as_deref()),
            self.count().to_string(),
            flows,
        ]
    }
}

fn production_details(graph: &Graph, process: &Process) -> Vec<ProductionExchangeDetail> {
    graph
        .production_exchanges(process)
        .map(|exchange| {
            let flow = graph.flow_of(exchange);
            ProductionExchangeDetail {
                flow_id: exchange.flow.clone(),
                flow_name: flow.and_then(|flow| flow.name.clone()),
                is_input: exchange.is_input(),
            }
        })
        .collect()
}

/// Physical processes whose count of output product-flow exchanges is not one.
/// Pure: the matching unit copy lives in `repair::assign_reference_units`.
pub fn find_production_exchange_errors(graph: &Graph) -> Vec<ProductionExchangeDefect> {
    let defects: Vec<_> = graph
        .physical_processes()
        .filter_map(|(process_id, process)| {
            let details = production_details(graph, process);
            (details.len() != 1).then(|| ProductionExchangeDefect {
                process_id: process_id.clone(),
                process_name: process.name.clone(),
                production_exchanges: details,
            })
        })
        .collect();
    info!(found = defects.len(), "production exchange scan complete");
    defects
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationDefect {
    pub process_id: String,
    pub process_name: Option<String>,
    pub location: String,
}

impl TabularRecord for LocationDefect {
    fn columns() -> &'static [&'static str] {
        &["process_id", "process_name", "location"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.process_id.clone(),
            optional_cell(self.process_name.as_deref()),
            self.location.clone(),
        ]
    }
}

pub fn find_location_issues(graph: &Graph) -> Vec<LocationDefect> {
    let defects: Vec<_> = graph
        .physical_processes()
        .filter(|(_, process)| {
            !process
                .location
                .as_ref()
                .map_or(false, |location| location.is_named_record())
        })
        .map(|(process_id, process)| LocationDefect {
            process_id: process_id.clone(),
            process_name: process.name.clone(),
            location: process
                .location
                .as_ref()
                .map_or_else(|| "<missing>".to_string(), ToString::to_string),
        })
        .collect();
    info!(found = defects.len(), "location scan complete");
    defects
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvoidedProductInput {
    pub process_id: String,
    pub exchange_index: usize,
    pub flow_id: Option<String>,
}

impl TabularRecord for AvoidedProductInput {
    fn columns() -> &'static [&'static str] {
        &["process_id", "exchange_index", "flow_id"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.process_id.clone(),
            self.exchange_index.to_string(),
            optional_cell(self.flow_id.as_deref()),
        ]
    }
}

/// Input exchanges flagged as avoided products.
pub fn find_avoided_product_inputs(graph: &Graph) -> Vec<AvoidedProductInput> {
    graph
        .processes
        .iter()
        .flat_map(|(process_id, process)| {
            process
                .exchanges
                .iter()
                .enumerate()
                .filter(|(_, exchange)| {
                    exchange.is_input() && exchange.is_avoided_product.unwrap_or(false)
                })
                .map(move |(index, exchange)| AvoidedProductInput {
                    process_id: process_id.clone(),
                    exchange_index: index,
                    flow_id: exchange.flow.clone(),
                })
        })
        .collect()
}
