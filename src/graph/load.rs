//! Deserialization boundary: untyped JSON export -> strict [`Graph`].
//!
//! Accepts a single document `{processes, flows, products}` (processes and
//! flows either keyed by id or as arrays) or a directory holding
//! `processes/*.json`, `flows/*.json` and an optional `products.json`.
//! Malformed records are counted in [`LoadReport`] and skipped or preserved
//! verbatim; they never abort the load.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{
    AllocationExchange, AllocationFactor, AllocationType, Exchange, Flow, FlowId, FlowType,
    Graph, Location, LocationRecord, Process, ProcessKind, Product, Reference,
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read graph source '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse graph JSON '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected graph shape: {0}")]
    Shape(String),
}

/// Counts gathered while converting the export. Malformed entries are
/// reported here rather than failing the load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub processes: usize,
    pub flows: usize,
    pub products: usize,
    pub exchanges: usize,
    pub malformed_processes: usize,
    pub malformed_products: usize,
    pub malformed_exchanges: usize,
    pub malformed_flows: usize,
    pub flows_without_id: usize,
    pub malformed_providers: usize,
    pub malformed_allocation_factors: usize,
    pub embedded_flows_added: usize,
}

impl LoadReport {
    pub fn malformed_total(&self) -> usize {
        self.malformed_processes
            + self.malformed_products
            + self.malformed_exchanges
            + self.malformed_flows
            + self.flows_without_id
            + self.malformed_providers
            + self.malformed_allocation_factors
    }
}

impl Graph {
    pub fn from_value(value: &Value) -> Result<(Graph, LoadReport), LoadError> {
        let root = value
            .as_object()
            .ok_or_else(|| LoadError::Shape("expected top-level JSON object".to_string()))?;

        let mut report = LoadReport::default();
        let mut graph = Graph::default();

        for (id_hint, entry) in keyed_entries(root.get("flows")) {
            match entry.as_object() {
                Some(object) => match flow_from_object(object, id_hint.as_deref()) {
                    Some(flow) => {
                        graph.flows.insert(flow.id.clone(), flow);
                    }
                    None => report.flows_without_id += 1,
                },
                None => report.malformed_flows += 1,
            }
        }

        for (id_hint, entry) in keyed_entries(root.get("processes")) {
            let Some(object) = entry.as_object() else {
                report.malformed_processes += 1;
                continue;
            };
            match parse_process(object, id_hint.as_deref(), &mut graph.flows, &mut report) {
                Some(process) => {
                    graph.processes.insert(process.id.clone(), process);
                }
                None => report.malformed_processes += 1,
            }
        }

        if let Some(products) = root.get("products").and_then(Value::as_array) {
            for entry in products {
                match entry.as_object() {
                    Some(object) => graph.products.push(parse_product(object)),
                    None => {
                        report.malformed_products += 1;
                        graph.unparsed_products.push(entry.clone());
                    }
                }
            }
        }

        report.processes = graph.processes.len();
        report.flows = graph.flows.len();
        report.products = graph.products.len();
        report.exchanges = graph.exchange_count();

        if report.malformed_total() > 0 {
            warn!(
                malformed_processes = report.malformed_processes,
                malformed_products = report.malformed_products,
                malformed_exchanges = report.malformed_exchanges,
                malformed_flows = report.malformed_flows,
                flows_without_id = report.flows_without_id,
                malformed_providers = report.malformed_providers,
                malformed_allocation_factors = report.malformed_allocation_factors,
                "skipped malformed records while loading graph"
            );
        }
        info!(
            processes = report.processes,
            flows = report.flows,
            exchanges = report.exchanges,
            products = report.products,
            "graph loaded"
        );

        Ok((graph, report))
    }
}

pub fn load_graph_file(path: &Path) -> Result<(Graph, LoadReport), LoadError> {
    let value = read_json(path)?;
    Graph::from_value(&value)
}

/// Load an export laid out as `processes/*.json`, `flows/*.json` and an
/// optional `products.json` array. Entries are keyed by file stem unless the
/// document carries its own `@id`.
pub fn load_graph_dir(dir: &Path) -> Result<(Graph, LoadReport), LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::Shape(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }

    let mut root = Map::new();
    root.insert(
        "processes".to_string(),
        Value::Object(read_entry_dir(&dir.join("processes"))?),
    );
    root.insert(
        "flows".to_string(),
        Value::Object(read_entry_dir(&dir.join("flows"))?),
    );

    let products_path = dir.join("products.json");
    if products_path.is_file() {
        root.insert("products".to_string(), read_json(&products_path)?);
    }

    Graph::from_value(&Value::Object(root))
}

fn read_json(path: &Path) -> Result<Value, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_entry_dir(dir: &Path) -> Result<Map<String, Value>, LoadError> {
    let mut entries = Map::new();
    if !dir.is_dir() {
        return Ok(entries);
    }

    let read_err = |source| LoadError::Read {
        path: dir.display().to_string(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.extension().map_or(false, |ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let value = read_json(&path)?;
        let key = value
            .get("@id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        entries.insert(key, value);
    }
    Ok(entries)
}

/// Entries of a collection given either as `{id: entry}` or `[entry, ...]`.
fn keyed_entries(collection: Option<&Value>) -> Vec<(Option<String>, &Value)> {
    match collection {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| (Some(key.clone()), value))
            .collect(),
        Some(Value::Array(items)) => items.iter().map(|value| (None, value)).collect(),
        _ => Vec::new(),
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !matches!(map.get(key), Some(Value::String(_))) {
        return None;
    }
    match map.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

fn take_bool(map: &mut Map<String, Value>, key: &str) -> Option<bool> {
    let value = map.get(key).and_then(Value::as_bool)?;
    map.remove(key);
    Some(value)
}

fn take_f64(map: &mut Map<String, Value>, key: &str) -> Option<f64> {
    let value = map.get(key).and_then(Value::as_f64)?;
    map.remove(key);
    Some(value)
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    if !matches!(map.get(key), Some(Value::Object(_))) {
        return None;
    }
    match map.remove(key) {
        Some(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn take_reference(map: &mut Map<String, Value>, key: &str) -> Option<Reference> {
    take_object(map, key).map(parse_reference)
}

fn parse_reference(mut map: Map<String, Value>) -> Reference {
    Reference {
        id: take_string(&mut map, "@id"),
        name: take_string(&mut map, "name"),
        category: take_string(&mut map, "category"),
        flow_type: take_string(&mut map, "flowType"),
        extra: map,
    }
}

pub(crate) fn parse_location(value: Value) -> Location {
    match value {
        Value::Object(mut map) => Location::Record(LocationRecord {
            id: take_string(&mut map, "@id"),
            kind: take_string(&mut map, "@type"),
            name: take_string(&mut map, "name"),
            extra: map,
        }),
        Value::String(text) => Location::Text(text),
        Value::Null => Location::Null,
        other => Location::Other(other),
    }
}

fn flow_from_object(object: &Map<String, Value>, id_hint: Option<&str>) -> Option<Flow> {
    let mut map = object.clone();
    let id = take_string(&mut map, "@id").or_else(|| id_hint.map(str::to_string))?;
    Some(Flow {
        id,
        name: take_string(&mut map, "name"),
        category: take_string(&mut map, "category"),
        flow_type: take_string(&mut map, "flowType").map(|raw| FlowType::parse(&raw)),
        input: take_bool(&mut map, "input"),
        extra: map,
    })
}

fn parse_process(
    object: &Map<String, Value>,
    id_hint: Option<&str>,
    flows: &mut BTreeMap<FlowId, Flow>,
    report: &mut LoadReport,
) -> Option<Process> {
    let mut map = object.clone();
    let id = take_string(&mut map, "@id").or_else(|| id_hint.map(str::to_string))?;

    let mut exchanges = Vec::new();
    let mut unparsed_exchanges = Vec::new();
    match map.remove("exchanges") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Object(exchange) => {
                        exchanges.push(parse_exchange(exchange, flows, report));
                    }
                    other => {
                        report.malformed_exchanges += 1;
                        unparsed_exchanges.push(other);
                    }
                }
            }
        }
        Some(other) => {
            report.malformed_exchanges += 1;
            map.insert("exchanges".to_string(), other);
        }
        None => {}
    }

    let mut allocation_factors = Vec::new();
    let mut unparsed_allocation_factors = Vec::new();
    match map.remove("allocationFactors") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Object(factor) => allocation_factors.push(parse_allocation_factor(factor)),
                    other => {
                        report.malformed_allocation_factors += 1;
                        unparsed_allocation_factors.push(other);
                    }
                }
            }
        }
        Some(other) => {
            report.malformed_allocation_factors += 1;
            map.insert("allocationFactors".to_string(), other);
        }
        None => {}
    }

    Some(Process {
        id,
        name: take_string(&mut map, "name"),
        kind: take_string(&mut map, "type").map(|raw| ProcessKind::parse(&raw)),
        location: map.remove("location").map(parse_location),
        exchanges,
        allocation_factors,
        unparsed_exchanges,
        unparsed_allocation_factors,
        default_allocation_method: take_string(&mut map, "defaultAllocationMethod")
            .map(|raw| AllocationType::parse(&raw)),
        unit: take_reference(&mut map, "unit"),
        extra: map,
    })
}

/// Keys of an embedded flow reference that the flow table is authoritative for.
const FLOW_TABLE_KEYS: &[&str] = &["@id", "name", "category", "flowType", "input"];

fn parse_exchange(
    mut map: Map<String, Value>,
    flows: &mut BTreeMap<FlowId, Flow>,
    report: &mut LoadReport,
) -> Exchange {
    let mut flow_extra = Map::new();
    let flow = match map.remove("flow") {
        Some(Value::Object(embedded)) => match flow_from_object(&embedded, None) {
            Some(flow) => {
                let id = flow.id.clone();
                flow_extra = embedded;
                for owned in FLOW_TABLE_KEYS {
                    flow_extra.remove(*owned);
                }
                if !flows.contains_key(&id) {
                    report.embedded_flows_added += 1;
                    flows.insert(id.clone(), flow);
                }
                Some(id)
            }
            None => {
                report.flows_without_id += 1;
                map.insert("flow".to_string(), Value::Object(embedded));
                None
            }
        },
        Some(Value::Null) | None => None,
        Some(other) => {
            report.malformed_flows += 1;
            map.insert("flow".to_string(), other);
            None
        }
    };

    let default_provider = match map.remove("defaultProvider") {
        Some(Value::Object(provider)) => Some(parse_reference(provider)),
        Some(Value::Null) | None => None,
        Some(other) => {
            report.malformed_providers += 1;
            map.insert("defaultProvider".to_string(), other);
            None
        }
    };

    Exchange {
        input: take_bool(&mut map, "input"),
        is_input_alias: take_bool(&mut map, "isInput"),
        amount: take_f64(&mut map, "amount"),
        is_quantitative_reference: take_bool(&mut map, "isQuantitativeReference"),
        is_avoided_product: take_bool(&mut map, "isAvoidedProduct"),
        flow,
        unit: take_reference(&mut map, "unit"),
        location: map.remove("location").map(parse_location),
        default_provider,
        flow_extra,
        extra: map,
    }
}

fn parse_allocation_factor(mut map: Map<String, Value>) -> AllocationFactor {
    let exchange = take_object(&mut map, "exchange").map(|mut exchange| AllocationExchange {
        flow: take_reference(&mut exchange, "flow"),
        extra: exchange,
    });
    AllocationFactor {
        allocation_type: take_string(&mut map, "allocationType")
            .map(|raw| AllocationType::parse(&raw)),
        product: take_reference(&mut map, "product"),
        exchange,
        value: take_f64(&mut map, "value"),
        extra: map,
    }
}

fn parse_product(object: &Map<String, Value>) -> Product {
    let mut map = object.clone();
    Product {
        id: take_string(&mut map, "@id").or_else(|| take_string(&mut map, "code")),
        name: take_string(&mut map, "name"),
        location: map.remove("location").map(parse_location),
        extra: map,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embedded_flows_fold_into_the_flow_table() {
        let payload = json!({
            "flows": {
                "f1": {"@id": "f1", "name": "steel", "category": "metals", "flowType": "PRODUCT_FLOW"}
            },
            "processes": {
                "p1": {
                    "name": "rolling",
                    "type": "process",
                    "exchanges": [
                        {"isInput": false, "amount": 1.0, "flow": {"@id": "f1", "name": "stale name"}},
                        {"input": true, "amount": 2.0, "flow": {"@id": "f2", "name": "power", "flowType": "PRODUCT_FLOW"}}
                    ]
                }
            }
        });

        let (graph, report) = Graph::from_value(&payload).expect("graph should load");
        assert_eq!(report.embedded_flows_added, 1);
        assert_eq!(graph.flows["f1"].name.as_deref(), Some("steel"));
        assert_eq!(graph.flows["f2"].flow_type, Some(FlowType::Product));
        let process = &graph.processes["p1"];
        assert_eq!(process.exchanges[0].is_input_alias, Some(false));
        assert_eq!(process.exchanges[1].flow_id(), Some("f2"));
    }

    #[test]
    fn malformed_entries_are_counted_not_fatal() {
        let payload = json!({
            "processes": [
                {"@id": "p1", "exchanges": [7, {"flow": "not-an-object"}, {"flow": {"name": "no id"}}, {"defaultProvider": []}]},
                "junk",
                {"name": "missing id"}
            ]
        });

        let (graph, report) = Graph::from_value(&payload).expect("graph should load");
        assert_eq!(graph.processes.len(), 1);
        assert_eq!(report.malformed_processes, 2);
        assert_eq!(report.malformed_exchanges, 1);
        assert_eq!(report.malformed_flows, 1);
        assert_eq!(report.flows_without_id, 1);
        assert_eq!(report.malformed_providers, 1);
        assert_eq!(graph.processes["p1"].exchanges.len(), 3);
    }

    #[test]
    fn non_string_reference_fields_read_as_missing() {
        let payload = json!({
            "processes": {
                "p1": {"exchanges": [{"defaultProvider": {"@id": "p2", "name": 42}}]}
            }
        });
        let (graph, _) = Graph::from_value(&payload).expect("graph should load");
        let provider = graph.processes["p1"].exchanges[0]
            .default_provider
            .as_ref()
            .expect("provider should parse");
        assert_eq!(provider.id.as_deref(), Some("p2"));
        assert_eq!(provider.name, None);
        assert_eq!(provider.extra.get("name"), Some(&json!(42)));
    }

    #[test]
    fn top_level_array_is_rejected() {
        let err = Graph::from_value(&json!([])).expect_err("array root should fail");
        assert!(matches!(err, LoadError::Shape(_)));
    }
}
