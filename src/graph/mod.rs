//! Strict LCI graph model: processes, exchanges, flows and allocation factors.
//!
//! The JSON-LD export is untyped and partially malformed; [`load`] converts it
//! once into these records and everything downstream (validators, provider
//! checker, repair pipeline) works on the typed model. Flows live in a single
//! table keyed by identifier and exchanges refer to them by id, so an edit made
//! through one exchange is observed by every exchange sharing the flow.

pub mod access;
pub mod export;
pub mod load;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

pub use load::{load_graph_dir, load_graph_file, LoadError, LoadReport};

pub type ProcessId = String;
pub type FlowId = String;

/// Contract violations: a caller asked for an entity by id and it is not there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("process not found: {0}")]
    ProcessNotFound(String),
    #[error("flow not found: {0}")]
    FlowNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowType {
    Product,
    Technosphere,
    Waste,
    Elementary,
    Other(String),
}

impl FlowType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PRODUCT_FLOW" => Self::Product,
            "TECHNOSPHERE_FLOW" => Self::Technosphere,
            "WASTE_FLOW" => Self::Waste,
            "ELEMENTARY_FLOW" => Self::Elementary,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Product => "PRODUCT_FLOW",
            Self::Technosphere => "TECHNOSPHERE_FLOW",
            Self::Waste => "WASTE_FLOW",
            Self::Elementary => "ELEMENTARY_FLOW",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocationType {
    Causal,
    Physical,
    Economic,
    NoAllocation,
    Other(String),
}

impl AllocationType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CAUSAL_ALLOCATION" => Self::Causal,
            "PHYSICAL_ALLOCATION" => Self::Physical,
            "ECONOMIC_ALLOCATION" => Self::Economic,
            "NO_ALLOCATION" => Self::NoAllocation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Causal => "CAUSAL_ALLOCATION",
            Self::Physical => "PHYSICAL_ALLOCATION",
            Self::Economic => "ECONOMIC_ALLOCATION",
            Self::NoAllocation => "NO_ALLOCATION",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for AllocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `type` tag of a process. `emission` and `product` entries are not
/// physical unit processes and are left out of cardinality and location work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    Process,
    Emission,
    Product,
    Multifunctional,
    Other(String),
}

impl ProcessKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "process" => Self::Process,
            "emission" => Self::Emission,
            "product" => Self::Product,
            "multifunctional" => Self::Multifunctional,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Process => "process",
            Self::Emission => "emission",
            Self::Product => "product",
            Self::Multifunctional => "multifunctional",
            Self::Other(raw) => raw,
        }
    }
}

/// Reference descriptor (`{@id, name, category, flowType}`) used for units,
/// default providers and allocation targets. Keys whose value is not a string
/// stay in `extra`, so the typed field reads as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub flow_type: Option<String>,
    pub extra: Map<String, Value>,
}

impl Reference {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationRecord {
    pub id: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub extra: Map<String, Value>,
}

/// A location as found in the export: a structured record, a bare string,
/// an explicit null, or some other stray JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Record(LocationRecord),
    Text(String),
    Null,
    Other(Value),
}

impl Location {
    /// Structured record carrying a non-empty `name`.
    pub fn is_named_record(&self) -> bool {
        self.record_name().is_some()
    }

    pub fn record_name(&self) -> Option<&str> {
        match self {
            Self::Record(record) => record
                .name
                .as_deref()
                .filter(|name| !name.trim().is_empty()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(record) => write!(
                f,
                "{{id: {}, name: {}}}",
                record.id.as_deref().unwrap_or("-"),
                record.name.as_deref().unwrap_or("-")
            ),
            Self::Text(text) => write!(f, "{text}"),
            Self::Null => write!(f, "null"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub id: FlowId,
    pub name: Option<String>,
    pub category: Option<String>,
    pub flow_type: Option<FlowType>,
    /// Direction flag written by waste reclassification; absent on fresh exports.
    pub input: Option<bool>,
    pub extra: Map<String, Value>,
}

impl Flow {
    pub fn new(id: impl Into<String>, name: &str, category: &str, flow_type: FlowType) -> Self {
        Self {
            id: id.into(),
            name: Some(name.to_string()),
            category: Some(category.to_string()),
            flow_type: Some(flow_type),
            input: None,
            extra: Map::new(),
        }
    }

    pub fn is_type(&self, flow_type: &FlowType) -> bool {
        self.flow_type.as_ref() == Some(flow_type)
    }

    pub fn is_input(&self) -> bool {
        self.input.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exchange {
    pub input: Option<bool>,
    /// Legacy `isInput` key; folded into `input` by the repair pipeline.
    pub is_input_alias: Option<bool>,
    pub amount: Option<f64>,
    pub is_quantitative_reference: Option<bool>,
    pub is_avoided_product: Option<bool>,
    pub flow: Option<FlowId>,
    pub unit: Option<Reference>,
    pub location: Option<Location>,
    pub default_provider: Option<Reference>,
    /// Keys of the embedded flow reference that the flow table does not own,
    /// such as `refUnit`.
    pub flow_extra: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl Exchange {
    pub fn new(flow_id: impl Into<String>, input: bool, amount: f64) -> Self {
        Self {
            input: Some(input),
            amount: Some(amount),
            flow: Some(flow_id.into()),
            ..Self::default()
        }
    }

    /// Direction, reading the canonical key first and the legacy alias second.
    pub fn is_input(&self) -> bool {
        self.input.or(self.is_input_alias).unwrap_or(false)
    }

    pub fn is_output(&self) -> bool {
        !self.is_input()
    }

    pub fn is_quantitative_reference(&self) -> bool {
        self.is_quantitative_reference.unwrap_or(false)
    }

    pub fn flow_id(&self) -> Option<&str> {
        self.flow.as_deref()
    }

    pub fn unit_id(&self) -> Option<&str> {
        self.unit.as_ref().and_then(|unit| unit.id.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationExchange {
    pub flow: Option<Reference>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationFactor {
    pub allocation_type: Option<AllocationType>,
    pub product: Option<Reference>,
    /// Only meaningful for causal allocation.
    pub exchange: Option<AllocationExchange>,
    pub value: Option<f64>,
    pub extra: Map<String, Value>,
}

impl AllocationFactor {
    pub fn product_id(&self) -> Option<&str> {
        self.product.as_ref().and_then(|product| product.id.as_deref())
    }

    pub fn exchange_flow_id(&self) -> Option<&str> {
        self.exchange
            .as_ref()
            .and_then(|exchange| exchange.flow.as_ref())
            .and_then(|flow| flow.id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub id: ProcessId,
    pub name: Option<String>,
    pub kind: Option<ProcessKind>,
    pub location: Option<Location>,
    pub exchanges: Vec<Exchange>,
    pub allocation_factors: Vec<AllocationFactor>,
    /// Non-object `exchanges` entries, written back verbatim after the typed ones.
    pub unparsed_exchanges: Vec<Value>,
    pub unparsed_allocation_factors: Vec<Value>,
    pub default_allocation_method: Option<AllocationType>,
    /// Reference unit, copied from the lone production exchange on request.
    pub unit: Option<Reference>,
    pub extra: Map<String, Value>,
}

impl Process {
    pub fn new(id: impl Into<String>, name: &str, kind: ProcessKind) -> Self {
        Self {
            id: id.into(),
            name: Some(name.to_string()),
            kind: Some(kind),
            location: None,
            exchanges: Vec::new(),
            allocation_factors: Vec::new(),
            unparsed_exchanges: Vec::new(),
            unparsed_allocation_factors: Vec::new(),
            default_allocation_method: None,
            unit: None,
            extra: Map::new(),
        }
    }

    pub fn with_exchange(mut self, exchange: Exchange) -> Self {
        self.exchanges.push(exchange);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Everything except `emission` and `product` entries. An untagged process
    /// counts as physical.
    pub fn is_physical(&self) -> bool {
        !matches!(
            self.kind,
            Some(ProcessKind::Emission) | Some(ProcessKind::Product)
        )
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }
}

/// Product records kept alongside the graph for reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: Option<String>,
    pub name: Option<String>,
    pub location: Option<Location>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub processes: BTreeMap<ProcessId, Process>,
    pub flows: BTreeMap<FlowId, Flow>,
    pub products: Vec<Product>,
    /// Non-object `products` entries, kept for export.
    pub unparsed_products: Vec<Value>,
}

impl Graph {
    pub fn insert_flow(&mut self, flow: Flow) {
        self.flows.insert(flow.id.clone(), flow);
    }

    pub fn insert_process(&mut self, process: Process) {
        self.processes.insert(process.id.clone(), process);
    }

    pub fn exchange_count(&self) -> usize {
        self.processes
            .values()
            .map(|process| process.exchanges.len())
            .sum()
    }
}
