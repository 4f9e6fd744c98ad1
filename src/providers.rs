//! Default-provider link checker.
//!
//! Every input exchange of a product flow names the process expected to supply
//! it. Each such exchange runs through four stages and stops at the first one
//! that reports a defect:
//!
//! 1. the `defaultProvider` descriptor is complete,
//! 2. the provider resolves to a process in the graph,
//! 3. the provider has an exchange of the same flow,
//! 4. that exchange is an output of the provider.
//!
//! Stage 4 is a caveat rather than a strict invariant: a recycling process can
//! legitimately list a flow as both input and output, so only providers that
//! use the flow exclusively as an input are flagged.

use serde::Serialize;
use tracing::{debug, info};

use crate::graph::{Exchange, FlowType, Graph, Process};
use crate::report::{optional_cell, Sheet, TabularRecord};

pub const ISSUE_WITH_FLOW_PROVIDER_METADATA: &str = "issueWithFlowPrvMetadata";
pub const NO_MATCH_PROVIDER_TO_EXCHANGE: &str = "noMatchPrvToExc";
pub const NO_MATCH_EXCHANGE_IN_FOUND_PROVIDER: &str = "noMatchExcInFoundPrv";
pub const MATCH_EXCHANGE_FROM_PROVIDER_IS_INPUT: &str = "matchExcFromPrvIsInput";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMetadataDefect {
    #[serde(rename = "parentProcessID")]
    pub parent_process_id: String,
    #[serde(rename = "targetID")]
    pub target_id: Option<String>,
    #[serde(rename = "targetName")]
    pub target_name: Option<String>,
    #[serde(rename = "targetCat")]
    pub target_cat: Option<String>,
    #[serde(rename = "targetFT")]
    pub target_ft: Option<String>,
}

impl TabularRecord for ProviderMetadataDefect {
    fn columns() -> &'static [&'static str] {
        &["parentProcessID", "targetID", "targetName", "targetCat", "targetFT"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.parent_process_id.clone(),
            optional_cell(self.target_id.as_deref()),
            optional_cell(self.target_name.as_deref()),
            optional_cell(self.target_cat.as_deref()),
            optional_cell(self.target_ft.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingProviderDefect {
    #[serde(rename = "targetPrvID")]
    pub target_prv_id: Option<String>,
    #[serde(rename = "targetPrvName")]
    pub target_prv_name: Option<String>,
    #[serde(rename = "targetPrvCat")]
    pub target_prv_cat: Option<String>,
    #[serde(rename = "targetPrvFT")]
    pub target_prv_ft: Option<String>,
}

impl TabularRecord for MissingProviderDefect {
    fn columns() -> &'static [&'static str] {
        &["targetPrvID", "targetPrvName", "targetPrvCat", "targetPrvFT"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            optional_cell(self.target_prv_id.as_deref()),
            optional_cell(self.target_prv_name.as_deref()),
            optional_cell(self.target_prv_cat.as_deref()),
            optional_cell(self.target_prv_ft.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingReciprocalExchangeDefect {
    #[serde(rename = "parentProcessID")]
    pub parent_process_id: String,
    #[serde(rename = "targetID")]
    pub target_id: String,
    #[serde(rename = "foundPrvID")]
    pub found_prv_id: String,
}

impl TabularRecord for MissingReciprocalExchangeDefect {
    fn columns() -> &'static [&'static str] {
        &["parentProcessID", "targetID", "foundPrvID"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.parent_process_id.clone(),
            self.target_id.clone(),
            self.found_prv_id.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderExchangeIsInputDefect {
    #[serde(rename = "parentProcessID")]
    pub parent_process_id: String,
    #[serde(rename = "targetID")]
    pub target_id: String,
    #[serde(rename = "foundPrvID")]
    pub found_prv_id: String,
    #[serde(rename = "foundPrvExchID")]
    pub found_prv_exch_id: String,
}

impl TabularRecord for ProviderExchangeIsInputDefect {
    fn columns() -> &'static [&'static str] {
        &["parentProcessID", "targetID", "foundPrvID", "foundPrvExchID"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.parent_process_id.clone(),
            self.target_id.clone(),
            self.found_prv_id.clone(),
            self.found_prv_exch_id.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderDefect {
    Metadata(ProviderMetadataDefect),
    MissingProvider(MissingProviderDefect),
    MissingReciprocalExchange(MissingReciprocalExchangeDefect),
    ReciprocalIsInput(ProviderExchangeIsInputDefect),
}

impl ProviderDefect {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Metadata(_) => ISSUE_WITH_FLOW_PROVIDER_METADATA,
            Self::MissingProvider(_) => NO_MATCH_PROVIDER_TO_EXCHANGE,
            Self::MissingReciprocalExchange(_) => NO_MATCH_EXCHANGE_IN_FOUND_PROVIDER,
            Self::ReciprocalIsInput(_) => MATCH_EXCHANGE_FROM_PROVIDER_IS_INPUT,
        }
    }
}

/// Diagnostic counters for one checker run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderCheckStats {
    pub processes_scanned: usize,
    pub exchanges_checked: usize,
    pub skipped_not_input: usize,
    pub skipped_not_product_flow: usize,
    /// Input exchanges whose flow id is missing or not in the flow table.
    pub malformed_flows: usize,
    pub malformed_providers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderCheckReport {
    pub stats: ProviderCheckStats,
    #[serde(rename = "issueWithFlowPrvMetadata")]
    pub metadata: Vec<ProviderMetadataDefect>,
    #[serde(rename = "noMatchPrvToExc")]
    pub missing_provider: Vec<MissingProviderDefect>,
    #[serde(rename = "noMatchExcInFoundPrv")]
    pub missing_reciprocal: Vec<MissingReciprocalExchangeDefect>,
    #[serde(rename = "matchExcFromPrvIsInput")]
    pub reciprocal_is_input: Vec<ProviderExchangeIsInputDefect>,
}

impl ProviderCheckReport {
    pub fn defect_count(&self) -> usize {
        self.metadata.len()
            + self.missing_provider.len()
            + self.missing_reciprocal.len()
            + self.reciprocal_is_input.len()
    }

    fn record(&mut self, defect: ProviderDefect) {
        match defect {
            ProviderDefect::Metadata(defect) => self.metadata.push(defect),
            ProviderDefect::MissingProvider(defect) => self.missing_provider.push(defect),
            ProviderDefect::MissingReciprocalExchange(defect) => {
                self.missing_reciprocal.push(defect)
            }
            ProviderDefect::ReciprocalIsInput(defect) => self.reciprocal_is_input.push(defect),
        }
    }

    /// One sheet per category in stage order, empty categories included.
    pub fn to_sheets(&self) -> Vec<Sheet> {
        vec![
            Sheet::from_records(ISSUE_WITH_FLOW_PROVIDER_METADATA, &self.metadata),
            Sheet::from_records(NO_MATCH_PROVIDER_TO_EXCHANGE, &self.missing_provider),
            Sheet::from_records(NO_MATCH_EXCHANGE_IN_FOUND_PROVIDER, &self.missing_reciprocal),
            Sheet::from_records(MATCH_EXCHANGE_FROM_PROVIDER_IS_INPUT, &self.reciprocal_is_input),
        ]
    }
}

fn non_empty(value: Option<&str>) -> bool {
    value.map_or(false, |value| !value.is_empty())
}

fn resolve_provider<'a>(graph: &'a Graph, exchange: &Exchange) -> Option<&'a Process> {
    let provider_id = exchange.default_provider.as_ref()?.id.as_deref()?;
    graph.processes.get(provider_id)
}

/// Stage 1: the descriptor exists and carries non-empty `@id`, `name`,
/// `category` and `flowType` strings.
pub fn check_provider_metadata(
    parent_id: &str,
    exchange: &Exchange,
    graph: &Graph,
) -> Option<ProviderMetadataDefect> {
    let complete = exchange.default_provider.as_ref().map_or(false, |provider| {
        non_empty(provider.id.as_deref())
            && non_empty(provider.name.as_deref())
            && non_empty(provider.category.as_deref())
            && non_empty(provider.flow_type.as_deref())
    });
    if complete {
        return None;
    }
    let flow = graph.flow_of(exchange);
    Some(ProviderMetadataDefect {
        parent_process_id: parent_id.to_string(),
        target_id: exchange.flow.clone(),
        target_name: flow.and_then(|flow| flow.name.clone()),
        target_cat: flow.and_then(|flow| flow.category.clone()),
        target_ft: flow
            .and_then(|flow| flow.flow_type.as_ref())
            .map(|flow_type| flow_type.as_str().to_string()),
    })
}

/// Stage 2: the provider id names a process in the graph.
pub fn check_provider_exists(exchange: &Exchange, graph: &Graph) -> Option<MissingProviderDefect> {
    if resolve_provider(graph, exchange).is_some() {
        return None;
    }
    let provider = exchange.default_provider.as_ref();
    Some(MissingProviderDefect {
        target_prv_id: provider.and_then(|provider| provider.id.clone()),
        target_prv_name: provider.and_then(|provider| provider.name.clone()),
        target_prv_cat: provider.and_then(|provider| provider.category.clone()),
        target_prv_ft: provider.and_then(|provider| provider.flow_type.clone()),
    })
}

/// Stage 3: the resolved provider lists the flow being supplied. Passes when
/// the provider does not resolve; that is stage 2's finding.
pub fn check_reciprocal_exchange(
    parent_id: &str,
    exchange: &Exchange,
    graph: &Graph,
) -> Option<MissingReciprocalExchangeDefect> {
    let target_id = exchange.flow_id()?;
    let provider = resolve_provider(graph, exchange)?;
    let found = provider
        .exchanges
        .iter()
        .any(|candidate| candidate.flow_id() == Some(target_id));
    if found {
        return None;
    }
    Some(MissingReciprocalExchangeDefect {
        parent_process_id: parent_id.to_string(),
        target_id: target_id.to_string(),
        found_prv_id: provider.id.clone(),
    })
}

/// Stage 4: the provider's exchanges of the flow are not all inputs.
pub fn check_reciprocal_direction(
    parent_id: &str,
    exchange: &Exchange,
    graph: &Graph,
) -> Option<ProviderExchangeIsInputDefect> {
    let target_id = exchange.flow_id()?;
    let provider = resolve_provider(graph, exchange)?;
    let mut matching = provider
        .exchanges
        .iter()
        .filter(|candidate| candidate.flow_id() == Some(target_id))
        .peekable();
    matching.peek()?;
    if matching.any(Exchange::is_output) {
        return None;
    }
    Some(ProviderExchangeIsInputDefect {
        parent_process_id: parent_id.to_string(),
        target_id: target_id.to_string(),
        found_prv_id: provider.id.clone(),
        found_prv_exch_id: target_id.to_string(),
    })
}

/// Run the four stages for one exchange, stopping at the first defect.
pub fn check_exchange(parent_id: &str, exchange: &Exchange, graph: &Graph) -> Option<ProviderDefect> {
    if let Some(defect) = check_provider_metadata(parent_id, exchange, graph) {
        return Some(ProviderDefect::Metadata(defect));
    }
    if let Some(defect) = check_provider_exists(exchange, graph) {
        return Some(ProviderDefect::MissingProvider(defect));
    }
    if let Some(defect) = check_reciprocal_exchange(parent_id, exchange, graph) {
        return Some(ProviderDefect::MissingReciprocalExchange(defect));
    }
    check_reciprocal_direction(parent_id, exchange, graph).map(ProviderDefect::ReciprocalIsInput)
}

/// Check every input exchange of a product flow across the graph.
pub fn check_default_providers(graph: &Graph) -> ProviderCheckReport {
    let mut report = ProviderCheckReport::default();

    for (parent_id, process) in &graph.processes {
        report.stats.processes_scanned += 1;
        for exchange in &process.exchanges {
            if !exchange.is_input() {
                report.stats.skipped_not_input += 1;
                continue;
            }
            let Some(flow) = graph.flow_of(exchange) else {
                report.stats.malformed_flows += 1;
                continue;
            };
            if !flow.is_type(&FlowType::Product) {
                report.stats.skipped_not_product_flow += 1;
                continue;
            }

            report.stats.exchanges_checked += 1;
            if let Some(defect) = check_exchange(parent_id, exchange, graph) {
                if matches!(defect, ProviderDefect::Metadata(_)) {
                    report.stats.malformed_providers += 1;
                }
                debug!(
                    process_id = %parent_id,
                    flow_id = %flow.id,
                    category = defect.category(),
                    "provider link defect"
                );
                report.record(defect);
            }
        }
    }

    info!(
        processes = report.stats.processes_scanned,
        exchanges_checked = report.stats.exchanges_checked,
        skipped_not_input = report.stats.skipped_not_input,
        malformed_flows = report.stats.malformed_flows,
        malformed_providers = report.stats.malformed_providers,
        defects = report.defect_count(),
        "default provider check complete"
    );
    report
}
