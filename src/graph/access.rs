//! Read-only navigation over the graph. Optional fields read as `None`; only a
//! direct lookup of an unknown process or flow id is an error.

use super::{Exchange, Flow, FlowType, Graph, GraphError, Process, ProcessId};

impl Graph {
    pub fn process(&self, id: &str) -> Result<&Process, GraphError> {
        self.processes
            .get(id)
            .ok_or_else(|| GraphError::ProcessNotFound(id.to_string()))
    }

    pub fn process_mut(&mut self, id: &str) -> Result<&mut Process, GraphError> {
        self.processes
            .get_mut(id)
            .ok_or_else(|| GraphError::ProcessNotFound(id.to_string()))
    }

    pub fn flow(&self, id: &str) -> Result<&Flow, GraphError> {
        self.flows
            .get(id)
            .ok_or_else(|| GraphError::FlowNotFound(id.to_string()))
    }

    /// The table flow an exchange points at; `None` for a missing or dangling id.
    pub fn flow_of(&self, exchange: &Exchange) -> Option<&Flow> {
        exchange.flow_id().and_then(|id| self.flows.get(id))
    }

    pub fn flow_type_of(&self, exchange: &Exchange) -> Option<&FlowType> {
        self.flow_of(exchange)
            .and_then(|flow| flow.flow_type.as_ref())
    }

    /// Exchanges of `process_id` that reference `flow_id`.
    pub fn exchanges_with_flow<'a>(
        &'a self,
        process_id: &str,
        flow_id: &'a str,
    ) -> Result<impl Iterator<Item = &'a Exchange> + 'a, GraphError> {
        let process = self.process(process_id)?;
        Ok(process
            .exchanges
            .iter()
            .filter(move |exchange| exchange.flow_id() == Some(flow_id)))
    }

    pub fn physical_processes(&self) -> impl Iterator<Item = (&ProcessId, &Process)> {
        self.processes
            .iter()
            .filter(|(_, process)| process.is_physical())
    }

    pub fn location_name(&self, process_id: &str) -> Result<Option<&str>, GraphError> {
        let process = self.process(process_id)?;
        Ok(process
            .location
            .as_ref()
            .and_then(|location| location.record_name()))
    }

    /// True when any exchange in any process still points at `flow_id`.
    pub fn is_flow_referenced(&self, flow_id: &str) -> bool {
        self.processes
            .values()
            .flat_map(|process| process.exchanges.iter())
            .any(|exchange| exchange.flow_id() == Some(flow_id))
    }

    /// Output exchanges whose flow is a product flow.
    pub fn production_exchanges<'a>(
        &'a self,
        process: &'a Process,
    ) -> impl Iterator<Item = &'a Exchange> + 'a {
        process.exchanges.iter().filter(move |exchange| {
            exchange.is_output()
                && self
                    .flow_of(exchange)
                    .map_or(false, |flow| flow.is_type(&FlowType::Product))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{Exchange, Flow, FlowType, Graph, GraphError, Process, ProcessKind};

    fn sample() -> Graph {
        let mut graph = Graph::default();
        graph.insert_flow(Flow::new("steel", "steel", "metals", FlowType::Product));
        graph.insert_flow(Flow::new("slag", "slag", "waste", FlowType::Waste));
        graph.insert_process(
            Process::new("mill", "steel mill", ProcessKind::Process)
                .with_exchange(Exchange::new("steel", false, 1.0))
                .with_exchange(Exchange::new("slag", false, 0.2))
                .with_exchange(Exchange::new("ghost", true, 3.0)),
        );
        graph
    }

    #[test]
    fn unknown_process_is_a_contract_violation() {
        let graph = sample();
        assert_eq!(
            graph.process("nope").map(|_| ()),
            Err(GraphError::ProcessNotFound("nope".to_string()))
        );
    }

    #[test]
    fn dangling_flow_reads_as_none() {
        let graph = sample();
        let process = graph.process("mill").expect("mill exists");
        assert!(graph.flow_of(&process.exchanges[2]).is_none());
        assert_eq!(graph.production_exchanges(process).count(), 1);
    }

    #[test]
    fn exchanges_with_flow_filters_by_id() {
        let graph = sample();
        let found: Vec<_> = graph
            .exchanges_with_flow("mill", "slag")
            .expect("mill exists")
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(graph.location_name("mill"), Ok(None));
    }
}
