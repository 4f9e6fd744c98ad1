//! Serialise a [`Graph`] back into the export's JSON shape. Each exchange
//! embeds a reference to its flow taken from the shared flow table, so edits
//! made by the repair pipeline show up wherever the flow is used.

use serde_json::{Map, Value};

use super::{
    AllocationFactor, Exchange, Flow, Graph, Location, LocationRecord, Process, Product, Reference,
};

impl Graph {
    pub fn to_value(&self) -> Value {
        let processes: Map<String, Value> = self
            .processes
            .iter()
            .map(|(id, process)| (id.clone(), self.process_to_value(process)))
            .collect();
        let flows: Map<String, Value> = self
            .flows
            .iter()
            .map(|(id, flow)| (id.clone(), flow_to_value(flow)))
            .collect();
        let products: Vec<Value> = self
            .products
            .iter()
            .map(product_to_value)
            .chain(self.unparsed_products.iter().cloned())
            .collect();

        let mut root = Map::new();
        root.insert("processes".to_string(), Value::Object(processes));
        root.insert("flows".to_string(), Value::Object(flows));
        root.insert("products".to_string(), Value::Array(products));
        Value::Object(root)
    }

    fn process_to_value(&self, process: &Process) -> Value {
        let mut map = process.extra.clone();
        map.insert("@id".to_string(), Value::String(process.id.clone()));
        insert_str(&mut map, "name", process.name.as_deref());
        insert_str(&mut map, "type", process.kind.as_ref().map(|kind| kind.as_str()));
        if let Some(location) = &process.location {
            map.insert("location".to_string(), location_to_value(location));
        }
        insert_str(
            &mut map,
            "defaultAllocationMethod",
            process
                .default_allocation_method
                .as_ref()
                .map(|method| method.as_str()),
        );
        if let Some(unit) = &process.unit {
            map.insert("unit".to_string(), reference_to_value(unit));
        }
        if !process.exchanges.is_empty()
            || !process.unparsed_exchanges.is_empty()
            || !map.contains_key("exchanges")
        {
            let exchanges = process
                .exchanges
                .iter()
                .map(|exchange| self.exchange_to_value(exchange))
                .chain(process.unparsed_exchanges.iter().cloned())
                .collect();
            map.insert("exchanges".to_string(), Value::Array(exchanges));
        }
        if !process.allocation_factors.is_empty() || !process.unparsed_allocation_factors.is_empty()
        {
            let factors = process
                .allocation_factors
                .iter()
                .map(allocation_factor_to_value)
                .chain(process.unparsed_allocation_factors.iter().cloned())
                .collect();
            map.insert("allocationFactors".to_string(), Value::Array(factors));
        }
        Value::Object(map)
    }

    fn exchange_to_value(&self, exchange: &Exchange) -> Value {
        let mut map = exchange.extra.clone();
        insert_bool(&mut map, "input", exchange.input);
        insert_bool(&mut map, "isInput", exchange.is_input_alias);
        if let Some(amount) = exchange.amount {
            map.insert("amount".to_string(), Value::from(amount));
        }
        insert_bool(
            &mut map,
            "isQuantitativeReference",
            exchange.is_quantitative_reference,
        );
        insert_bool(&mut map, "isAvoidedProduct", exchange.is_avoided_product);
        if let Some(flow_id) = exchange.flow_id() {
            let reference = match self.flows.get(flow_id) {
                Some(flow) => flow_reference_value(flow, &exchange.flow_extra),
                None => {
                    let mut dangling = exchange.flow_extra.clone();
                    dangling.insert("@id".to_string(), Value::String(flow_id.to_string()));
                    Value::Object(dangling)
                }
            };
            map.insert("flow".to_string(), reference);
        }
        if let Some(unit) = &exchange.unit {
            map.insert("unit".to_string(), reference_to_value(unit));
        }
        if let Some(location) = &exchange.location {
            map.insert("location".to_string(), location_to_value(location));
        }
        if let Some(provider) = &exchange.default_provider {
            map.insert("defaultProvider".to_string(), reference_to_value(provider));
        }
        Value::Object(map)
    }
}

fn insert_str(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn insert_bool(map: &mut Map<String, Value>, key: &str, value: Option<bool>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::Bool(value));
    }
}

pub(crate) fn reference_to_value(reference: &Reference) -> Value {
    let mut map = reference.extra.clone();
    insert_str(&mut map, "@id", reference.id.as_deref());
    insert_str(&mut map, "name", reference.name.as_deref());
    insert_str(&mut map, "category", reference.category.as_deref());
    insert_str(&mut map, "flowType", reference.flow_type.as_deref());
    Value::Object(map)
}

pub(crate) fn location_to_value(location: &Location) -> Value {
    match location {
        Location::Record(record) => location_record_to_value(record),
        Location::Text(text) => Value::String(text.clone()),
        Location::Null => Value::Null,
        Location::Other(value) => value.clone(),
    }
}

fn location_record_to_value(record: &LocationRecord) -> Value {
    let mut map = record.extra.clone();
    insert_str(&mut map, "@id", record.id.as_deref());
    insert_str(&mut map, "@type", record.kind.as_deref());
    insert_str(&mut map, "name", record.name.as_deref());
    Value::Object(map)
}

fn flow_to_value(flow: &Flow) -> Value {
    let mut map = flow.extra.clone();
    map.insert("@id".to_string(), Value::String(flow.id.clone()));
    insert_str(&mut map, "name", flow.name.as_deref());
    insert_str(&mut map, "category", flow.category.as_deref());
    insert_str(
        &mut map,
        "flowType",
        flow.flow_type.as_ref().map(|flow_type| flow_type.as_str()),
    );
    insert_bool(&mut map, "input", flow.input);
    Value::Object(map)
}

/// The short form embedded in exchanges: the exchange's own reference keys
/// (`refUnit` and the like) overlaid with the table's identity and the fields
/// the downstream strategies read.
fn flow_reference_value(flow: &Flow, embedded: &Map<String, Value>) -> Value {
    let mut map = embedded.clone();
    if let Some(kind) = flow.extra.get("@type") {
        map.insert("@type".to_string(), kind.clone());
    }
    map.insert("@id".to_string(), Value::String(flow.id.clone()));
    insert_str(&mut map, "name", flow.name.as_deref());
    insert_str(&mut map, "category", flow.category.as_deref());
    insert_str(
        &mut map,
        "flowType",
        flow.flow_type.as_ref().map(|flow_type| flow_type.as_str()),
    );
    insert_bool(&mut map, "input", flow.input);
    Value::Object(map)
}

fn allocation_factor_to_value(factor: &AllocationFactor) -> Value {
    let mut map = factor.extra.clone();
    insert_str(
        &mut map,
        "allocationType",
        factor
            .allocation_type
            .as_ref()
            .map(|allocation_type| allocation_type.as_str()),
    );
    if let Some(product) = &factor.product {
        map.insert("product".to_string(), reference_to_value(product));
    }
    if let Some(exchange) = &factor.exchange {
        let mut exchange_map = exchange.extra.clone();
        if let Some(flow) = &exchange.flow {
            exchange_map.insert("flow".to_string(), reference_to_value(flow));
        }
        map.insert("exchange".to_string(), Value::Object(exchange_map));
    }
    if let Some(value) = factor.value {
        map.insert("value".to_string(), Value::from(value));
    }
    Value::Object(map)
}

fn product_to_value(product: &Product) -> Value {
    let mut map = product.extra.clone();
    insert_str(&mut map, "@id", product.id.as_deref());
    insert_str(&mut map, "name", product.name.as_deref());
    if let Some(location) = &product.location {
        map.insert("location".to_string(), location_to_value(location));
    }
    Value::Object(map)
}
