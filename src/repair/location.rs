//! Location repairs for processes, exchanges and products.

use tracing::{debug, info};

use crate::graph::{Graph, Location, LocationRecord};

const FIX_SAMPLE_EVERY: usize = 1000;

/// Replace the location of every physical process that lacks a named record.
pub fn backfill_process_locations(graph: &mut Graph, default: &LocationRecord) -> usize {
    let mut changed = 0;
    for process in graph
        .processes
        .values_mut()
        .filter(|process| process.is_physical())
    {
        let named = process
            .location
            .as_ref()
            .map_or(false, Location::is_named_record);
        if named {
            continue;
        }
        debug!(
            process_id = %process.id,
            previous = ?process.location,
            "process location backfilled"
        );
        process.location = Some(Location::Record(default.clone()));
        changed += 1;
    }
    info!(changed, "process location backfill complete");
    changed
}

/// Copy the parent process's location onto exchanges whose location is
/// missing or not a string. Processes without a location of their own are
/// skipped.
pub fn inherit_exchange_locations(graph: &mut Graph) -> usize {
    let mut changed = 0;
    let mut skipped_processes = 0;
    for process in graph.processes.values_mut() {
        let parent = match &process.location {
            None | Some(Location::Null) => {
                skipped_processes += 1;
                continue;
            }
            Some(location) => location.clone(),
        };
        for exchange in &mut process.exchanges {
            if matches!(exchange.location, Some(Location::Text(_))) {
                continue;
            }
            if exchange.location.as_ref() == Some(&parent) {
                continue;
            }
            let previous = exchange.location.replace(parent.clone());
            changed += 1;
            if changed % FIX_SAMPLE_EVERY == 0 {
                debug!(
                    fix = changed,
                    process_id = %process.id,
                    previous = ?previous,
                    parent = %parent,
                    "exchange location inherited"
                );
            }
        }
    }
    info!(changed, skipped_processes, "exchange location inheritance complete");
    changed
}

fn to_sentinel(location: &mut Option<Location>, sentinel: &str) -> bool {
    if matches!(location, Some(Location::Text(_))) {
        return false;
    }
    *location = Some(Location::Text(sentinel.to_string()));
    true
}

/// Replace every non-string location on processes, their exchanges and
/// products with `sentinel`, for consumers that only accept string locations.
pub fn normalize_locations_for_export(graph: &mut Graph, sentinel: &str) -> usize {
    let mut changed = 0;
    for process in graph.processes.values_mut() {
        changed += usize::from(to_sentinel(&mut process.location, sentinel));
        for exchange in &mut process.exchanges {
            changed += usize::from(to_sentinel(&mut exchange.location, sentinel));
        }
    }
    for product in &mut graph.products {
        changed += usize::from(to_sentinel(&mut product.location, sentinel));
    }
    info!(changed, sentinel, "location export normalization complete");
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Exchange, Process, ProcessKind, Product};

    fn record(name: &str) -> LocationRecord {
        LocationRecord {
            id: Some("loc".to_string()),
            kind: Some("Location".to_string()),
            name: Some(name.to_string()),
            ..LocationRecord::default()
        }
    }

    #[test]
    fn exchange_text_locations_are_kept() {
        let mut graph = Graph::default();
        let mut text = Exchange::new("a", true, 1.0);
        text.location = Some(Location::Text("CA".to_string()));
        graph.insert_process(
            Process::new("p", "p", ProcessKind::Process)
                .with_location(Location::Record(record("Canada")))
                .with_exchange(text)
                .with_exchange(Exchange::new("b", true, 1.0)),
        );

        assert_eq!(inherit_exchange_locations(&mut graph), 1);
        let exchanges = &graph.processes["p"].exchanges;
        assert_eq!(exchanges[0].location, Some(Location::Text("CA".to_string())));
        assert_eq!(exchanges[1].location, Some(Location::Record(record("Canada"))));
        assert_eq!(inherit_exchange_locations(&mut graph), 0);
    }

    #[test]
    fn parentless_exchanges_are_left_alone() {
        let mut graph = Graph::default();
        graph.insert_process(
            Process::new("p", "p", ProcessKind::Process).with_exchange(Exchange::new("a", true, 1.0)),
        );

        assert_eq!(inherit_exchange_locations(&mut graph), 0);
        assert_eq!(graph.processes["p"].exchanges[0].location, None);
    }

    #[test]
    fn export_normalization_covers_products() {
        let mut graph = Graph::default();
        graph.insert_process(
            Process::new("p", "p", ProcessKind::Emission)
                .with_location(Location::Record(record("US"))),
        );
        graph.products.push(Product::default());
        graph.products.push(Product {
            location: Some(Location::Text("GLO".to_string())),
            ..Product::default()
        });

        assert_eq!(normalize_locations_for_export(&mut graph, "no location"), 2);
        assert_eq!(
            graph.processes["p"].location,
            Some(Location::Text("no location".to_string()))
        );
        assert_eq!(graph.products[1].location, Some(Location::Text("GLO".to_string())));
    }
}
