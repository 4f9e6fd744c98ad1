use lci_qaqc::graph::Graph;
use lci_qaqc::providers::{
    check_default_providers, check_exchange, check_provider_exists, check_reciprocal_direction,
    ProviderDefect, ISSUE_WITH_FLOW_PROVIDER_METADATA, MATCH_EXCHANGE_FROM_PROVIDER_IS_INPUT,
    NO_MATCH_EXCHANGE_IN_FOUND_PROVIDER, NO_MATCH_PROVIDER_TO_EXCHANGE,
};
use serde_json::json;

fn graph_from(payload: serde_json::Value) -> Graph {
    Graph::from_value(&payload).expect("fixture should load").0
}

fn provider(id: &str) -> serde_json::Value {
    json!({"@id": id, "name": "supplier", "category": "Utilities", "flowType": "PRODUCT_FLOW"})
}

/// One consumer process with an input exchange per scenario, plus providers.
fn provider_graph() -> Graph {
    graph_from(json!({
        "flows": {
            "power": {"@id": "power", "name": "electricity", "category": "Energy", "flowType": "PRODUCT_FLOW"},
            "steam": {"@id": "steam", "name": "steam", "category": "Energy", "flowType": "PRODUCT_FLOW"},
            "scrap": {"@id": "scrap", "name": "scrap", "category": "Metals", "flowType": "PRODUCT_FLOW"},
            "water": {"@id": "water", "name": "water", "category": "Resources", "flowType": "ELEMENTARY_FLOW"}
        },
        "processes": {
            "consumer": {
                "type": "process",
                "exchanges": [
                    {"input": true, "amount": 1, "flow": {"@id": "power"}, "defaultProvider": provider("grid")},
                    {"input": true, "amount": 1, "flow": {"@id": "steam"}, "defaultProvider": provider("grid")},
                    {"input": true, "amount": 1, "flow": {"@id": "scrap"}, "defaultProvider": provider("recycler")},
                    {"input": true, "amount": 1, "flow": {"@id": "power"}, "defaultProvider": provider("nowhere")},
                    {"input": true, "amount": 1, "flow": {"@id": "water"}},
                    {"input": false, "amount": 1, "flow": {"@id": "steam"}}
                ]
            },
            "grid": {
                "type": "process",
                "exchanges": [
                    {"input": false, "amount": 1, "isQuantitativeReference": true, "flow": {"@id": "power"}}
                ]
            },
            "recycler": {
                "type": "process",
                "exchanges": [
                    {"input": true, "amount": 1, "flow": {"@id": "scrap"}, "defaultProvider": provider("scrapyard")}
                ]
            },
            "scrapyard": {
                "type": "process",
                "exchanges": [
                    {"input": false, "amount": 1, "isQuantitativeReference": true, "flow": {"@id": "scrap"}}
                ]
            }
        }
    }))
}

#[test]
fn missing_category_stops_at_metadata_stage() {
    let graph = graph_from(json!({
        "flows": {
            "power": {"@id": "power", "name": "electricity", "category": "Energy", "flowType": "PRODUCT_FLOW"}
        },
        "processes": {
            "consumer": {
                "type": "process",
                "exchanges": [
                    {"input": true, "amount": 1, "flow": {"@id": "power"},
                     "defaultProvider": {"@id": "ghost", "name": "grid", "flowType": "PRODUCT_FLOW"}}
                ]
            }
        }
    }));

    let report = check_default_providers(&graph);
    assert_eq!(report.defect_count(), 1);
    assert_eq!(report.metadata.len(), 1);
    assert!(report.missing_provider.is_empty());
    assert_eq!(report.metadata[0].parent_process_id, "consumer");
    assert_eq!(report.metadata[0].target_id.as_deref(), Some("power"));
    assert_eq!(report.metadata[0].target_ft.as_deref(), Some("PRODUCT_FLOW"));
    assert_eq!(report.stats.malformed_providers, 1);

    // The provider id is unknown too, so stage 2 alone would have fired.
    let exchange = &graph.processes["consumer"].exchanges[0];
    assert!(check_provider_exists(exchange, &graph).is_some());
    let defect = check_exchange("consumer", exchange, &graph).expect("defect");
    assert_eq!(defect.category(), ISSUE_WITH_FLOW_PROVIDER_METADATA);
}

#[test]
fn each_stage_reports_into_its_own_category() {
    let graph = provider_graph();
    let report = check_default_providers(&graph);

    assert!(report.metadata.is_empty());

    assert_eq!(report.missing_provider.len(), 1);
    assert_eq!(report.missing_provider[0].target_prv_id.as_deref(), Some("nowhere"));
    assert_eq!(
        report.missing_provider[0].target_prv_ft.as_deref(),
        Some("PRODUCT_FLOW")
    );

    assert_eq!(report.missing_reciprocal.len(), 1);
    assert_eq!(report.missing_reciprocal[0].target_id, "steam");
    assert_eq!(report.missing_reciprocal[0].found_prv_id, "grid");

    assert_eq!(report.reciprocal_is_input.len(), 1);
    let defect = &report.reciprocal_is_input[0];
    assert_eq!(defect.parent_process_id, "consumer");
    assert_eq!(defect.found_prv_id, "recycler");
    assert_eq!(defect.found_prv_exch_id, "scrap");

    assert_eq!(report.stats.processes_scanned, 4);
    assert_eq!(report.stats.exchanges_checked, 5);
    assert_eq!(report.stats.skipped_not_product_flow, 1);
    assert_eq!(report.stats.skipped_not_input, 3);
    assert_eq!(report.stats.malformed_flows, 0);
}

#[test]
fn provider_using_flow_both_ways_is_not_flagged() {
    let mut graph = provider_graph();
    let recycler = graph.process_mut("recycler").expect("recycler exists");
    recycler
        .exchanges
        .push(lci_qaqc::graph::Exchange::new("scrap", false, 0.8));

    let exchange = graph.processes["consumer"].exchanges[2].clone();
    assert!(check_reciprocal_direction("consumer", &exchange, &graph).is_none());
    assert!(check_default_providers(&graph).reciprocal_is_input.is_empty());
}

#[test]
fn dangling_flows_are_counted_not_checked() {
    let mut graph = provider_graph();
    graph.flows.remove("scrap");

    let report = check_default_providers(&graph);
    assert_eq!(report.stats.malformed_flows, 2);
    assert!(report.reciprocal_is_input.is_empty());
}

#[test]
fn sheets_come_out_in_stage_order() {
    let report = check_default_providers(&provider_graph());
    let sheets = report.to_sheets();
    let names: Vec<_> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            ISSUE_WITH_FLOW_PROVIDER_METADATA,
            NO_MATCH_PROVIDER_TO_EXCHANGE,
            NO_MATCH_EXCHANGE_IN_FOUND_PROVIDER,
            MATCH_EXCHANGE_FROM_PROVIDER_IS_INPUT,
        ]
    );
    assert_eq!(
        sheets[3].header,
        vec!["parentProcessID", "targetID", "foundPrvID", "foundPrvExchID"]
    );
    assert_eq!(sheets[3].rows[0], vec!["consumer", "scrap", "recycler", "scrap"]);

    let payload = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(payload["noMatchExcInFoundPrv"][0]["foundPrvID"], "grid");
    assert!(matches!(
        check_exchange(
            "consumer",
            &provider_graph().processes["consumer"].exchanges[1],
            &provider_graph()
        ),
        Some(ProviderDefect::MissingReciprocalExchange(_))
    ));
}
