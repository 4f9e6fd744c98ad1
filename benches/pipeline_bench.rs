//! Repair and check throughput over a synthetic graph.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use lci_qaqc::config::RepairConfig;
use lci_qaqc::graph::{Exchange, Flow, FlowType, Graph, Process, ProcessKind, Reference};
use lci_qaqc::providers::check_default_providers;
use lci_qaqc::repair::Pipeline;
use lci_qaqc::validate::validate_all;

fn synthetic_graph(processes: usize) -> Graph {
    let mut graph = Graph::default();
    for index in 0..processes {
        let product = format!("product-{index}");
        let waste = format!("waste-{index}");
        graph.insert_flow(Flow::new(&product, &product, "Products", FlowType::Product));
        graph.insert_flow(Flow::new(&waste, &waste, "Hazardous", FlowType::Waste));

        let mut reference = Exchange::new(product.as_str(), false, 1.0);
        reference.is_quantitative_reference = Some(true);
        let mut supply = Exchange::new(format!("product-{}", (index + 1) % processes), true, 0.5);
        supply.default_provider = Some(Reference {
            id: Some(format!("process-{}", (index + 1) % processes)),
            name: Some("supplier".to_string()),
            category: Some("Products".to_string()),
            flow_type: Some("PRODUCT_FLOW".to_string()),
            ..Reference::default()
        });
        let mut legacy = Exchange::new(waste.as_str(), false, 0.1);
        legacy.input = None;
        legacy.is_input_alias = Some(false);

        graph.insert_process(
            Process::new(format!("process-{index}"), "synthetic", ProcessKind::Process)
                .with_exchange(reference)
                .with_exchange(supply)
                .with_exchange(legacy),
        );
    }
    graph
}

fn bench_pipeline(c: &mut Criterion) {
    let config = RepairConfig::default();
    let pipeline = Pipeline::standard(&config);
    let graph = synthetic_graph(2_000);

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(graph.exchange_count() as u64));

    group.bench_function("standard_repair_2000_processes", |b| {
        b.iter_batched(
            || graph.clone(),
            |mut g| black_box(pipeline.run(&mut g)),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("validate_all_2000_processes", |b| {
        b.iter(|| black_box(validate_all(&graph)));
    });

    group.bench_function("provider_check_2000_processes", |b| {
        b.iter(|| black_box(check_default_providers(&graph)));
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
