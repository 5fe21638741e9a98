// Benchmark relationship-graph construction and neighborhood traversal at
// varying tree sizes.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use rewire_graphs::ClassRelations;
use rewire_graphs::graph::RelationshipGraph;

/// Build synthetic class relations that mimic a service-layer codebase.
///
/// Each class references a handful of others chosen by prime stepping,
/// producing a sparse, connected-ish graph without self-references.
fn build_synthetic_relations(class_count: usize, edge_factor: usize) -> Vec<ClassRelations> {
    let primes = [7, 13, 31, 61];
    (0..class_count)
        .map(|i| {
            let related = primes[..edge_factor.min(primes.len())]
                .iter()
                .map(|&p| (i.wrapping_mul(p).wrapping_add(1)) % class_count)
                .filter(|&target| target != i)
                .map(|target| format!("Class{target}"))
                .collect();
            ClassRelations {
                class_name: format!("Class{i}"),
                file_path: format!("Class{i}.java").into(),
                related,
            }
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for class_count in [100, 1_000, 10_000] {
        let relations = build_synthetic_relations(class_count, 3);
        group.bench_with_input(
            BenchmarkId::new("classes", class_count),
            &relations,
            |b, relations| {
                b.iter(|| RelationshipGraph::from_relations(relations.iter()));
            },
        );
    }
    group.finish();
}

fn bench_neighborhood(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighborhood");
    let relations = build_synthetic_relations(5_000, 3);
    let graph = RelationshipGraph::from_relations(relations.iter());

    for depth in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            b.iter(|| graph.neighborhood("Class42", depth));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_neighborhood);
criterion_main!(benches);
