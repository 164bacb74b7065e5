use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rolegate_auth::{OverrideDocument, PermissionCatalog, PermissionKey, build_effective_table, can};

/// Override documents flipping every catalog key for `role_count` roles.
fn synthetic_overrides(catalog: &PermissionCatalog, role_count: usize) -> Vec<OverrideDocument> {
    (0..role_count)
        .map(|i| {
            let grants: Vec<(PermissionKey, bool)> = catalog
                .keys()
                .enumerate()
                .map(|(n, key)| (key.clone(), (n + i) % 2 == 0))
                .collect();
            OverrideDocument::new(format!("role-{i}"), grants)
        })
        .collect()
}

fn bench_table_merge(c: &mut Criterion) {
    let catalog = PermissionCatalog::defaults();
    let mut group = c.benchmark_group("effective_table_merge");

    for role_count in [0usize, 4, 32, 128].iter() {
        let overrides = synthetic_overrides(&catalog, *role_count);
        group.throughput(Throughput::Elements(*role_count as u64));
        group.bench_with_input(BenchmarkId::new("build", role_count), &overrides, |b, overrides| {
            b.iter(|| black_box(build_effective_table(&catalog, overrides)));
        });
    }

    group.finish();
}

fn bench_can(c: &mut Criterion) {
    let catalog = PermissionCatalog::defaults();
    let table = build_effective_table(&catalog, &synthetic_overrides(&catalog, 32));
    let key = PermissionKey::from_static("returns.approve");
    let mut group = c.benchmark_group("can");
    group.sample_size(1000);

    group.bench_function("granted_first_role", |b| {
        let roles = ["manager", "employee"];
        b.iter(|| black_box(can(&roles, &key, &table)));
    });

    group.bench_function("denied_many_roles", |b| {
        let roles: Vec<String> = (0..16).map(|i| format!("unknown-{i}")).collect();
        b.iter(|| black_box(can(&roles, &key, &table)));
    });

    group.finish();
}

criterion_group!(benches, bench_table_merge, bench_can);
criterion_main!(benches);
