// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reliefgrid_core::{Category, Decimal, GeoPoint, PointRecord};
use reliefgrid_storage::{KeyedStore, TableStore};
use tokio::runtime::Runtime;

fn record(i: u32) -> PointRecord {
    // spread points over a 0.1 degree square around Istanbul
    let lat = Decimal::new(41_000 + (i % 100) as i64, 3);
    let lng = Decimal::new(29_000 + (i / 100 % 100) as i64, 3);
    let location = GeoPoint::new(lat, lng).unwrap();
    PointRecord::new("POINT", &format!("u{}", i), location, Category::Food, "", 6).unwrap()
}

fn populated(rt: &Runtime, size: u32) -> TableStore {
    let store = TableStore::in_memory();
    for i in 0..size {
        rt.block_on(store.save(record(i))).unwrap();
    }
    store
}

fn bench_save(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("save");

    for size in [100u32, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| populated(&rt, black_box(size)));
        });
    }

    group.finish();
}

fn bench_prefix_query(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = populated(&rt, 10_000);

    let mut group = c.benchmark_group("query_prefix");
    for prefix in ["sxk", "sxk9", "sxk97f"] {
        group.bench_with_input(BenchmarkId::from_parameter(prefix), prefix, |b, prefix| {
            b.iter(|| rt.block_on(store.query_prefix("POINT", black_box(prefix))).unwrap());
        });
    }
    group.finish();
}

fn bench_partition_scan(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = populated(&rt, 10_000);

    c.bench_function("query_partition_full", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut cursor = None;
                let mut seen = 0;
                loop {
                    let page = store
                        .query_partition("POINT", cursor.as_ref(), 500)
                        .await
                        .unwrap();
                    seen += page.items.len();
                    match page.next_cursor {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                black_box(seen)
            })
        });
    });
}

criterion_group!(benches, bench_save, bench_prefix_query, bench_partition_scan);
criterion_main!(benches);
