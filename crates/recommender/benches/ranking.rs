use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use reorder_core::{ItemId, OrderId, UserId};
use reorder_orders::{OrderLine, OrderRecord};
use reorder_recommender::{PatternExtractor, RankerConfig, SuggestionRanker};

/// Weekly baskets drawn from a catalog of `catalog` items, `orders` weeks deep.
fn synthetic_history(user: UserId, orders: usize, catalog: usize) -> Vec<OrderRecord> {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 10, 0, 0).unwrap();
    (0..orders)
        .map(|week| {
            let lines = (0..8)
                .map(|slot| {
                    let sku = (week * 3 + slot * 7) % catalog;
                    let item: ItemId = format!("sku-{sku}").parse().unwrap();
                    OrderLine::new(item, 1 + (slot % 3) as u32).unwrap()
                })
                .collect();
            OrderRecord::new(user, OrderId::new(), start + Duration::weeks(week as i64), lines)
                .unwrap()
        })
        .collect()
}

fn bench_extract_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_and_rank");
    let ranker = SuggestionRanker::new(RankerConfig::default()).unwrap();
    let extractor = PatternExtractor::new();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    for orders in [10usize, 100, 1_000] {
        let user = UserId::new();
        let history = synthetic_history(user, orders, 200);
        group.throughput(Throughput::Elements(orders as u64));

        group.bench_with_input(BenchmarkId::new("extract", orders), &history, |b, history| {
            b.iter(|| extractor.extract(black_box(user), black_box(history)))
        });

        let stats = extractor.extract(user, &history);
        group.bench_with_input(BenchmarkId::new("rank", orders), &stats, |b, stats| {
            b.iter(|| ranker.rank(black_box(stats), black_box(now)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract_and_rank);
criterion_main!(benches);
