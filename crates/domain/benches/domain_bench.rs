use std::sync::Arc;

use common::{NewProduct, NewUser, ProductId, UserId};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{CreateOrder, NoopObserver, OrderService};
use rust_decimal::Decimal;
use store::{InMemoryStore, ProductStore, UserStore};

async fn seed(store: &InMemoryStore, products: usize) -> (UserId, Vec<ProductId>) {
    let user_id = store
        .create_user(NewUser {
            email: "bench@example.com".to_string(),
            age: 30,
            password_hash: "hash".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;

    let mut ids = Vec::with_capacity(products);
    for i in 0..products {
        let product = store
            .create_product(NewProduct {
                description: format!("Bench product {i}"),
                quantity: i64::MAX / 2,
                price: Decimal::new(1999, 2),
                ..Default::default()
            })
            .await
            .unwrap();
        ids.push(product.id);
    }
    (user_id, ids)
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let (user_id, product_ids) = rt.block_on(seed(&store, 1));
    let service = OrderService::new(store, Arc::new(NoopObserver));

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd =
                    CreateOrder::new(user_id.clone(), vec![]).with_line(product_ids[0].clone(), 1);
                service.create(cmd).await.unwrap();
            });
        });
    });
}

fn bench_create_order_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("domain/create_order_lines");

    for lines in [1, 10, 50] {
        let store = InMemoryStore::new();
        let (user_id, product_ids) = rt.block_on(seed(&store, lines));
        let service = OrderService::new(store, Arc::new(NoopObserver));

        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let cmd = product_ids
                        .iter()
                        .fold(CreateOrder::new(user_id.clone(), vec![]), |cmd, id| {
                            cmd.with_line(id.clone(), 1)
                        });
                    service.create(cmd).await.unwrap();
                });
            });
        });
    }

    group.finish();
}

fn bench_rejected_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let (user_id, product_ids) = rt.block_on(seed(&store, 1));
    let service = OrderService::new(store, Arc::new(NoopObserver));

    c.bench_function("domain/rejected_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = CreateOrder::new(user_id.clone(), vec![])
                    .with_line(product_ids[0].clone(), i64::MAX);
                service.create(cmd).await.unwrap_err();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_create_order_lines,
    bench_rejected_order
);
criterion_main!(benches);
