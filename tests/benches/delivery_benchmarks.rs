//! # CSE Delivery Benchmarks
//!
//! | Component | Measured |
//! |-----------|----------|
//! | RequestQueue | enqueue + non-blocking dequeue per target |
//! | ResponseCorrelator | register + deliver + wait |
//! | Aggregation | building the mixed response for large groups |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tokio::time::Instant;

use cse_01_polling_channel::{PendingRequest, RequestQueue, ResponseCorrelator};
use cse_02_group_fanout::{AggregatedResponse, FanOutJob, MemberResult};
use shared_types::{
    DeliveryError, M2mRequest, M2mResponse, Operation, Originator, RequestId, ResourceId,
    ResponseStatusCode,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
}

fn bench_request_queue(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("cse-01-request-queue");

    for targets in [1usize, 64] {
        group.throughput(Throughput::Elements(targets as u64));
        group.bench_with_input(
            BenchmarkId::new("enqueue_dequeue", targets),
            &targets,
            |b, &targets| {
                let queue = RequestQueue::new(1024);
                let ids: Vec<ResourceId> = (0..targets)
                    .map(|i| ResourceId::new(format!("cse-in/ae{i}")))
                    .collect();
                b.iter(|| {
                    rt.block_on(async {
                        let now = Instant::now();
                        for id in &ids {
                            let request = M2mRequest::new(
                                Operation::Notify,
                                id.clone(),
                                Originator::from("CAdmin"),
                            );
                            let pending = PendingRequest::from_request(
                                request,
                                Originator::from("Cae"),
                                now,
                                now + Duration::from_secs(60),
                            );
                            queue.enqueue(id, pending).expect("capacity");
                        }
                        for id in &ids {
                            black_box(queue.dequeue_blocking(id, Duration::ZERO).await.ok());
                        }
                    })
                })
            },
        );
    }
    group.finish();
}

fn bench_correlator(c: &mut Criterion) {
    let rt = runtime();
    let correlator = ResponseCorrelator::new();
    let target = Originator::from("Cae1");

    c.bench_function("cse-01-correlator/register_deliver_wait", |b| {
        b.iter(|| {
            rt.block_on(async {
                let request_id = RequestId::generate();
                let waiter = correlator
                    .register(request_id.clone(), target.clone(), Duration::from_secs(5))
                    .expect("unique id");
                correlator
                    .deliver(M2mResponse::new(request_id, ResponseStatusCode::Ok, target.clone()))
                    .expect("waiter present");
                black_box(waiter.wait().await.ok());
            })
        })
    });
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cse-02-aggregation");

    for members in [8usize, 256] {
        let ids: Vec<ResourceId> = (0..members)
            .map(|i| ResourceId::new(format!("cse-in/m{i}")))
            .collect();

        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::new("mixed", members), &ids, |b, ids| {
            b.iter(|| {
                let mut job = FanOutJob::new(
                    RequestId::generate(),
                    Operation::Retrieve,
                    Instant::now(),
                    0,
                    ids.clone(),
                );
                for index in 0..ids.len() {
                    let result = if index % 3 == 0 {
                        MemberResult::Error(DeliveryError::NotFound(format!("m{index}")))
                    } else {
                        MemberResult::Replied(
                            M2mResponse::new(
                                RequestId::generate(),
                                ResponseStatusCode::Ok,
                                Originator::from("Cm"),
                            )
                            .with_payload(serde_json::json!({ "v": index })),
                        )
                    };
                    job.record(index, result);
                }
                black_box(AggregatedResponse::from_job(&job))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_request_queue, bench_correlator, bench_aggregation);
criterion_main!(benches);
