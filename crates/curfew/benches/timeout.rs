// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "benchmark")]

use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use curfew::{AsyncTimeoutPolicy, Cancelled, PolicyOptions, TimeoutPolicy};
use futures::executor::block_on;

pub fn entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout");
    let options = PolicyOptions::new();

    // No timeout
    group.bench_function("no-timeout", |b| b.iter(|| black_box(Ok::<_, Cancelled>(Output::from(Input)))));

    // Blocking, optimistic
    let policy = TimeoutPolicy::builder("bench", &options)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    group.bench_function("blocking-optimistic", |b| {
        b.iter(|| black_box(policy.execute(|_, _| Ok::<_, Cancelled>(Output::from(Input)))));
    });

    // Blocking, pessimistic
    let policy = TimeoutPolicy::builder("bench", &options)
        .timeout(Duration::from_secs(10))
        .pessimistic()
        .build()
        .unwrap();
    group.bench_function("blocking-pessimistic", |b| {
        b.iter(|| black_box(policy.execute(|_, _| Ok::<_, Cancelled>(Output::from(Input)))));
    });

    // Cooperative, optimistic
    let policy = AsyncTimeoutPolicy::builder("bench", &options)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    group.bench_function("cooperative-optimistic", |b| {
        b.iter(|| black_box(block_on(policy.execute(|_, _| async { Ok::<_, Cancelled>(Output::from(Input)) }))));
    });

    group.finish();
}

criterion_group!(benches, entry);
criterion_main!(benches);

struct Input;

struct Output;

impl From<Input> for Output {
    fn from(_input: Input) -> Self {
        Self
    }
}
