use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use tenantguard_auth::{Hs256TokenCodec, TokenCodec, TokenKind, TokenSubject, fingerprint};
use tenantguard_core::{TenantId, UserId};

fn codec() -> Hs256TokenCodec {
    Hs256TokenCodec::new(b"bench-access-secret", b"bench-refresh-secret").unwrap()
}

fn bench_issue(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_issue");
    let codec = codec();
    let now = Utc::now();

    for scope_count in [0usize, 4, 32] {
        let mut subject = TokenSubject::new(UserId::new(), TenantId::new());
        subject.scopes = (0..scope_count).map(|i| format!("scope_{i}")).collect();

        group.bench_with_input(BenchmarkId::new("access", scope_count), &subject, |b, subject| {
            b.iter(|| {
                codec
                    .issue_access(black_box(subject), Duration::minutes(30), now)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_decode");
    let codec = codec();
    let now = Utc::now();
    let subject = TokenSubject::new(UserId::new(), TenantId::new());
    let access = codec.issue_access(&subject, Duration::minutes(30), now).unwrap();
    let refresh = codec.issue_refresh(&subject, Duration::days(7), now).unwrap();

    group.bench_function("access_valid", |b| {
        b.iter(|| codec.decode(black_box(&access.token), TokenKind::Access, now).unwrap());
    });

    group.bench_function("refresh_as_access_rejected", |b| {
        b.iter(|| {
            codec
                .decode(black_box(&refresh.token), TokenKind::Access, now)
                .unwrap_err()
        });
    });

    group.bench_function("fingerprint", |b| {
        b.iter(|| fingerprint(black_box(&refresh.token)));
    });

    group.finish();
}

criterion_group!(benches, bench_issue, bench_decode);
criterion_main!(benches);
