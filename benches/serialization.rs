use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kat::{decode, decode_data, encode, impl_encode, to_string, Registry, Sketch};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Default)]
struct User {
    id: i32,
    name: String,
    email: String,
    active: bool,
}
impl_encode!(User);

#[derive(Serialize, Clone)]
struct Product {
    sku: String,
    name: String,
    price: f64,
    quantity: u32,
}

#[derive(Serialize, Clone)]
struct NestedData {
    id: u32,
    metadata: Metadata,
    tags: Vec<String>,
}

#[derive(Serialize, Clone)]
struct Metadata {
    created: String,
    updated: String,
    version: u32,
}

fn sample_user() -> User {
    User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        active: true,
    }
}

fn register_user() {
    Registry::global().register_sketch(
        Sketch::new("User", User::default)
            .field::<i32>("id", |u| &u.id, |u, v| u.id = v)
            .field::<String>("name", |u| &u.name, |u, v| u.name = v)
            .field::<String>("email", |u| &u.email, |u, v| u.email = v)
            .field::<bool>("active", |u| &u.active, |u, v| u.active = v),
    );
}

fn products(size: u32) -> Vec<Product> {
    (0..size)
        .map(|i| Product {
            sku: format!("SKU{}", i),
            name: format!("Product {}", i),
            price: 9.99 + f64::from(i),
            quantity: i,
        })
        .collect()
}

fn benchmark_serialize_simple(c: &mut Criterion) {
    register_user();
    let user = sample_user();

    c.bench_function("serialize_simple_struct", |b| {
        b.iter(|| to_string(black_box(&user)))
    });

    c.bench_function("encode_simple_sketch", |b| {
        b.iter(|| encode(black_box(&user)))
    });
}

fn benchmark_decode_simple(c: &mut Criterion) {
    register_user();
    let kat = "User{i:id(123)s:name(Alice)s:email(alice@example.com)b:active(true)}";

    c.bench_function("decode_simple_sketch", |b| {
        b.iter(|| decode::<User>(black_box(kat)))
    });

    c.bench_function("decode_simple_data", |b| {
        b.iter(|| decode_data(black_box(kat)))
    });
}

fn benchmark_serialize_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_array");

    for size in [10, 50, 100, 500].iter() {
        let items = products(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| to_string(black_box(&items)))
        });
    }
    group.finish();
}

fn benchmark_decode_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_array");

    for size in [10, 50, 100, 500].iter() {
        let kat = to_string(&products(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &kat, |b, kat| {
            b.iter(|| decode_data(black_box(kat)))
        });
    }
    group.finish();
}

fn benchmark_nested(c: &mut Criterion) {
    let data = NestedData {
        id: 42,
        metadata: Metadata {
            created: "2023-01-01T00:00:00Z".to_string(),
            updated: "2023-12-31T23:59:59Z".to_string(),
            version: 3,
        },
        tags: vec![
            "important".to_string(),
            "verified".to_string(),
            "production".to_string(),
        ],
    };
    let kat = to_string(&data).unwrap();

    c.bench_function("serialize_nested_struct", |b| {
        b.iter(|| to_string(black_box(&data)))
    });

    c.bench_function("decode_nested_data", |b| {
        b.iter(|| decode_data(black_box(&kat)))
    });
}

fn benchmark_string_escaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_strings");

    let plain = "This is a medium length string with some content";
    let escaped = "(nested (parens) and ^carets^) (everywhere)";

    group.bench_function("plain_string", |b| b.iter(|| to_string(black_box(&plain))));
    group.bench_function("escaped_string", |b| {
        b.iter(|| to_string(black_box(&escaped)))
    });

    let escaped_kat = to_string(&escaped).unwrap();
    group.bench_function("decode_escaped_string", |b| {
        b.iter(|| decode::<String>(black_box(&escaped_kat)))
    });

    group.finish();
}

fn benchmark_comparison_with_json(c: &mut Criterion) {
    register_user();
    let user = sample_user();

    let mut group = c.benchmark_group("comparison");

    group.bench_function("kat_serialize", |b| {
        b.iter(|| kat::to_string(black_box(&user)))
    });

    group.bench_function("json_serialize", |b| {
        b.iter(|| serde_json::to_string(black_box(&user)))
    });

    let kat_str = kat::to_string(&user).unwrap();
    let json_str = serde_json::to_string(&user).unwrap();

    group.bench_function("kat_decode", |b| {
        b.iter(|| kat::decode::<User>(black_box(&kat_str)))
    });

    group.bench_function("json_deserialize", |b| {
        b.iter(|| serde_json::from_str::<User>(black_box(&json_str)))
    });

    group.finish();
}

fn benchmark_roundtrip(c: &mut Criterion) {
    register_user();
    let user = sample_user();

    c.bench_function("roundtrip_simple", |b| {
        b.iter(|| {
            let encoded = encode(black_box(&user)).unwrap();
            let _decoded: Option<User> = decode(black_box(&encoded)).unwrap();
        })
    });
}

criterion_group!(
    benches,
    benchmark_serialize_simple,
    benchmark_decode_simple,
    benchmark_serialize_array,
    benchmark_decode_array,
    benchmark_nested,
    benchmark_string_escaping,
    benchmark_comparison_with_json,
    benchmark_roundtrip
);
criterion_main!(benches);
