use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mapd_core::marshal::{
    Batch, Table, Value, decode_columns, decode_rows, encode_columns, encode_columns_chunked,
    encode_rows, record_batch_to_table, table_to_record_batch,
};
use mapd_core::types::{ColumnDesc, ColumnType, DatumType};

fn schema() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::new("id", ColumnType::new(DatumType::BigInt)),
        ColumnDesc::new("carrier", ColumnType::new(DatumType::Str)),
        ColumnDesc::new("delay", ColumnType::new(DatumType::Double)),
        ColumnDesc::new("flight_date", ColumnType::new(DatumType::Date)),
        ColumnDesc::new("fare", ColumnType::decimal(10, 2)),
    ]
}

fn flights(rows: usize) -> Table {
    let base = NaiveDate::from_ymd_opt(2008, 1, 1).unwrap();
    Table::builder()
        .column("id", (0..rows as i64).collect::<Vec<_>>())
        .column(
            "carrier",
            (0..rows).map(|i| ["AA", "UA", "DL", "WN"][i % 4]).collect::<Vec<_>>(),
        )
        .column(
            "delay",
            (0..rows)
                .map(|i| if i % 10 == 0 { None } else { Some(i as f64 * 0.5) })
                .collect::<Vec<_>>(),
        )
        .column(
            "flight_date",
            (0..rows)
                .map(|i| base + chrono::Duration::days((i % 365) as i64))
                .collect::<Vec<_>>(),
        )
        .column(
            "fare",
            (0..rows)
                .map(|i| Value::Decimal(rust_decimal::Decimal::new(i as i64 * 101, 2)))
                .collect::<Vec<_>>(),
        )
        .build()
        .unwrap()
}

// ════════════════════════════════════════════
// Encode
// ════════════════════════════════════════════

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let schema = schema();

    for size in [1_000, 10_000, 100_000].iter() {
        let table = flights(*size);
        let batch = Batch::Columns(table.clone());
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("columnar", size), &batch, |b, batch| {
            b.iter(|| encode_columns(black_box(batch), &schema).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("rowwise", size), &batch, |b, batch| {
            b.iter(|| encode_rows(black_box(batch), &schema).unwrap());
        });

        // 1 MiB chunks
        group.bench_with_input(BenchmarkId::new("chunked_1mb", size), &batch, |b, batch| {
            b.iter(|| encode_columns_chunked(black_box(batch), &schema, 1 << 20).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("arrow", size), &table, |b, table| {
            b.iter(|| table_to_record_batch(black_box(table), &schema).unwrap());
        });
    }

    group.finish();
}

// ════════════════════════════════════════════
// Decode
// ════════════════════════════════════════════

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let schema = schema();

    for size in [1_000, 10_000, 100_000].iter() {
        let table = flights(*size);
        let batch = Batch::Columns(table.clone());
        let columns = encode_columns(&batch, &schema).unwrap();
        let rows = encode_rows(&batch, &schema).unwrap();
        let record_batch = table_to_record_batch(&table, &schema).unwrap();
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_function(BenchmarkId::new("columnar", size), |b| {
            b.iter(|| decode_columns(black_box(&columns), &schema).unwrap());
        });

        group.bench_function(BenchmarkId::new("rowwise", size), |b| {
            b.iter(|| decode_rows(black_box(&rows), &schema).unwrap());
        });

        group.bench_function(BenchmarkId::new("arrow", size), |b| {
            b.iter(|| record_batch_to_table(black_box(&record_batch)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
