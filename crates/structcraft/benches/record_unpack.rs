use criterion::{Criterion, criterion_group, criterion_main};
use structcraft::{
    named::{Fields, NamedLayoutBuilder},
    record::FormattedRecord,
    transform::Transform,
    value::Value,
};

fn gen_record(field_count: usize, mapped: bool) -> FormattedRecord {
    let names: Vec<String> = (0..field_count).map(|i| format!("f{i}")).collect();

    let mut fields = Fields::new(names);
    if mapped {
        let mut transform = Transform::new();
        transform.set_scale(0.5).set_offset(1.0);
        fields = fields.mapped(transform.into());
    }

    let mut builder = NamedLayoutBuilder::new("Bench");
    builder.little_endian().unwrap().uint16(fields).unwrap();
    builder.build_formatted_record().unwrap()
}

fn gen_values(field_count: usize) -> Vec<Value> {
    (0..field_count as u64).map(|i| Value::UInt(i * 31 % 65536)).collect()
}

fn gen_packet(record: &FormattedRecord, count: usize) -> Vec<u8> {
    let values = gen_values(record.record_type().len());
    let one = record.pack(&values).unwrap();
    one.repeat(count)
}

fn bench_pack(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let record = gen_record(field_count, false);
        let values = gen_values(field_count);

        c.bench_function(&format!("pack_{field_count}_fields"), |b| {
            b.iter(|| {
                let _ = record.pack(&values).unwrap();
            })
        });
    }
}

fn bench_unpack(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        for mapped in [false, true] {
            let record = gen_record(field_count, mapped);
            let packet = gen_packet(&record, 1);
            let label = if mapped { "mapped" } else { "raw" };

            c.bench_function(&format!("unpack_{field_count}_fields_{label}"), |b| {
                b.iter(|| {
                    let _ = record.unpack(&packet).unwrap();
                })
            });
        }
    }
}

fn bench_iter_unpack(c: &mut Criterion) {
    let record = gen_record(10, false);
    let packet = gen_packet(&record, 1000);

    c.bench_function("iter_unpack_1000_records", |b| {
        b.iter(|| {
            for parsed in record.iter_unpack(&packet).unwrap() {
                let _ = parsed.unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_pack, bench_unpack, bench_iter_unpack);
criterion_main!(benches);
