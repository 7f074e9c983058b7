use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use ace::ari::{Ari, LiteralAri, Value};
use ace::ari_cbor;
use ace::ari_text::{self, EncodeOptions};
use ace::typing::builtin::BuiltinType;
use ace::typing::{SemType, UniformList};

const REPORT: &str = "ari:/RPTSET/n=1234;r=20240102T030405Z;\
    (t=PT;s=//example/adm/CTRL/do_thing;(null,3,h'6869'))\
    (t=PT1.5S;s=//example/adm/EDD/counts;(/AC/(1,2,3),/AM/(a=1,b=2)))";

pub fn criterion_benchmark(c: &mut Criterion) {
    let text_dec = ari_text::Decoder::new();
    let text_enc = ari_text::Encoder::new(EncodeOptions::default());
    let cbor_dec = ari_cbor::Decoder::new();
    let cbor_enc = ari_cbor::Encoder::new();

    let report = text_dec.decode(REPORT).expect("report text");
    let data = cbor_enc.encode(&report).expect("report CBOR");
    println!("{} octets of CBOR for {} characters of text", data.len(), REPORT.len());

    c.bench_function("text decode", |b| b.iter(|| text_dec.decode(black_box(REPORT))));
    c.bench_function("text encode", |b| b.iter(|| text_enc.encode(black_box(&report))));
    c.bench_function("cbor decode", |b| b.iter(|| cbor_dec.decode(black_box(&data))));
    c.bench_function("cbor encode", |b| b.iter(|| cbor_enc.encode(black_box(&report))));

    let ulist = SemType::UniformList(UniformList {
        base: Box::new(SemType::from(BuiltinType::Literal(ace::ari::StructType::Vast))),
        min_elements: None,
        max_elements: None,
    });
    let items = Ari::Literal(LiteralAri::new(Value::List((0..1000i64).map(Ari::from).collect())));
    c.bench_function("convert 1k list", |b| b.iter(|| ulist.convert(black_box(&items))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
