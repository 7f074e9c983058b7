use ace::ari::{Ari, ExecutionSet, IdSeg, Identity, LiteralAri, ReferenceAri, StructType, Table, Value};
use ace::error::AriError;
use ace::ari_cbor::{Decoder, Encoder};
use ace::cbor::{self, Item};
use tracing_subscriber::EnvFilter;

fn setup() -> (Decoder, Encoder) {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
    (Decoder::new(), Encoder::new())
}

fn item_of(data: &[u8]) -> Item {
    let (item, used) = cbor::from_slice(data).expect("valid CBOR");
    assert_eq!(used, data.len());
    item
}

#[test]
fn untyped_primitives() {
    let (dec, enc) = setup();
    let cases: [(&[u8], Ari); 7] = [
        (&[0xF5], Ari::from(true)),
        (&[0xF4], Ari::from(false)),
        (&[0x00], Ari::from(0)),
        (&[0x0A], Ari::from(10)),
        (&[0x29], Ari::from(-10)),
        (&[0xF6], Ari::Literal(LiteralAri::new(Value::Null))),
        (&[0x62, 0x68, 0x69], Ari::from("hi")),
    ];
    for (data, want) in cases {
        let got = dec.decode(data).expect("decode");
        assert_eq!(got, want);
        assert_eq!(enc.encode(&got).expect("encode"), data);
    }
    let undefined = dec.decode(&[0xF7]).expect("decode");
    assert!(undefined.is_undefined());
}

#[test]
fn floats_use_shortest_form() {
    let (dec, enc) = setup();
    assert_eq!(enc.encode(&Ari::from(1.5)).expect("encode"), vec![0xF9, 0x3E, 0x00]);
    assert_eq!(enc.encode(&Ari::from(f64::INFINITY)).expect("encode"), vec![0xF9, 0x7C, 0x00]);
    assert_eq!(dec.decode(&[0xF9, 0x7E, 0x00]).expect("decode").as_literal().map(|lit| match lit.value {
        Value::Float(val) => val.is_nan(),
        _ => false,
    }), Some(true));
    let precise = Ari::from(0.1);
    let data = enc.encode(&precise).expect("encode");
    assert_eq!(data[0], 0xFB);
    assert_eq!(dec.decode(&data).expect("decode"), precise);
}

#[test]
fn typed_literals() {
    let (dec, enc) = setup();
    let int = Ari::Literal(LiteralAri::typed(10, StructType::Int));
    assert_eq!(enc.encode(&int).expect("encode"), vec![0x82, 0x04, 0x0A]);
    assert_eq!(dec.decode(&[0x82, 0x04, 0x0A]).expect("decode"), int);

    let text = Ari::Literal(LiteralAri::typed("hi", StructType::TextStr));
    assert_eq!(enc.encode(&text).expect("encode"), vec![0x82, 0x0A, 0x62, 0x68, 0x69]);

    let aritype = Ari::Literal(LiteralAri::typed(Value::AriType(StructType::Tbl), StructType::AriType));
    assert_eq!(enc.encode(&aritype).expect("encode"), vec![0x82, 0x10, 0x13]);
    assert_eq!(dec.decode(&[0x82, 0x10, 0x13]).expect("decode"), aritype);
}

#[test]
fn typed_values_are_domain_checked() {
    let (dec, _) = setup();
    // /BYTE/256
    assert!(dec.decode(&[0x82, 0x02, 0x19, 0x01, 0x00]).is_err());
    // /BOOL/"hi"
    assert!(dec.decode(&[0x82, 0x01, 0x62, 0x68, 0x69]).is_err());
    // unknown struct type 3
    assert!(dec.decode(&[0x82, 0x03, 0x00]).is_err());
}

#[test]
fn time_values_as_decimal_fractions() {
    let (dec, enc) = setup();
    let text = ace::ari_text::Decoder::new();

    let td = text.decode("ari:/TD/PT3H2M10.5S").expect("decode");
    let data = enc.encode(&td).expect("encode");
    assert_eq!(
        item_of(&data),
        Item::Array(vec![Item::Int(13), Item::Array(vec![Item::Int(109_305), Item::Int(-1)])])
    );
    assert_eq!(dec.decode(&data).expect("decode"), td);

    let tp = text.decode("ari:/TP/20000101T000010Z").expect("decode");
    let data = enc.encode(&tp).expect("encode");
    assert_eq!(item_of(&data), Item::Array(vec![Item::Int(12), Item::Int(10)]));
    assert_eq!(dec.decode(&data).expect("decode"), tp);
}

#[test]
fn references() {
    let (dec, enc) = setup();
    let plain = Ari::Reference(ReferenceAri::new(Identity::new(1i64, StructType::Ctrl, 2i64)));
    assert_eq!(enc.encode(&plain).expect("encode"), vec![0x83, 0x01, 0x22, 0x02]);
    assert_eq!(dec.decode(&[0x83, 0x01, 0x22, 0x02]).expect("decode"), plain);

    let empty = Ari::Reference(ReferenceAri::with_params(Identity::new(1i64, StructType::Ctrl, 2i64), Vec::new()));
    assert_eq!(enc.encode(&empty).expect("encode"), vec![0x84, 0x01, 0x22, 0x02, 0x80]);
    assert_ne!(dec.decode(&[0x84, 0x01, 0x22, 0x02, 0x80]).expect("decode"), plain);

    let relative = Ari::Reference(ReferenceAri::new(Identity::relative(StructType::Edd, "count")));
    let data = enc.encode(&relative).expect("encode");
    assert_eq!(item_of(&data), Item::Array(vec![Item::Null, Item::Int(-4), Item::Text("count".into())]));
    assert_eq!(dec.decode(&data).expect("decode"), relative);

    let revised = Ari::Reference(ReferenceAri::new(Identity::new("adm", StructType::Edd, "count").with_rev("2024-01-01")));
    let data = enc.encode(&revised).expect("encode");
    assert_eq!(item_of(&data).to_diag(), "[\"adm@2024-01-01\",-4,\"count\"]");
    assert_eq!(dec.decode(&data).expect("decode"), revised);
}

#[test]
fn organization_prefix() {
    let (dec, enc) = setup();
    let ident = Identity::new("model", StructType::Var, "hello").with_org("org");
    let with_params = Ari::Reference(ReferenceAri::with_params(
        ident.clone(),
        vec![Ari::Literal(LiteralAri::typed(10, StructType::Int))],
    ));
    let data = enc.encode(&with_params).expect("encode");
    assert_eq!(item_of(&data).to_diag(), "[\"org\",\"model\",-11,\"hello\",[[4,10]]]");
    assert_eq!(dec.decode(&data).expect("decode"), with_params);

    let bare = Ari::Reference(ReferenceAri::new(ident));
    let data = enc.encode(&bare).expect("encode");
    assert_eq!(item_of(&data).to_diag(), "[\"org\",\"model\",-11,\"hello\"]");
    assert_eq!(dec.decode(&data).expect("decode"), bare);
}

#[test]
fn containers() {
    let (dec, enc) = setup();
    let ac = Ari::Literal(LiteralAri::typed(Value::List(vec![Ari::from(1), Ari::from(2)]), StructType::Ac));
    assert_eq!(enc.encode(&ac).expect("encode"), vec![0x82, 0x11, 0x82, 0x01, 0x02]);
    assert_eq!(dec.decode(&[0x82, 0x11, 0x82, 0x01, 0x02]).expect("decode"), ac);

    let table = Table::from_rows(2, vec![vec![Ari::from(1), Ari::from(2)], vec![Ari::from(3), Ari::from(4)]])
        .expect("table");
    let tbl = Ari::Literal(LiteralAri::typed(Value::Table(table), StructType::Tbl));
    let data = enc.encode(&tbl).expect("encode");
    assert_eq!(item_of(&data).to_diag(), "[19,[2,1,2,3,4]]");
    assert_eq!(dec.decode(&data).expect("decode"), tbl);

    // three cells cannot fill rows of two
    assert!(dec.decode(&item_bytes("[19,[2,1,2,3]]")).is_err());
    // AM keys must be untyped
    assert!(dec.decode(&item_bytes("[18,{[4,1]:2}]")).is_err());
}

fn item_bytes(diag: &str) -> Vec<u8> {
    let item = ace::ari_text::parse::parse_diag(diag).expect("diagnostic text");
    cbor::to_vec(&item).expect("encode item")
}

#[test]
fn execution_and_report_sets() {
    let (dec, enc) = setup();
    let text = ace::ari_text::Decoder::new();
    for form in [
        "ari:/EXECSET/n=1234;(//example/adm/CTRL/name)",
        "ari:/EXECSET/n=h'0102';()",
        "ari:/RPTSET/n=null;r=20240102T030405Z;(t=PT;s=//adm/CTRL/name;(null))",
    ] {
        let ari = text.decode(form).expect("decode text");
        let data = enc.encode(&ari).expect("encode");
        assert_eq!(dec.decode(&data).expect("decode"), ari, "{form}");
    }
    // a negative nonce
    assert!(dec.decode(&item_bytes("[20,[-1]]")).is_err());
}

#[test]
fn malformed_input() {
    let (dec, _) = setup();
    assert!(dec.decode(&[]).is_err());
    // truncated array
    assert!(dec.decode(&[0x82, 0x04]).is_err());
    // single item array
    assert!(dec.decode(&[0x81, 0x01]).is_err());
    // untyped map
    assert!(dec.decode(&[0xA0]).is_err());
    // a literal type in an object reference
    assert!(dec.decode(&[0x83, 0x01, 0x04, 0x02]).is_err());
}

#[test]
fn trailing_octets_are_ignored() {
    let (dec, _) = setup();
    assert_eq!(dec.decode(&[0xF5, 0x00]).expect("decode"), Ari::from(true));
}

#[test]
fn object_ids_keep_their_form() {
    let (dec, enc) = setup();
    let ari = Ari::Reference(ReferenceAri::new(Identity::new(65536i64, StructType::Var, "hello")));
    let back = dec.decode(&enc.encode(&ari).expect("encode")).expect("decode");
    let ident = &back.as_reference().expect("reference").ident;
    assert_eq!(ident.ns_id, Some(IdSeg::Int(65536)));
    assert_eq!(ident.obj_id, IdSeg::Text("hello".into()));
}

#[test]
fn domain_failures_are_parse_errors() {
    let (dec, _) = setup();
    // /BYTE/256
    assert!(matches!(dec.decode(&[0x82, 0x02, 0x19, 0x01, 0x00]), Err(AriError::Parse { .. })));
    // /AC/([/UINT/-1])
    assert!(matches!(dec.decode(&item_bytes("[17,[[5,-1]]]")), Err(AriError::Parse { .. })));
}

#[test]
fn typed_nonces_are_not_encoded() {
    let (_, enc) = setup();
    let typed = ExecutionSet { nonce: LiteralAri::typed(5, StructType::Uvast), targets: Vec::new() };
    let ari = Ari::Literal(LiteralAri::typed(Value::ExecSet(Box::new(typed)), StructType::ExecSet));
    assert!(enc.encode(&ari).is_err());

    let untyped = ExecutionSet { nonce: LiteralAri::new(5), targets: vec![Ari::from(1)] };
    let ari = Ari::Literal(LiteralAri::typed(Value::ExecSet(Box::new(untyped)), StructType::ExecSet));
    let data = enc.encode(&ari).expect("encode");
    assert_eq!(item_of(&data).to_diag(), "[20,[5,1]]");
}

#[test]
fn sets_keep_their_value_across_forms() {
    let (dec, enc) = setup();
    let text_dec = ace::ari_text::Decoder::new();
    let text_enc = ace::ari_text::Encoder::new(ace::ari_text::EncodeOptions::default());
    for form in [
        "ari:/EXECSET/n=5;(//example/adm/CTRL/name,//example/adm/CTRL/other(1))",
        "ari:/RPTSET/n=7;r=20240102T030405Z;(t=PT1.5S;s=//adm/CTRL/name;(null,/INT/3))(t=PT;s=//adm/EDD/x;())",
    ] {
        let ari = text_dec.decode(form).expect("decode text");
        let back = dec.decode(&enc.encode(&ari).expect("encode")).expect("decode");
        assert_eq!(back, ari, "{form}");
        assert_eq!(text_enc.encode(&back).expect("encode text"), form);
    }
}

#[test]
fn tables_without_columns() {
    let (dec, enc) = setup();
    let empty = Ari::Literal(LiteralAri::typed(Value::Table(Table::new(0)), StructType::Tbl));
    let data = enc.encode(&empty).expect("encode");
    assert_eq!(item_of(&data).to_diag(), "[19,[0]]");
    assert_eq!(dec.decode(&data).expect("decode"), empty);
    assert!(dec.decode(&item_bytes("[19,[0,1]]")).is_err());
}

#[test]
fn organization_needs_a_namespace() {
    let (dec, enc) = setup();
    let mut ident = Identity::relative(StructType::Var, "hello");
    ident.org_id = Some(IdSeg::from("org"));
    assert!(enc.encode(&Ari::Reference(ReferenceAri::new(ident))).is_err());
    assert!(dec.decode(&item_bytes("[\"org\",null,-11,\"hello\"]")).is_err());
}
