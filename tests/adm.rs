use std::sync::Arc;

use ace::adm::statement::Statement;
use ace::adm::{AdmSet, ExtensionRegistry, Import, ModuleDecoder, ModuleEncoder, ObjectKind};
use ace::ari::{Ari, IdSeg, LiteralAri, StructType, Value};
use ace::typing::SemType;
use ace::typing::constraint::Constraint;
use tracing_subscriber::EnvFilter;

const EXAMPLE_ADM: &str = r#"
module example-adm {
  yang-version 1.1;
  namespace "ari://example-adm/";
  prefix ex;
  import ietf-amm {
    prefix amm;
  }
  organization "Example Org";
  amm:enum 65535;
  revision 2024-01-01 {
    description "Initial version.";
  }
  feature extra;

  // types
  amm:typedef counter {
    amm:enum 1;
    description "A count.";
    amm:type uvast {
      units "events";
      range "0..max";
    }
  }
  amm:typedef level {
    amm:type int {
      amm:int-labels {
        enum low;
        enum high {
          value 5;
        }
      }
    }
  }
  amm:typedef pair {
    amm:dlist {
      amm:type textstr;
      amm:type counter;
    }
  }

  amm:ident base-ident;
  amm:ident derived {
    amm:base "./IDENT/base-ident";
  }

  /* objects */
  amm:edd num-events {
    amm:enum 0;
    amm:type counter;
  }
  amm:const limit {
    amm:type int;
    amm:init-value "10";
  }
  amm:var names {
    amm:ulist {
      amm:type textstr;
      max-elements 3;
    }
    amm:init-value "/AC/()";
  }
  amm:ctrl reset {
    amm:parameter which {
      amm:type level;
      amm:default "0";
    }
    amm:result done {
      amm:type bool;
    }
  }
  amm:oper add {
    if-feature extra;
    amm:operand left {
      amm:type vast;
    }
    amm:operand right {
      amm:type vast;
    }
    amm:result sum {
      amm:type vast;
    }
  }
}
"#;

fn setup() -> ExtensionRegistry {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
    ExtensionRegistry::new()
}

#[test]
fn decode_module_header() {
    let registry = setup();
    let module = ModuleDecoder::new(&registry).decode_text(EXAMPLE_ADM).expect("decode");
    assert_eq!(module.name, "example-adm");
    assert_eq!(module.ns_enum, Some(65535));
    assert_eq!(module.prefix(), Some("ex"));
    assert_eq!(module.imports, vec![Import { module: "ietf-amm".to_string(), prefix: "amm".to_string() }]);
    assert_eq!(module.revisions[0].name, "2024-01-01");
    assert_eq!(module.revisions[0].description.as_deref(), Some("Initial version."));
    assert_eq!(module.features[0].name, "extra");
    assert!(module.matches(&IdSeg::from("EXAMPLE-ADM")));
    assert!(module.matches(&IdSeg::Int(65535)));
}

#[test]
fn decode_typedefs_and_idents() {
    let registry = setup();
    let module = ModuleDecoder::new(&registry).decode_text(EXAMPLE_ADM).expect("decode");
    assert_eq!(module.typedefs.len(), 3);

    let counter = module.typedef("COUNTER").expect("counter");
    assert_eq!(counter.enum_id, 1);
    assert_eq!(counter.description.as_deref(), Some("A count."));
    let SemType::Use(typeuse) = &counter.typeobj else {
        panic!("counter is a type use");
    };
    assert_eq!(typeuse.base.name, "uvast");
    assert_eq!(typeuse.units.as_deref(), Some("events"));
    assert!(matches!(&typeuse.constraints[..], [Constraint::Range(ranges)] if ranges.to_string() == "0..max"));

    // missing enums take the position within their section
    assert_eq!(module.typedef("level").expect("level").enum_id, 1);
    assert_eq!(module.typedef("pair").expect("pair").enum_id, 2);
    assert!(matches!(module.typedef("pair").expect("pair").typeobj, SemType::DiverseList(_)));
    assert!(module.typedef_by_id(&IdSeg::Int(2)).is_some());

    let derived = module.ident(&IdSeg::from("derived")).expect("derived");
    assert_eq!(derived.enum_id, 1);
    assert_eq!(derived.bases[0].text, "./IDENT/base-ident");
    assert_eq!(derived.bases[0].ari.ident.ns_id, None);
}

#[test]
fn decode_objects() {
    let registry = setup();
    let module = ModuleDecoder::new(&registry).decode_text(EXAMPLE_ADM).expect("decode");

    let edd = module.object(StructType::Edd, &IdSeg::Int(0)).expect("edd by enum");
    assert_eq!(edd.name, "num-events");
    assert!(edd.typeobj.is_some());

    let limit = module.object(StructType::Const, &IdSeg::from("limit")).expect("const");
    assert_eq!(limit.init_value.as_deref(), Some("10"));

    let reset = module.object(StructType::Ctrl, &IdSeg::from("reset")).expect("ctrl");
    assert_eq!(reset.params.len(), 1);
    assert_eq!(reset.params[0].default.as_deref(), Some("0"));
    assert_eq!(reset.result.as_ref().map(|result| result.name.as_str()), Some("done"));

    let add = module.object(StructType::Oper, &IdSeg::from("add")).expect("oper");
    assert_eq!(add.operands.iter().map(|op| op.name.as_str()).collect::<Vec<_>>(), vec!["left", "right"]);
    assert_eq!(add.if_feature.as_deref(), Some("extra"));

    assert_eq!(module.objects_of(ObjectKind::Var).count(), 1);
    assert!(module.object(StructType::Var, &IdSeg::from("num-events")).is_none());
}

#[test]
fn encoded_text_is_stable() {
    let registry = setup();
    let decoder = ModuleDecoder::new(&registry);
    let encoder = ModuleEncoder::new(&registry);
    let module = decoder.decode_text(EXAMPLE_ADM).expect("decode");
    let text = encoder.encode_text(&module);
    assert!(text.starts_with("module example-adm {\n"));
    assert!(text.contains("  amm:typedef level {\n    amm:enum 1;\n"));

    let again = decoder.decode_text(&text).expect("decode encoded text");
    assert_eq!(again.objects.len(), module.objects.len());
    assert_eq!(encoder.encode_text(&again), text);
}

#[test]
fn resolve_typedefs_in_set() {
    let registry = setup();
    let mut adms = AdmSet::new();
    adms.load_text(&registry, EXAMPLE_ADM).expect("load");
    assert_eq!(adms.len(), 1);
    let adms = Arc::new(adms);

    let level = adms.resolve_typedef("example-adm", "level").expect("level");
    assert!(level.get(&Ari::from(5)).is_some());
    assert!(level.get(&Ari::from(1)).is_none());

    let pair = adms.resolve_typedef("example-adm", "pair").expect("pair");
    let input = Ari::Literal(LiteralAri::new(Value::List(vec![Ari::from("a"), Ari::from(3)])));
    let want = Ari::Literal(LiteralAri::typed(
        Value::List(vec![
            Ari::Literal(LiteralAri::typed("a", StructType::TextStr)),
            Ari::Literal(LiteralAri::typed(3, StructType::Uvast)),
        ]),
        StructType::Ac,
    ));
    assert_eq!(pair.get(&input), Some(want));

    assert!(adms.resolve_typedef("example-adm", "missing").is_err());
    assert!(adms.resolve_typedef("other-adm", "level").is_err());
}

#[test]
fn type_statement_count_is_checked() {
    let registry = setup();
    let decoder = ModuleDecoder::new(&registry);
    let err = decoder
        .decode_text("module bad { import ietf-amm { prefix amm; } amm:typedef x { amm:type int; amm:type uint; } }")
        .expect_err("two types");
    assert!(err.to_string().contains("too many types"));
    let err = decoder
        .decode_text("module bad { import ietf-amm { prefix amm; } amm:typedef x { description none; } }")
        .expect_err("no type");
    assert!(err.to_string().contains("no type"));
}

#[test]
fn init_values_only_reference_imports() {
    let registry = setup();
    let decoder = ModuleDecoder::new(&registry);
    let text = r#"module bad {
      import ietf-amm { prefix amm; }
      amm:var other {
        amm:type obj-ref;
        amm:init-value "//other-adm/CONST/x";
      }
    }"#;
    assert!(decoder.decode_text(text).is_err());
    let text = text.replace("//other-adm/", "//bad/");
    assert!(decoder.decode_text(&text).is_ok());
}

#[test]
fn non_module_text_is_rejected() {
    let registry = setup();
    let decoder = ModuleDecoder::new(&registry);
    assert!(decoder.decode_text("submodule x;").is_err());
    assert!(decoder.decode_text("module x {").is_err());
}

#[test]
fn statement_text() {
    setup();
    let stmt = Statement::parse("a b { c \"d e\"; f; }").expect("parse");
    assert_eq!(stmt.keyword, "a");
    assert_eq!(stmt.arg.as_deref(), Some("b"));
    assert_eq!(stmt.find_one("c").map(Statement::arg_str), Some("d e"));
    assert_eq!(stmt.find_one("f").and_then(|f| f.arg.clone()), None);
    assert_eq!(stmt.to_text(), "a b {\n  c \"d e\";\n  f;\n}\n");
    assert_eq!(Statement::parse(&stmt.to_text()).expect("parse again"), stmt);
}

#[test]
fn statement_arguments() {
    setup();
    let stmt = Statement::parse("x \"ab\" + 'c\\d';").expect("concatenation");
    assert_eq!(stmt.arg_str(), "abc\\d");
    let stmt = Statement::parse("x \"a\\nb\\\"\";").expect("escapes");
    assert_eq!(stmt.arg_str(), "a\nb\"");
    let stmt = Statement::parse("x \"line one\n    line two\";").expect("continuation");
    assert_eq!(stmt.arg_str(), "line one\nline two");
    let stmt = Statement::parse("// leading\nx /* inner */ y;").expect("comments");
    assert_eq!(stmt.arg_str(), "y");
    assert!(Statement::parse("x \"\\q\";").is_err());
}

#[test]
fn statement_building() {
    setup();
    let mut root = Statement::new("module", Some("m"));
    root.add("import", Some("ietf-amm")).add("prefix", Some("amm"));
    root.push(Statement::new("description", Some("two words")));
    assert_eq!(root.find_all("import").count(), 1);
    assert_eq!(
        root.to_text(),
        "module m {\n  import ietf-amm {\n    prefix amm;\n  }\n  description \"two words\";\n}\n"
    );
}

#[test]
fn extension_registry() {
    let mut registry = setup();
    assert!(registry.is_registered("typedef"));
    assert!(!registry.is_registered("custom"));
    registry.register("custom");
    assert!(registry.is_registered("custom"));
    assert_eq!(registry.module(), "ietf-amm");
}
