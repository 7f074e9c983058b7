use std::collections::BTreeSet;
use std::sync::Arc;

use ace::adm::{AdmSet, ExtensionRegistry};
use ace::ari::{Ari, IdSeg, Identity, LiteralAri, ReferenceAri, StructType, Value};
use ace::ari_text::Decoder;
use ace::error::{AriError, TypeName};
use ace::lookup::{ModuleDirectory, RelativeResolver, Target, TypeResolver, dereference};
use ace::typing::{Binding, SemType};
use tracing_subscriber::EnvFilter;

const BASE_ADM: &str = r#"
module base-adm {
  prefix base;
  import ietf-amm { prefix amm; }
  amm:enum 10;
  amm:typedef count {
    amm:type uint;
  }
  amm:ident animal;
  amm:ident dog {
    amm:base "./IDENT/animal";
  }
  amm:ident puppy {
    amm:base "./IDENT/dog";
  }
  amm:ident rock;
  amm:edd num {
    amm:type count;
  }
}
"#;

const USER_ADM: &str = r#"
module user-adm {
  prefix user;
  import ietf-amm { prefix amm; }
  import base-adm { prefix base; }
  amm:typedef pets {
    amm:ulist {
      amm:type base:count;
    }
  }
  amm:typedef both {
    amm:union {
      amm:type base:count;
      amm:type base:count;
    }
  }
  amm:typedef pet-ref {
    amm:type ident {
      amm:base "//base-adm/IDENT/animal";
    }
  }
  amm:typedef bad-ref {
    amm:type ident {
      amm:base "//base-adm/IDENT/plant";
    }
  }
  amm:typedef broken {
    amm:dlist {
      amm:type nothing;
      amm:type base:absent;
    }
  }
  amm:typedef short-name {
    amm:type textstr {
      range "0..4";
    }
  }
  amm:typedef short-count {
    amm:type base:count {
      length "0..4";
    }
  }
  amm:typedef loop-a {
    amm:type loop-b;
  }
  amm:typedef loop-b {
    amm:type loop-a;
  }
}
"#;

fn setup() -> Arc<AdmSet> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
    let registry = ExtensionRegistry::new();
    let mut adms = AdmSet::new();
    adms.load_text(&registry, BASE_ADM).expect("base module");
    adms.load_text(&registry, USER_ADM).expect("user module");
    Arc::new(adms)
}

fn ident_ref(text: &str) -> Ari {
    Decoder::new().decode(text).expect("reference text")
}

fn badtypes(err: AriError) -> BTreeSet<TypeName> {
    match err {
        AriError::Resolve(err) => err.badtypes,
        other => panic!("not a resolver error: {other}"),
    }
}

#[test]
fn find_modules() {
    let adms = setup();
    assert_eq!(adms.len(), 2);
    assert!(adms.find_module(&IdSeg::from("BASE-ADM")).is_some());
    assert!(adms.find_module(&IdSeg::Int(10)).is_some());
    assert!(adms.find_module(&IdSeg::Int(11)).is_none());
    assert!(adms.find_typedef("base-adm", "count").is_some());
    assert!(adms.find_typedef("user-adm", "count").is_none());
}

#[test]
fn dereference_objects() {
    let adms = setup();
    let found = dereference(&*adms, &Identity::new("base-adm", StructType::Edd, "num"));
    assert!(matches!(found, Some(Target::Object(module, obj)) if module.name == "base-adm" && obj.name == "num"));
    let found = dereference(&*adms, &Identity::new(10i64, StructType::Edd, 0i64));
    assert!(matches!(found, Some(Target::Object(_, obj)) if obj.name == "num"));
    let found = dereference(&*adms, &Identity::new("base-adm", StructType::Typedef, "count"));
    assert!(matches!(found, Some(Target::Typedef(_, def)) if def.name == "count"));
    let found = dereference(&*adms, &Identity::new("base-adm", StructType::Ident, "dog"));
    assert!(matches!(found, Some(Target::Ident(_, def)) if def.bases.len() == 1));

    assert!(dereference(&*adms, &Identity::relative(StructType::Edd, "num")).is_none());
    assert!(dereference(&*adms, &Identity::new("base-adm", StructType::Var, "num")).is_none());
}

#[test]
fn relative_references_take_a_namespace() {
    setup();
    let resolver = RelativeResolver::new("base-adm");
    let got = resolver.resolve(&ident_ref("ari:/AC/(./EDD/num,//other-adm/EDD/x,./CTRL/reset(./EDD/num))"));
    let want = ident_ref("ari:/AC/(//base-adm/EDD/num,//other-adm/EDD/x,//base-adm/CTRL/reset(//base-adm/EDD/num))");
    assert_eq!(got, want);
    assert_eq!(resolver.resolve(&Ari::from(1)), Ari::from(1));
}

#[test]
fn resolve_across_modules() {
    let adms = setup();
    let pets = adms.resolve_typedef("user-adm", "pets").expect("pets");
    let input = Ari::Literal(LiteralAri::new(Value::List(vec![Ari::from(1), Ari::from(2)])));
    assert!(pets.get(&input).is_some());
    let negative = Ari::Literal(LiteralAri::new(Value::List(vec![Ari::from(-1)])));
    assert!(pets.convert(&negative).is_err());
}

#[test]
fn typedefs_are_bound_once_per_pass() {
    let adms = setup();
    let both = adms.resolve_typedef("user-adm", "both").expect("both");
    let SemType::Union(union) = &both else {
        panic!("both is a union");
    };
    let targets: Vec<_> = union
        .types
        .iter()
        .map(|member| match member {
            SemType::Use(typeuse) => match &typeuse.base {
                Binding::Named { name, target } => {
                    assert_eq!(name, &TypeName::new(Some("base-adm"), "count"));
                    Arc::clone(target)
                }
                Binding::Builtin(_) => panic!("count is a typedef"),
            },
            _ => panic!("members are type uses"),
        })
        .collect();
    assert!(Arc::ptr_eq(&targets[0], &targets[1]));
}

#[test]
fn missing_names_are_reported_together() {
    let adms = setup();
    let err = adms.resolve_typedef("user-adm", "broken").expect_err("broken");
    assert_eq!(
        badtypes(err),
        BTreeSet::from([TypeName::new(None, "nothing"), TypeName::new(Some("base-adm"), "absent")])
    );
}

#[test]
fn typedef_cycles_are_bad_types() {
    let adms = setup();
    // loop-a is a use of loop-b, which is where the walk closes
    let err = adms.resolve_typedef("user-adm", "loop-a").expect_err("cycle");
    assert_eq!(badtypes(err), BTreeSet::from([TypeName::new(Some("user-adm"), "loop-b")]));
}

#[test]
fn resolver_binds_names_directly() {
    let adms = setup();
    let directory: Arc<dyn ModuleDirectory> = Arc::clone(&adms) as Arc<dyn ModuleDirectory>;
    let mut resolver = TypeResolver::new(directory);
    let user = adms.find_module(&IdSeg::from("user-adm")).expect("user module");

    let bound = resolver.resolve(&SemType::named(Some("base-adm"), "count"), user).expect("count");
    assert_eq!(bound.type_ids(), BTreeSet::from([StructType::Uint]));
    let bound = resolver.resolve(&SemType::named(None, "TEXTSTR"), user).expect("builtin");
    assert!(bound.get(&Ari::from("x")).is_some());

    let err = resolver.resolve(&SemType::named(Some("nowhere"), "count"), user).expect_err("unknown module");
    assert_eq!(badtypes(err), BTreeSet::from([TypeName::new(Some("nowhere"), "count")]));
    // state does not leak between passes
    assert!(resolver.resolve(&SemType::named(None, "int"), user).is_ok());
}

#[test]
fn ident_base_derivation() {
    let adms = setup();
    let pet_ref = adms.resolve_typedef("user-adm", "pet-ref").expect("pet-ref");
    assert!(pet_ref.get(&ident_ref("//base-adm/IDENT/animal")).is_some());
    assert!(pet_ref.get(&ident_ref("//base-adm/IDENT/dog")).is_some());
    assert!(pet_ref.get(&ident_ref("//base-adm/IDENT/puppy")).is_some());
    assert!(pet_ref.get(&ident_ref("//10/IDENT/puppy")).is_some());
    assert!(pet_ref.get(&ident_ref("//base-adm/IDENT/rock")).is_none());
    assert!(pet_ref.get(&ident_ref("//base-adm/IDENT/unknown")).is_none());
    assert!(pet_ref.get(&ident_ref("//base-adm/EDD/num")).is_none());
    let reference = Ari::Reference(ReferenceAri::new(Identity::new("base-adm", StructType::Ident, "dog")));
    assert!(pet_ref.convert(&reference).is_ok());
}

#[test]
fn unknown_ident_base_is_a_bad_type() {
    let adms = setup();
    let err = adms.resolve_typedef("user-adm", "bad-ref").expect_err("bad-ref");
    assert_eq!(badtypes(err), BTreeSet::from([TypeName::new(Some("base-adm"), "plant")]));
}

#[test]
fn constraints_must_fit_their_type() {
    let adms = setup();
    for name in ["short-name", "short-count"] {
        let err = adms.resolve_typedef("user-adm", name).expect_err(name);
        assert!(matches!(&err, AriError::Schema(message) if message.contains("does not apply")), "{name}: {err}");
    }
}
