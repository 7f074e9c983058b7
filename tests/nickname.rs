use ace::adm::{AdmSet, ExtensionRegistry};
use ace::ari::Ari;
use ace::ari_text::Decoder;
use ace::error::AriError;
use ace::nickname::{Converter, Mode};
use tracing_subscriber::EnvFilter;

const NAMED_ADM: &str = r#"
module named-adm {
  prefix named;
  import ietf-amm { prefix amm; }
  amm:enum 25;
  amm:typedef count {
    amm:type uint;
  }
  amm:ident animal;
  amm:edd num {
    amm:enum 3;
    amm:type uint;
  }
  amm:ctrl reset {
    amm:parameter which {
      amm:type int;
    }
  }
}
"#;

const UNNUMBERED_ADM: &str = r#"
module unnumbered-adm {
  prefix un;
  import ietf-amm { prefix amm; }
  amm:edd num {
    amm:type uint;
  }
}
"#;

fn setup() -> AdmSet {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
    let registry = ExtensionRegistry::new();
    let mut adms = AdmSet::new();
    adms.load_text(&registry, NAMED_ADM).expect("named module");
    adms.load_text(&registry, UNNUMBERED_ADM).expect("unnumbered module");
    adms
}

fn ari(text: &str) -> Ari {
    Decoder::new().decode(text).expect("ARI text")
}

#[test]
fn names_to_nicknames() {
    let adms = setup();
    let conv = Converter::new(Mode::ToNickname, &adms, false);
    assert_eq!(conv.convert(&ari("ari://named-adm/EDD/num")).expect("edd"), ari("ari://25/EDD/3"));
    assert_eq!(conv.convert(&ari("ari://NAMED-ADM/TYPEDEF/count")).expect("typedef"), ari("ari://25/TYPEDEF/0"));
    assert_eq!(conv.convert(&ari("ari://named-adm/IDENT/animal")).expect("ident"), ari("ari://25/IDENT/0"));
    // already a nickname
    assert_eq!(conv.convert(&ari("ari://25/EDD/3")).expect("nickname"), ari("ari://25/EDD/3"));
}

#[test]
fn nested_references_are_converted() {
    let adms = setup();
    let conv = Converter::new(Mode::ToNickname, &adms, false);
    let got = conv
        .convert(&ari("ari:/AC/(//named-adm/CTRL/reset(//named-adm/EDD/num),/AM/(a=//named-adm/EDD/num),3)"))
        .expect("convert");
    assert_eq!(got, ari("ari:/AC/(//25/CTRL/0(//25/EDD/3),/AM/(a=//25/EDD/3),3)"));

    let got = conv.convert(&ari("ari:/EXECSET/n=1;(//named-adm/CTRL/reset(1))")).expect("convert");
    assert_eq!(got, ari("ari:/EXECSET/n=1;(//25/CTRL/0(1))"));
}

#[test]
fn nicknames_to_names() {
    let adms = setup();
    let conv = Converter::new(Mode::FromNickname, &adms, true);
    assert_eq!(conv.convert(&ari("ari://25/EDD/3")).expect("edd"), ari("ari://named-adm/EDD/num"));
    assert_eq!(
        conv.convert(&ari("ari:/AC/(//25/CTRL/0(//25/EDD/3))")).expect("nested"),
        ari("ari:/AC/(//named-adm/CTRL/reset(//named-adm/EDD/num))")
    );
    // names are left alone
    assert_eq!(conv.convert(&ari("ari://named-adm/EDD/num")).expect("named"), ari("ari://named-adm/EDD/num"));
}

#[test]
fn missing_nicknames_are_kept_unless_required() {
    let adms = setup();
    let lenient = Converter::new(Mode::ToNickname, &adms, false);
    for text in ["ari://unnumbered-adm/EDD/num", "ari://named-adm/EDD/missing", "ari://other-adm/EDD/num", "ari:./EDD/num"] {
        assert_eq!(lenient.convert(&ari(text)).expect(text), ari(text));
    }

    let strict = Converter::new(Mode::ToNickname, &adms, true);
    let err = strict.convert(&ari("ari://unnumbered-adm/EDD/num")).expect_err("no module enumeration");
    assert!(matches!(&err, AriError::Schema(message) if message.contains("does not have an enumeration")));
    let err = strict.convert(&ari("ari:/AC/(1,//named-adm/EDD/missing)")).expect_err("no object");
    assert!(matches!(&err, AriError::Schema(message) if message.contains("does not exist")));
    assert!(strict.convert(&ari("ari://99/EDD/0")).is_ok());
    assert!(Converter::new(Mode::FromNickname, &adms, true).convert(&ari("ari://99/EDD/0")).is_err());
}

#[test]
fn round_trip_through_nicknames() {
    let adms = setup();
    let to = Converter::new(Mode::ToNickname, &adms, true);
    let from = Converter::new(Mode::FromNickname, &adms, true);
    let original = ari("ari:/RPTSET/n=null;r=20240102T030405Z;(t=PT;s=//named-adm/CTRL/reset;(//named-adm/EDD/num))");
    let nicknamed = to.convert(&original).expect("to nicknames");
    assert_ne!(nicknamed, original);
    assert_eq!(from.convert(&nicknamed).expect("from nicknames"), original);
}
