use ace::ari::Ari;
use ace::ari_text::{EncodeOptions, Encoder, FloatForm};
use ace::error::AriError;
use ace::settings::Settings;
use tracing_subscriber::EnvFilter;

fn setup() {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

#[test]
fn defaults_when_empty() {
    setup();
    let settings = Settings::from_toml_str("").expect("empty settings");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.encode, EncodeOptions::default());
}

#[test]
fn encode_section() {
    setup();
    let settings = Settings::from_toml_str(
        r#"
        [encode]
        int_base = 16
        float_form = "e"
        scheme_prefix = false
        "#,
    )
    .expect("settings");
    assert_eq!(settings.encode.int_base, 16);
    assert_eq!(settings.encode.float_form, FloatForm::Exponent);
    assert!(!settings.encode.scheme_prefix);
    // untouched fields keep their defaults
    assert!(settings.encode.time_text);

    let encoder = Encoder::new(settings.encode);
    assert_eq!(encoder.encode(&Ari::from(255)).expect("encode"), "0xff");
    assert_eq!(encoder.encode(&Ari::from(1000.0)).expect("encode"), "1.000000e+03");
}

#[test]
fn invalid_values_are_rejected() {
    setup();
    let err = Settings::from_toml_str("[encode]\nint_base = 3\n").expect_err("base 3");
    assert!(matches!(err, AriError::Config(_)));
    assert!(Settings::from_toml_str("[encode]\nfloat_form = \"z\"\n").is_err());
    assert!(Settings::from_toml_str("[encode\n").is_err());
}

#[test]
fn load_from_file() {
    setup();
    let path = std::env::temp_dir().join(format!("ace-settings-{}.toml", std::process::id()));
    std::fs::write(&path, "[encode]\nint_base = 2\ncbor_diag = true\n").expect("write settings file");
    let settings = Settings::load(path.to_str().expect("utf-8 path")).expect("load");
    std::fs::remove_file(&path).expect("remove settings file");
    assert_eq!(settings.encode.int_base, 2);
    assert!(settings.encode.cbor_diag);
}

#[test]
fn missing_file_is_not_an_error() {
    setup();
    let path = std::env::temp_dir().join("ace-settings-missing.toml");
    assert!(Settings::load(path.to_str().expect("utf-8 path")).is_ok());
}
