//! The URI-like text form of ARIs.
//!
//! Decoding runs the pest grammar in `ari.pest` over the raw text, then
//! unquotes and classifies each segment (see [`lex`]). Encoding is the
//! inverse and is tuned through [`EncodeOptions`].

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Deserialize;
use tracing::debug;

use crate::ari::Ari;
use crate::error::{AriError, Result};

pub mod encode;
pub mod lex;
pub mod parse;

/// Characters left as-is by [`quote`].
const QUOTE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'.').remove(b'-').remove(b'~').remove(b'+');

/// Percent-encode everything outside the unreserved value characters.
pub fn quote(text: &str) -> String {
    utf8_percent_encode(text, QUOTE_SET).to_string()
}

pub fn unquote(text: &str) -> Result<Cow<'_, str>> {
    percent_decode_str(text)
        .decode_utf8()
        .map_err(|err| AriError::parse(format!("invalid percent-encoding in {text}: {err}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum FloatForm {
    /// Fixed point with six decimals.
    #[serde(rename = "f")]
    Fixed,
    /// Scientific with six decimals.
    #[serde(rename = "e")]
    Exponent,
    /// Shortest text that reads back as the same value.
    #[default]
    #[serde(rename = "g")]
    General,
    /// The CBOR float body in hexadecimal, `0fx...`.
    #[serde(rename = "x")]
    RawHex,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Prefix the top-level ARI with `ari:`.
    pub scheme_prefix: bool,
    /// One of 2, 10 or 16.
    pub int_base: u32,
    pub float_form: FloatForm,
    /// Write identifier-like text without quotes.
    pub text_identity: bool,
    /// Write TP and TD values as timestamps and periods rather than seconds.
    pub time_text: bool,
    /// Write CBOR values in diagnostic notation.
    pub cbor_diag: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            scheme_prefix: true,
            int_base: 10,
            float_form: FloatForm::General,
            text_identity: true,
            time_text: true,
            cbor_diag: false,
        }
    }
}

impl EncodeOptions {
    pub fn validate(&self) -> Result<()> {
        match self.int_base {
            2 | 10 | 16 => Ok(()),
            other => Err(AriError::Config(format!("integer base must be 2, 10 or 16, not {other}"))),
        }
    }
}

/// Text to [`Ari`] decoder.
#[derive(Debug, Default, Clone)]
pub struct Decoder {}

impl Decoder {
    pub fn new() -> Self {
        Self {}
    }

    pub fn decode(&self, text: &str) -> Result<Ari> {
        let ari = parse::parse_ari(text.trim())?;
        debug!("decoded text {} to {:?}", text, ari);
        Ok(ari)
    }
}

/// [`Ari`] to text encoder.
#[derive(Debug, Default, Clone)]
pub struct Encoder {
    options: EncodeOptions,
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn encode(&self, ari: &Ari) -> Result<String> {
        let mut buf = String::new();
        encode::write_ari(&mut buf, ari, &self.options, self.options.scheme_prefix)?;
        debug!("encoded text {}", buf);
        Ok(buf)
    }
}
