//! Ace – encoding, decoding and typing of Application Resource Identifiers.
//!
//! An ARI is either a *literal* value (optionally tagged with a struct type)
//! or a *reference* to a managed object defined in an application data
//! model (ADM), optionally with parameters.
//!
//! ## Modules
//! * [`ari`] – The value model: [`ari::Ari`], [`ari::LiteralAri`],
//!   [`ari::ReferenceAri`] and the [`ari::StructType`] tags.
//! * [`ari_text`] – The URI-like text form (`ari:/INT/10`), parsed with pest.
//! * [`ari_cbor`] – The compact CBOR form.
//! * [`cbor`] – A small CBOR item tree shared by the binary codec and the
//!   `/CBOR/` literal.
//! * [`typing`] – Semantic types which check and convert ARIs.
//! * [`lookup`] – Module directories and the resolver binding type names.
//! * [`adm`] – ADM modules in YANG statement form.
//! * [`nickname`] – Swapping reference names for their integer enumerations.
//! * [`settings`] – Encoder preferences from config files and environment.
//!
//! ## Quick Start
//! ```
//! use ace::ari_cbor;
//! use ace::ari_text::{Decoder, EncodeOptions, Encoder};
//!
//! let ari = Decoder::new().decode("ari:/AC/(1,/INT/2)").unwrap();
//! let data = ari_cbor::Encoder::new().encode(&ari).unwrap();
//! let back = ari_cbor::Decoder::new().decode(&data).unwrap();
//! assert_eq!(ari, back);
//! assert_eq!(Encoder::new(EncodeOptions::default()).encode(&back).unwrap(), "ari:/AC/(1,/INT/2)");
//! ```

pub mod adm;
pub mod ari;
pub mod ari_cbor;
pub mod ari_text;
pub mod cbor;
pub mod error;
pub mod lookup;
pub mod nickname;
pub mod settings;
pub mod typing;
