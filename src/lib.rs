//! Scanned-code quoting service.
//!
//! A barcode (ISBN-10/13, UPC, ASIN) is normalized, resolved to product
//! attributes through an external provider, priced by the decision engine and
//! cached under its normalized key.

pub mod api;
pub mod cache;
pub mod config;
pub mod logging;
pub mod lookup;
pub mod normalization;
pub mod pricing;
pub mod product;
pub mod providers;

pub mod util {
    pub mod env;
}
