//! # Scale Barcodes
//!
//! Counter scales print EAN-13 labels that carry a product code and a weight
//! instead of a fixed article number.
//!
//! ## Label Layout
//! ```text
//!   2 0 1 0 0 0 1 0 1 2 5 0 5
//!   └┬┘ └───┬───┘ └───┬───┘ └─ check digit (ignored)
//!    │      │         └─────── weight in grams → 1.250 kg
//!    │      └───────────────── product code    → "10001"
//!    └──────────────────────── scale prefix
//! ```
//!
//! A product matches a scale code when its barcode equals the code, or equals
//! it once left-padded to five digits with zeros (`"42"` matches `"00042"`).
//! A scale-shaped code that matches nothing is retried as a plain barcode.

use rust_decimal::Decimal;

use crate::types::Product;

const SCALE_PREFIX: &str = "20";
const SCALE_CODE_LEN: usize = 13;
const PRODUCT_CODE_WIDTH: usize = 5;

/// A scanned or typed code, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    /// Weighed-item label.
    Weighed {
        raw: String,
        product_code: String,
        weight_kg: Decimal,
    },
    /// Anything else: an article barcode.
    Plain(String),
}

/// A product found for a scan, with the label weight when there was one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMatch {
    pub product: Product,
    pub quantity: Option<Decimal>,
}

impl ScanInput {
    /// Classifies raw scanner input. Surrounding whitespace is ignored.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::scale::ScanInput;
    /// use rust_decimal::Decimal;
    ///
    /// match ScanInput::parse("2010001012505") {
    ///     ScanInput::Weighed { product_code, weight_kg, .. } => {
    ///         assert_eq!(product_code, "10001");
    ///         assert_eq!(weight_kg, Decimal::new(1250, 3));
    ///     }
    ///     ScanInput::Plain(_) => unreachable!(),
    /// }
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if raw.len() == SCALE_CODE_LEN
            && raw.starts_with(SCALE_PREFIX)
            && raw.chars().all(|c| c.is_ascii_digit())
        {
            let product_code = &raw[2..7];
            if let Ok(grams) = raw[7..12].parse::<i64>() {
                return ScanInput::Weighed {
                    raw: raw.to_string(),
                    product_code: product_code.to_string(),
                    weight_kg: Decimal::new(grams, 3),
                };
            }
        }

        ScanInput::Plain(raw.to_string())
    }

    /// The full code as scanned.
    pub fn raw(&self) -> &str {
        match self {
            ScanInput::Weighed { raw, .. } => raw,
            ScanInput::Plain(raw) => raw,
        }
    }

    /// Finds the product this scan refers to.
    pub fn resolve<'a, I>(&self, products: I) -> Option<ScanMatch>
    where
        I: IntoIterator<Item = &'a Product>,
    {
        let products: Vec<&Product> = products.into_iter().collect();

        if let ScanInput::Weighed {
            product_code,
            weight_kg,
            ..
        } = self
        {
            let weighed = products.iter().find(|p| {
                p.barcode
                    .as_deref()
                    .is_some_and(|barcode| scale_code_matches(barcode, product_code))
            });
            if let Some(product) = weighed {
                return Some(ScanMatch {
                    product: (*product).clone(),
                    quantity: Some(*weight_kg),
                });
            }
        }

        let raw = self.raw();
        products
            .into_iter()
            .find(|p| p.barcode.as_deref() == Some(raw))
            .map(|product| ScanMatch {
                product: product.clone(),
                quantity: None,
            })
    }
}

/// True when a stored barcode matches a scale product code.
pub fn scale_code_matches(barcode: &str, product_code: &str) -> bool {
    barcode == product_code || format!("{barcode:0>width$}", width = PRODUCT_CODE_WIDTH) == product_code
}

// =============================================================================
// Unit Tests
// =============================================================================
