//! Product search and detail records

use serde::{Deserialize, Serialize};

/// One hit from the product search endpoint
///
/// Carries just enough to list the product and to fetch its full
/// [`ProductRecord`] afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHit {
    /// Portal item number, the key used for detail fetches
    #[serde(alias = "itemNumber")]
    pub product_number: String,

    /// UPC-A as printed by the portal (may be absent for non-retail items)
    #[serde(default)]
    pub upc: Option<String>,

    /// Brand name
    #[serde(default)]
    pub brand: String,

    /// Product description
    #[serde(default)]
    pub description: String,

    /// Pack/size text, e.g. "12/16 OZ"
    #[serde(default)]
    pub pack_size: Option<String>,

    /// Whether the portal advertises an image for this product
    #[serde(default)]
    pub image_available: bool,
}

impl std::fmt::Display for ProductHit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.brand, self.description, self.product_number)
    }
}

/// One page of search results
///
/// The portal paginates; [`SearchPage::merge`] folds later pages into the
/// first so callers see a single result set per query.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// The query string this page answered (filled in client-side)
    #[serde(default)]
    pub query: String,

    /// Total hits across all pages
    #[serde(default)]
    pub total_hits: u64,

    /// Zero-based page number
    #[serde(default)]
    pub page_number: u32,

    /// Page size the portal used
    #[serde(default)]
    pub page_size: u32,

    /// The hits on this page
    #[serde(default, alias = "items")]
    pub hits: Vec<ProductHit>,
}

impl SearchPage {
    /// Whether more pages follow this one
    pub fn has_more(&self) -> bool {
        let seen = u64::from(self.page_number + 1) * u64::from(self.page_size);
        self.page_size > 0 && seen < self.total_hits
    }

    /// Fold another page's hits into this one
    pub fn merge(&mut self, other: SearchPage) {
        self.hits.extend(other.hits);
        self.total_hits = self.total_hits.max(other.total_hits);
    }
}

/// Case and unit pricing for a product
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    /// Net price per case
    #[serde(alias = "netPrice")]
    pub case_price: f64,

    /// Net price per unit
    #[serde(alias = "netUnitPrice")]
    pub unit_price: f64,

    /// Suggested retail price, when the portal publishes one
    #[serde(default)]
    pub srp: Option<f64>,
}

/// An active promotion attached to a product
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    /// Promotion description
    #[serde(default)]
    pub description: String,

    /// Discount type code
    #[serde(default)]
    pub discount_type: String,

    /// Discount value in the unit the type implies
    #[serde(default)]
    pub discount_value: f64,

    /// Start date as published (format varies by host system)
    #[serde(default)]
    pub start_date: String,

    /// End date as published
    #[serde(default)]
    pub end_date: String,
}

/// Full product detail, fetched per hit by the download job
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Portal item number
    #[serde(alias = "itemNumber")]
    pub product_number: String,

    /// UPC-A as printed by the portal
    #[serde(default)]
    pub upc: Option<String>,

    /// Brand name
    #[serde(default)]
    pub brand: String,

    /// Product description
    #[serde(default)]
    pub description: String,

    /// Units per case
    #[serde(default)]
    pub pack: Option<u32>,

    /// Unit size text, e.g. "16 OZ"
    #[serde(default)]
    pub size: Option<String>,

    /// Department name
    #[serde(default)]
    pub department: Option<String>,

    /// Category name
    #[serde(default)]
    pub category: Option<String>,

    /// Whether the product is certified organic
    #[serde(default)]
    pub organic: bool,

    /// Whether the portal advertises an image
    #[serde(default)]
    pub image_available: bool,

    /// Current pricing, when the account is entitled to see it
    #[serde(default)]
    pub pricing: Option<Pricing>,

    /// Active promotions
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}
