//! Invoice list and detail records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the paginated invoice list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    /// Invoice number
    pub invoice_number: String,

    /// Invoice date (ISO on the wire)
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,

    /// Order number the invoice settles, when linked
    #[serde(default)]
    pub order_number: Option<String>,

    /// Invoice total
    #[serde(default)]
    pub total_amount: f64,

    /// Portal status text
    #[serde(default)]
    pub status: Option<String>,
}

/// One page of the invoice list
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceList {
    /// The summaries on this page
    #[serde(default)]
    pub invoices: Vec<InvoiceSummary>,

    /// Total rows across all pages
    #[serde(default)]
    pub total_count: u64,

    /// Zero-based page number
    #[serde(default)]
    pub page_number: u32,

    /// Page size the portal used
    #[serde(default)]
    pub page_size: u32,
}

impl InvoiceList {
    /// Whether more pages follow this one
    pub fn has_more(&self) -> bool {
        let seen = u64::from(self.page_number + 1) * u64::from(self.page_size);
        self.page_size > 0 && seen < self.total_count
    }

    /// Fold another page's rows into this one
    pub fn merge(&mut self, other: InvoiceList) {
        self.invoices.extend(other.invoices);
        self.total_count = self.total_count.max(other.total_count);
    }
}

/// A ship-to or bill-to party on an invoice
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    /// Party name
    #[serde(default)]
    pub name: String,

    /// City
    #[serde(default)]
    pub city: Option<String>,

    /// State/region code
    #[serde(default)]
    pub state: Option<String>,

    /// Postal code
    #[serde(default)]
    pub zip_code: Option<String>,
}

/// One invoice line item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    /// Line number within the invoice
    #[serde(default)]
    pub line_number: u32,

    /// UPC, when the line is a retail item
    #[serde(default, alias = "upcNumber")]
    pub upc: Option<String>,

    /// Portal item number
    pub item_number: String,

    /// Brand name
    #[serde(default)]
    pub brand: String,

    /// Line description
    #[serde(default)]
    pub product_description: String,

    /// Cases ordered
    #[serde(default)]
    pub order_quantity: u32,

    /// Cases shipped
    #[serde(default)]
    pub ship_quantity: u32,

    /// Units per case
    #[serde(default)]
    pub pack: Option<u32>,

    /// Unit size text
    #[serde(default)]
    pub size: Option<String>,

    /// Regular case price
    #[serde(default)]
    pub regular_case_price: f64,

    /// Net case price after discounts
    #[serde(default)]
    pub net_case_price: f64,

    /// Extended line price
    #[serde(default)]
    pub extended_price: f64,
}

/// Full invoice detail
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Invoice number
    pub invoice_number: String,

    /// Invoice date
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,

    /// Delivery address
    #[serde(default)]
    pub ship_to: Option<Party>,

    /// Billing address
    #[serde(default)]
    pub bill_to: Option<Party>,

    /// Line items
    #[serde(default, alias = "lineItems")]
    pub lines: Vec<InvoiceLine>,

    /// Invoice total
    #[serde(default)]
    pub total_amount: f64,
}
