//! Open order records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One line of an open order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Line number within the order
    #[serde(default)]
    pub line_number: u32,

    /// UPC, when the line is a retail item
    #[serde(default)]
    pub upc: Option<String>,

    /// Portal item number
    pub item_number: String,

    /// Cases ordered
    #[serde(default)]
    pub quantity_ordered: u32,

    /// Cases confirmed/shipped so far
    #[serde(default)]
    pub quantity_shipped: u32,

    /// Line description
    #[serde(default)]
    pub item_description: Option<String>,

    /// Brand name
    #[serde(default)]
    pub brand: Option<String>,
}

/// An order that has been submitted but not yet invoiced
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    /// Order number
    pub order_number: String,

    /// Purchase order reference, when supplied at submission
    #[serde(default)]
    pub po_number: Option<String>,

    /// Submission date
    #[serde(default)]
    pub submitted_date: Option<NaiveDate>,

    /// Expected delivery date
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,

    /// Who submitted the order
    #[serde(default)]
    pub submitted_by: Option<String>,

    /// Order lines
    #[serde(default, alias = "items")]
    pub lines: Vec<OrderLine>,
}

/// Envelope the open-orders endpoint answers with
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrders {
    /// The open orders, newest first as the portal lists them
    #[serde(default)]
    pub open_orders: Vec<OpenOrder>,
}
