//! Typed records mapped from the portal's JSON responses
//!
//! Field names mirror the vendor's camelCase wire format through serde
//! aliases; optional fields default rather than fail, since the portal
//! omits them freely. These are thin mappings — no fetch logic lives here.

mod invoice;
mod order;
mod product;
mod upc;

pub use invoice::{Invoice, InvoiceLine, InvoiceList, InvoiceSummary, Party};
pub use order::{OpenOrder, OpenOrders, OrderLine};
pub use product::{Pricing, ProductHit, ProductRecord, Promotion, SearchPage};
pub use upc::Upc;
