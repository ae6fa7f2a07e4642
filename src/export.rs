//! Spreadsheet export
//!
//! Turns downloaded records into a delimiter-separated table. Records
//! declare their own columns; the table header is the first-seen-order union
//! across all records, so records with differing fields (e.g. products with
//! and without pricing) land in one consistent sheet with blanks where a
//! column does not apply. Cell text is scrubbed of control characters that
//! spreadsheet applications reject.

use std::io::Write;
use std::path::Path;

use crate::config::Delimiter;
use crate::error::{ExportError, Result};
use crate::models::{Invoice, OpenOrder, ProductRecord};

/// A record that can contribute a row to an [`ExportTable`]
pub trait ExportRecord {
    /// Column/value pairs for this record's row, in preferred column order
    ///
    /// Omit a column entirely (rather than emitting an empty value) when the
    /// record has nothing for it; the table fills blanks during alignment.
    fn export_fields(&self) -> Vec<(&'static str, String)>;
}

/// A rectangular export table: one header row plus one row per record
#[derive(Clone, Debug)]
pub struct ExportTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// Build a table from records
    ///
    /// The header is the union of every record's columns in first-seen
    /// order; rows align to it with blanks for missing columns. Fails with
    /// [`ExportError::NoRecords`] when there is nothing to export.
    pub fn from_records<'a, T, It>(records: It) -> Result<Self>
    where
        T: ExportRecord + 'a,
        It: IntoIterator<Item = &'a T>,
    {
        let field_sets: Vec<Vec<(&'static str, String)>> =
            records.into_iter().map(ExportRecord::export_fields).collect();
        if field_sets.is_empty() {
            return Err(ExportError::NoRecords.into());
        }

        let mut header: Vec<String> = Vec::new();
        for fields in &field_sets {
            for (name, _) in fields {
                if !header.iter().any(|h| h == name) {
                    header.push((*name).to_string());
                }
            }
        }

        let rows = field_sets
            .into_iter()
            .map(|fields| {
                header
                    .iter()
                    .map(|column| {
                        fields
                            .iter()
                            .find(|(name, _)| name == column)
                            .map(|(_, value)| scrub(value))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Ok(Self { header, rows })
    }

    /// The header row
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// The data rows, aligned to the header
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table to any writer
    pub fn write<W: Write>(&self, mut writer: W, delimiter: Delimiter) -> Result<()> {
        let sep = delimiter.as_char();
        write_row(&mut writer, &self.header, sep)?;
        for row in &self.rows {
            write_row(&mut writer, row, sep)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the table to a file, creating parent directories as needed
    pub fn write_to_path(&self, path: impl AsRef<Path>, delimiter: Delimiter) -> Result<()> {
        let path = path.as_ref();
        let wrap = |source: std::io::Error| ExportError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
        let file = std::fs::File::create(path).map_err(wrap)?;
        let sep = delimiter.as_char();
        let mut writer = std::io::BufWriter::new(file);
        write_row(&mut writer, &self.header, sep).map_err(wrap)?;
        for row in &self.rows {
            write_row(&mut writer, row, sep).map_err(wrap)?;
        }
        writer.flush().map_err(wrap)?;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "export written");
        Ok(())
    }
}

/// Strip control characters spreadsheet applications reject, keeping tabs
/// and newlines (the writer quotes those)
fn scrub(cell: &str) -> String {
    cell.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n'))
        .collect()
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single row with minimal quoting
fn write_row<W: Write>(mut writer: W, row: &[String], sep: char) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(writer, "{sep}")?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            let escaped = cell.replace('"', "\"\"");
            write!(writer, "\"{escaped}\"")?;
        } else {
            write!(writer, "{cell}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

impl ExportRecord for ProductRecord {
    fn export_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("product_number", self.product_number.clone()),
            ("upc", self.upc.clone().unwrap_or_default()),
            ("brand", self.brand.clone()),
            ("description", self.description.clone()),
        ];
        if let Some(pack) = self.pack {
            fields.push(("pack", pack.to_string()));
        }
        if let Some(size) = &self.size {
            fields.push(("size", size.clone()));
        }
        if let Some(department) = &self.department {
            fields.push(("department", department.clone()));
        }
        if let Some(category) = &self.category {
            fields.push(("category", category.clone()));
        }
        fields.push(("organic", self.organic.to_string()));
        if let Some(pricing) = &self.pricing {
            fields.push(("case_price", format!("{:.2}", pricing.case_price)));
            fields.push(("unit_price", format!("{:.2}", pricing.unit_price)));
            if let Some(srp) = pricing.srp {
                fields.push(("srp", format!("{srp:.2}")));
            }
        }
        fields
    }
}

/// One invoice line flattened with its invoice context, ready for export
#[derive(Clone, Debug)]
pub struct InvoiceRow {
    invoice_number: String,
    invoice_date: String,
    line: crate::models::InvoiceLine,
}

impl ExportRecord for InvoiceRow {
    fn export_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("invoice_number", self.invoice_number.clone()),
            ("invoice_date", self.invoice_date.clone()),
            ("line_number", self.line.line_number.to_string()),
            ("upc", self.line.upc.clone().unwrap_or_default()),
            ("item_number", self.line.item_number.clone()),
            ("brand", self.line.brand.clone()),
            ("description", self.line.product_description.clone()),
            ("ordered", self.line.order_quantity.to_string()),
            ("shipped", self.line.ship_quantity.to_string()),
            ("net_case_price", format!("{:.2}", self.line.net_case_price)),
            ("extended_price", format!("{:.2}", self.line.extended_price)),
        ]
    }
}

/// Flatten an invoice into one exportable row per line item
pub fn invoice_rows(invoice: &Invoice) -> Vec<InvoiceRow> {
    invoice
        .lines
        .iter()
        .map(|line| InvoiceRow {
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice
                .invoice_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            line: line.clone(),
        })
        .collect()
}

/// One open-order line flattened with its order context, ready for export
#[derive(Clone, Debug)]
pub struct OrderRow {
    order_number: String,
    delivery_date: String,
    line: crate::models::OrderLine,
}

impl ExportRecord for OrderRow {
    fn export_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("order_number", self.order_number.clone()),
            ("delivery_date", self.delivery_date.clone()),
            ("line_number", self.line.line_number.to_string()),
            ("item_number", self.line.item_number.clone()),
            (
                "description",
                self.line.item_description.clone().unwrap_or_default(),
            ),
            ("ordered", self.line.quantity_ordered.to_string()),
            ("shipped", self.line.quantity_shipped.to_string()),
        ]
    }
}

/// Flatten an open order into one exportable row per line
pub fn order_rows(order: &OpenOrder) -> Vec<OrderRow> {
    order
        .lines
        .iter()
        .map(|line| OrderRow {
            order_number: order.order_number.clone(),
            delivery_date: order
                .delivery_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            line: line.clone(),
        })
        .collect()
}
