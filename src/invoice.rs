//! PDF invoices.
//!
//! The document is plain PDF 1.4 text in the built-in Helvetica font, so no
//! font files or layout engine are needed. Long orders continue on further
//! pages.

use std::io::{self, Write};

use thiserror::Error;

use crate::{models::Order, order::OrderSnapshot};

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 14;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("failed to write invoice: {0}")]
    Io(#[from] io::Error),
}

pub trait InvoiceRenderer: Send + Sync {
    fn render(&self, snapshot: &OrderSnapshot) -> Result<Vec<u8>, InvoiceError>;
}

/// `INV-<yyyymmdd>-<first 8 hex digits of the order id>`.
pub fn invoice_number(order: &Order) -> String {
    let simple = order.id.as_uuid().simple().to_string();
    format!(
        "INV-{}-{}",
        order.created_at.format("%Y%m%d"),
        &simple[..8]
    )
}

#[derive(Debug, Clone)]
pub struct PdfInvoiceRenderer {
    shop_name: String,
}

impl PdfInvoiceRenderer {
    pub fn new(shop_name: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
        }
    }

    fn lines(&self, snapshot: &OrderSnapshot) -> Vec<String> {
        let order = &snapshot.order;
        let mut lines = vec![
            format!("{} - Invoice", self.shop_name),
            String::new(),
            format!("Invoice number: {}", invoice_number(order)),
            format!("Order: {}", order.id),
            format!("Date: {}", order.created_at.format("%Y-%m-%d")),
            format!("Status: {}", order.status),
        ];
        if let Some(method) = &order.payment_method {
            lines.push(format!("Payment method: {method}"));
        }

        if let Some(address) = &snapshot.shipping_address {
            lines.push(String::new());
            lines.push("Ship to:".to_string());
            lines.extend(address.display_lines().into_iter().map(|l| format!("  {l}")));
        }

        lines.push(String::new());
        lines.push(format!(
            "{:<40} {:>5} {:>12} {:>12}",
            "Item", "Qty", "Unit", "Total"
        ));
        for item in &snapshot.items {
            lines.push(format!(
                "{:<40} {:>5} {:>12} {:>12}",
                clip(&item.product_name, 40),
                item.quantity.get(),
                item.price.to_string(),
                item.line_total.to_string()
            ));
        }

        lines.push(String::new());
        lines.push(format!("Subtotal: {}", snapshot.computed_total));
        lines.push("Shipping: 0.00".to_string());
        lines.push("Tax: 0.00".to_string());
        lines.push(format!("Grand total: {}", order.total_price));
        lines
    }
}

impl Default for PdfInvoiceRenderer {
    fn default() -> Self {
        Self::new("MegaMall")
    }
}

impl InvoiceRenderer for PdfInvoiceRenderer {
    fn render(&self, snapshot: &OrderSnapshot) -> Result<Vec<u8>, InvoiceError> {
        let lines = self.lines(snapshot);
        let pages: Vec<&[String]> = lines.chunks(LINES_PER_PAGE).collect();
        write_pdf(&pages)
    }
}

fn write_pdf(pages: &[&[String]]) -> Result<Vec<u8>, InvoiceError> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();

    // Objects: 1 catalog, 2 page tree, 3 font, then a page and its content
    // stream for every page.
    let object_count = 3 + pages.len() * 2;
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + i * 2))
        .collect::<Vec<_>>()
        .join(" ");

    out.write_all(b"%PDF-1.4\n")?;

    offsets.push(out.len());
    out.write_all(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n")?;

    offsets.push(out.len());
    write!(
        out,
        "2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {} >>\nendobj\n",
        pages.len()
    )?;

    offsets.push(out.len());
    out.write_all(
        b"3 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>\nendobj\n",
    )?;

    for (i, page) in pages.iter().enumerate() {
        let page_obj = 4 + i * 2;
        let content_obj = page_obj + 1;
        let stream = content_stream(page);

        offsets.push(out.len());
        write!(
            out,
            "{page_obj} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_obj} 0 R >>\nendobj\n"
        )?;

        offsets.push(out.len());
        write!(
            out,
            "{content_obj} 0 obj\n<< /Length {} >>\nstream\n",
            stream.len()
        )?;
        out.write_all(&stream)?;
        out.write_all(b"\nendstream\nendobj\n")?;
    }

    let xref_at = out.len();
    write!(out, "xref\n0 {}\n0000000000 65535 f \n", object_count + 1)?;
    for offset in &offsets {
        write!(out, "{offset:010} 00000 n \n")?;
    }
    write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        object_count + 1
    )?;

    Ok(out)
}

fn content_stream(lines: &[String]) -> Vec<u8> {
    let mut stream = format!(
        "BT\n/F1 {FONT_SIZE} Tf\n{LEADING} TL\n{MARGIN} {} Td\n",
        PAGE_HEIGHT - MARGIN
    );
    for line in lines {
        stream.push('(');
        stream.push_str(&escape_text(line));
        stream.push_str(") Tj T*\n");
    }
    stream.push_str("ET");
    stream.into_bytes()
}

/// Escapes PDF string delimiters; characters outside printable ASCII become `?`.
fn escape_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }
    escaped
}

fn clip(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        raw.to_string()
    } else {
        let mut clipped: String = raw.chars().take(max - 3).collect();
        clipped.push_str("...");
        clipped
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        ids::{ObjectId, OrderId},
        models::{Order, OrderItem, OrderStatus},
        order::OrderItemView,
    };

    fn snapshot(item_count: usize) -> OrderSnapshot {
        let order = Order {
            id: OrderId::parse("3f2504e0-4f89-11d3-9a0c-0305e82c3301").unwrap(),
            guest_user: None,
            shipping_address: None,
            payment_method: Some("mpesa".into()),
            total_price: "200.00".parse().unwrap(),
            status: OrderStatus::Pending,
            idempotency_key: None,
            payment_reference: None,
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        };
        let items = (0..item_count)
            .map(|i| {
                OrderItemView::new(
                    OrderItem {
                        id: ObjectId::new(),
                        order: order.id,
                        product: Some(ObjectId::new()),
                        quantity: Default::default(),
                        price: "1.00".parse().unwrap(),
                    },
                    Some(format!("Widget (v{i})")),
                )
            })
            .collect();
        OrderSnapshot::assemble(order, items, None)
    }

    #[test]
    fn invoice_number_uses_date_and_id_prefix() {
        assert_eq!(invoice_number(&snapshot(0).order), "INV-20261018-3f2504e0");
    }

    #[test]
    fn renders_a_well_formed_pdf() {
        let pdf = PdfInvoiceRenderer::default().render(&snapshot(2)).unwrap();
        let text = String::from_utf8(pdf).unwrap();

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("Widget \\(v0\\)"));
        assert!(text.contains("INV-20261018-3f2504e0"));

        let xref_at: usize = text
            .split("startxref\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(text[xref_at..].starts_with("xref"));
    }

    #[test]
    fn long_orders_span_pages() {
        let pdf = PdfInvoiceRenderer::default().render(&snapshot(80)).unwrap();
        let text = String::from_utf8(pdf).unwrap();
        assert!(text.contains("/Count 2"));
    }

    #[test]
    fn escapes_delimiters_and_non_ascii() {
        assert_eq!(escape_text(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(escape_text("Café"), "Caf?");
    }
}
