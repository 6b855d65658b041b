//! # CSV Export
//!
//! Flattens sales into one CSV row each for the report download.
//!
//! ```text
//! ReceiptNo,Date,Type,Customer,Subtotal,Discount,Total,PaymentType,Items
//! TX-1767000000000-3f2a,2026-03-01 10:00,RETAIL,Budi Santoso,10000,0,10000,CASH,Kopi Hitam (Qty: 2, Price: 5000)
//! ```
//!
//! Fields containing a comma, quote or line break are quoted with doubled
//! inner quotes (RFC 4180), so the item list survives spreadsheet import.

use chrono::NaiveDate;

use crate::types::Transaction;

/// Header row, in column order.
pub const CSV_HEADERS: [&str; 9] = [
    "ReceiptNo",
    "Date",
    "Type",
    "Customer",
    "Subtotal",
    "Discount",
    "Total",
    "PaymentType",
    "Items",
];

/// Renders `transactions` as CSV, header first, rows in the given order.
pub fn transactions_to_csv(transactions: &[Transaction]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADERS.iter().map(|h| h.to_string()));

    for tx in transactions {
        let items = tx
            .items
            .iter()
            .map(|i| format!("{} (Qty: {}, Price: {})", i.name, i.qty, i.unit_price))
            .collect::<Vec<_>>()
            .join("; ");

        push_row(
            &mut out,
            [
                tx.receipt_no.clone(),
                tx.date.format("%Y-%m-%d %H:%M").to_string(),
                tx.sale_type.as_str().to_string(),
                tx.customer_name().to_string(),
                tx.subtotal.to_string(),
                tx.discount.to_string(),
                tx.total.to_string(),
                tx.payment_type.as_str().to_string(),
                items,
            ]
            .into_iter(),
        );
    }
    out
}

/// Download file name for a report period.
pub fn export_file_name(start: NaiveDate, end: NaiveDate) -> String {
    format!("laporan_penjualan_{}_sd_{}.csv", start, end)
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let row: Vec<String> = fields.map(|f| escape(&f)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerSnapshot, PaymentType, SaleType, TransactionItem};
    use chrono::{TimeZone, Utc};

    fn sale(snapshot: Option<CustomerSnapshot>) -> Transaction {
        Transaction {
            id: 1,
            sale_type: SaleType::Retail,
            date: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            customer_id: snapshot.as_ref().map(|_| 1),
            customer_snapshot: snapshot,
            items: vec![
                TransactionItem {
                    product_id: 1,
                    code: "P001".to_string(),
                    name: "Kopi Hitam".to_string(),
                    unit_price: 5000,
                    qty: 2,
                    line_total: 10000,
                    note: None,
                },
                TransactionItem {
                    product_id: 6,
                    code: "P006".to_string(),
                    name: "Gorengan (Bakwan)".to_string(),
                    unit_price: 1000,
                    qty: 3,
                    line_total: 3000,
                    note: None,
                },
            ],
            subtotal: 13000,
            discount: 0,
            total: 13000,
            payment_type: PaymentType::Cash,
            cash_received: 15000,
            change_due: 2000,
            receipt_no: "TX-1".to_string(),
        }
    }

    #[test]
    fn test_header_and_walk_in_row() {
        let csv = transactions_to_csv(&[sale(None)]);
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("ReceiptNo,Date,Type,Customer,Subtotal,Discount,Total,PaymentType,Items")
        );
        assert_eq!(
            lines.next(),
            Some(
                "TX-1,2026-03-01 10:00,RETAIL,N/A,13000,0,13000,CASH,\
                 \"Kopi Hitam (Qty: 2, Price: 5000); Gorengan (Bakwan) (Qty: 3, Price: 1000)\""
            )
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_member_name_is_used() {
        let csv = transactions_to_csv(&[sale(Some(CustomerSnapshot {
            member_no: "C001".to_string(),
            name: "Budi Santoso".to_string(),
            phone: "081234567890".to_string(),
            address: "Jl. Merdeka No. 1".to_string(),
        }))]);
        assert!(csv.lines().nth(1).unwrap().contains(",Budi Santoso,"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_file_name() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert_eq!(
            export_file_name(start, end),
            "laporan_penjualan_2026-03-01_sd_2026-03-31.csv"
        );
    }
}
