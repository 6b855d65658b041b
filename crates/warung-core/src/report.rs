//! # Sales Reports
//!
//! Dashboard KPIs computed from a slice of sales. The caller decides the
//! period (today, this week, this month) by what it loads.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use ts_rs::TS;

use crate::types::Transaction;

/// Quantity and revenue sold for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: i64,
    pub name: String,
    pub qty: i64,
    pub revenue: i64,
}

/// Revenue for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub revenue: i64,
}

/// KPI block of the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_revenue: i64,
    pub transaction_count: usize,
    /// Revenue per sale, rounded down. Zero when there are no sales.
    pub avg_ticket: i64,
    pub member_transactions: usize,
    pub non_member_transactions: usize,
    pub member_revenue: i64,
    pub non_member_revenue: i64,
    /// Best sellers by quantity, highest first.
    pub top_products: Vec<ProductSales>,
    pub sales_by_day: Vec<DailySales>,
}

impl SalesSummary {
    pub fn top_product(&self) -> Option<&ProductSales> {
        self.top_products.first()
    }
}

/// Summarizes `transactions`, keeping the `top_n` best-selling products.
///
/// Products with equal quantity keep the order in which they were first sold.
pub fn summarize(transactions: &[Transaction], top_n: usize) -> SalesSummary {
    let total_revenue: i64 = transactions.iter().map(|t| t.total).sum();
    let transaction_count = transactions.len();

    let members: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.customer_id.is_some())
        .collect();
    let member_revenue: i64 = members.iter().map(|t| t.total).sum();

    let mut products: Vec<ProductSales> = Vec::new();
    let mut position: HashMap<i64, usize> = HashMap::new();
    let mut by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();

    for tx in transactions {
        *by_day.entry(tx.date.date_naive()).or_default() += tx.total;

        for item in &tx.items {
            let idx = *position.entry(item.product_id).or_insert_with(|| {
                products.push(ProductSales {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    qty: 0,
                    revenue: 0,
                });
                products.len() - 1
            });
            products[idx].qty += item.qty;
            products[idx].revenue += item.line_total;
        }
    }

    // Stable sort keeps first-sold order among ties.
    products.sort_by(|a, b| b.qty.cmp(&a.qty));
    products.truncate(top_n);

    SalesSummary {
        total_revenue,
        transaction_count,
        avg_ticket: if transaction_count == 0 {
            0
        } else {
            total_revenue / transaction_count as i64
        },
        member_transactions: members.len(),
        non_member_transactions: transaction_count - members.len(),
        member_revenue,
        non_member_revenue: total_revenue - member_revenue,
        top_products: products,
        sales_by_day: by_day
            .into_iter()
            .map(|(day, revenue)| DailySales { day, revenue })
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
