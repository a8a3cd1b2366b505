//! Return analytics over persisted records. Pure; no I/O.

use std::collections::HashMap;

use returns_types::domain::product::Product;
use returns_types::domain::return_request::ReturnRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const TOP_N: usize = 3;
const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCount {
    pub value: String,
    pub count: usize,
    /// Share of all return requests, one decimal place.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSummary {
    pub most_returned_reasons: Vec<RankedCount>,
    pub most_returned_customers: Vec<RankedCount>,
    pub most_returned_orders: Vec<RankedCount>,
    pub most_returned_categories: Vec<RankedCount>,
    pub refunded_count: usize,
    pub refund_percentage: f64,
    pub total_refunds: Decimal,
    pub total_requests: usize,
    pub overall_return_rate: f64,
}

/// What the analytics endpoint serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsReport {
    pub summary: AnalyticsSummary,
    pub total_orders: u64,
    pub total_products: usize,
    pub return_requests: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Top entries by count. Ties keep the order in which values were first seen.
fn top_counts<'a>(values: impl Iterator<Item = &'a str>, total: usize) -> Vec<RankedCount> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for value in values {
        match index.get(value) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(value, counts.len());
                counts.push((value, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_N)
        .map(|(value, count)| RankedCount {
            value: value.to_string(),
            count,
            percentage: round1(percent(count, total)),
        })
        .collect()
}

/// Category of the first catalog product whose id appears in the order id.
pub fn category_for<'a>(order_id: &str, products: &'a [Product]) -> &'a str {
    products
        .iter()
        .find(|p| !p.shopify_id.is_empty() && order_id.contains(p.shopify_id.as_str()))
        .map(Product::category)
        .unwrap_or(UNKNOWN_CATEGORY)
}

/// `requests` are expected oldest first; that order breaks ties.
pub fn compute_analytics(
    requests: &[ReturnRequest],
    products: &[Product],
    total_orders: u64,
) -> AnalyticsSummary {
    let total = requests.len();

    let refunded_count = requests.iter().filter(|r| r.refunded).count();
    let total_refunds = requests
        .iter()
        .filter(|r| r.refunded)
        .filter_map(|r| r.refund_amount)
        .sum();

    let overall_return_rate = if total_orders == 0 {
        0.0
    } else {
        round1(total as f64 / total_orders as f64 * 100.0)
    };

    AnalyticsSummary {
        most_returned_reasons: top_counts(requests.iter().map(|r| r.reason.as_str()), total),
        most_returned_customers: top_counts(
            requests.iter().map(|r| r.customer_id.as_str()),
            total,
        ),
        most_returned_orders: top_counts(requests.iter().map(|r| r.order_id.as_str()), total),
        most_returned_categories: top_counts(
            requests.iter().map(|r| category_for(&r.order_id, products)),
            total,
        ),
        refunded_count,
        refund_percentage: percent(refunded_count, total),
        total_refunds,
        total_requests: total,
        overall_return_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use returns_types::domain::product::ProductInput;

    fn request(reason: &str, customer: &str, order: &str) -> ReturnRequest {
        ReturnRequest::new(
            customer.into(),
            order.into(),
            reason.into(),
            Decimal::new(1000, 2),
            vec![],
        )
        .unwrap()
    }

    fn product(shopify_id: &str, product_type: Option<&str>) -> Product {
        Product::from_input(ProductInput {
            shopify_id: shopify_id.into(),
            title: "t".into(),
            description: None,
            price: None,
            image_url: None,
            product_type: product_type.map(Into::into),
        })
        .unwrap()
    }

    #[test]
    fn reasons_ranked_with_percentages() {
        let requests = vec![
            request("damaged", "c1", "1"),
            request("damaged", "c2", "2"),
            request("wrong_item", "c1", "3"),
        ];
        let summary = compute_analytics(&requests, &[], 10);
        assert_eq!(
            summary.most_returned_reasons,
            vec![
                RankedCount {
                    value: "damaged".into(),
                    count: 2,
                    percentage: 66.7
                },
                RankedCount {
                    value: "wrong_item".into(),
                    count: 1,
                    percentage: 33.3
                },
            ]
        );
        assert_eq!(summary.most_returned_customers[0].value, "c1");
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.overall_return_rate, 30.0);
    }

    #[test]
    fn empty_input_yields_zeros() {
        let summary = compute_analytics(&[], &[], 0);
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.refunded_count, 0);
        assert_eq!(summary.refund_percentage, 0.0);
        assert_eq!(summary.overall_return_rate, 0.0);
        assert_eq!(summary.total_refunds, Decimal::ZERO);
        assert!(summary.most_returned_reasons.is_empty());
        assert!(summary.most_returned_categories.is_empty());
    }

    #[test]
    fn no_orders_means_no_return_rate() {
        let summary = compute_analytics(&[request("other", "c", "1")], &[], 0);
        assert_eq!(summary.overall_return_rate, 0.0);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let requests = vec![
            request("size_issue", "c", "1"),
            request("defective", "c", "2"),
            request("other", "c", "3"),
            request("changed_mind", "c", "4"),
            request("changed_mind", "c", "5"),
        ];
        let reasons: Vec<String> = compute_analytics(&requests, &[], 0)
            .most_returned_reasons
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(reasons, vec!["changed_mind", "size_issue", "defective"]);
    }

    #[test]
    fn refunds_only_count_refunded_requests() {
        let mut refunded = request("defective", "c", "1");
        refunded.refunded = true;
        refunded.refund_amount = Some(Decimal::new(2550, 2));
        let mut no_amount = request("defective", "c", "2");
        no_amount.refunded = true;
        no_amount.refund_amount = None;
        let pending = request("defective", "c", "3");

        let summary = compute_analytics(&[refunded, no_amount, pending], &[], 0);
        assert_eq!(summary.refunded_count, 2);
        assert_eq!(summary.total_refunds, Decimal::new(2550, 2));
        assert!((summary.refund_percentage - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn category_from_substring_match() {
        let mut blank = product("1", Some("Ignored"));
        blank.shopify_id = String::new();
        let products = vec![
            blank,
            product("555", Some("Apparel")),
            product("777", None),
        ];
        assert_eq!(category_for("gid://shopify/Order/15551", &products), "Apparel");
        assert_eq!(category_for("7771", &products), "Other");
        assert_eq!(category_for("1234", &products), "Unknown");

        let summary = compute_analytics(
            &[request("other", "c", "5550"), request("other", "c", "42")],
            &products,
            0,
        );
        let categories: Vec<(String, usize)> = summary
            .most_returned_categories
            .into_iter()
            .map(|c| (c.value, c.count))
            .collect();
        assert_eq!(
            categories,
            vec![("Apparel".to_string(), 1), ("Unknown".to_string(), 1)]
        );
    }
}
