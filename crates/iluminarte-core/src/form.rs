//! # Form Adapter
//!
//! The sale form posts one `producto_<idx>` / `cantidad_<idx>` pair per row,
//! where `<idx>` is whatever the page generated. This module is the only
//! place that knows about those keys.
//!
//! ```rust
//! use iluminarte_core::form::line_requests_from_fields;
//!
//! let fields = [
//!     ("csrf", "x"),
//!     ("producto_0", "p1"),
//!     ("cantidad_0", "3"),
//!     ("producto_7", "p2"),
//!     ("cantidad_7", "abc"),
//! ];
//! let requests = line_requests_from_fields(fields);
//!
//! assert_eq!(requests.len(), 2);
//! assert_eq!(requests[0].quantity, 3);
//! assert_eq!(requests[1].quantity, 0);
//! ```

use std::collections::HashMap;

use crate::types::LineRequest;

const PRODUCT_PREFIX: &str = "producto_";
const QUANTITY_PREFIX: &str = "cantidad_";

/// Pairs each `producto_<idx>` with its `cantidad_<idx>`.
///
/// Requests come out in the order their product key first appears. A
/// missing, blank or non-numeric quantity becomes 0, which the ledger
/// skips. A repeated key keeps its position but takes its last value,
/// as a form decoder returning the last value would report it. Unrelated
/// fields are ignored.
pub fn line_requests_from_fields<I, K, V>(fields: I) -> Vec<LineRequest>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut products: Vec<(String, String)> = Vec::new();
    let mut quantities: HashMap<String, String> = HashMap::new();

    for (key, value) in fields {
        let key = key.as_ref();
        let value = value.as_ref();

        if let Some(idx) = key.strip_prefix(PRODUCT_PREFIX) {
            let product_id = value.trim().to_string();
            match products.iter_mut().find(|(seen, _)| seen == idx) {
                Some((_, current)) => *current = product_id,
                None => products.push((idx.to_string(), product_id)),
            }
        } else if let Some(idx) = key.strip_prefix(QUANTITY_PREFIX) {
            quantities.insert(idx.to_string(), value.to_string());
        }
    }

    products
        .into_iter()
        .map(|(idx, product_id)| {
            let quantity = quantities
                .get(&idx)
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .unwrap_or(0);
            LineRequest::new(product_id, quantity)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_follows_product_keys() {
        let fields = vec![
            ("cantidad_2".to_string(), "1".to_string()),
            ("producto_2".to_string(), "p2".to_string()),
            ("producto_0".to_string(), "p1".to_string()),
            ("cantidad_0".to_string(), " 4 ".to_string()),
        ];

        let requests = line_requests_from_fields(fields);
        assert_eq!(
            requests,
            vec![LineRequest::new("p2", 1), LineRequest::new("p1", 4)]
        );
    }

    #[test]
    fn test_bad_quantities_become_zero() {
        let requests = line_requests_from_fields([
            ("producto_a", "p1"),
            ("cantidad_a", ""),
            ("producto_b", "p2"),
            ("cantidad_b", "2.5"),
            ("producto_c", "p3"),
        ]);

        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.quantity == 0 && r.is_blank()));
    }

    #[test]
    fn test_repeated_keys_take_last_value_in_first_position() {
        let requests = line_requests_from_fields([
            ("producto_1", "p1"),
            ("cantidad_1", "2"),
            ("producto_2", "p2"),
            ("cantidad_2", "5"),
            ("producto_1", "p9"),
            ("cantidad_1", "8"),
        ]);

        assert_eq!(
            requests,
            vec![LineRequest::new("p9", 8), LineRequest::new("p2", 5)]
        );
    }

    #[test]
    fn test_empty_product_is_kept_for_the_ledger_to_skip() {
        let requests = line_requests_from_fields([("producto_0", ""), ("cantidad_0", "3")]);
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_blank());
    }
}
