//! Catalogue entity types.

use serde::{Deserialize, Serialize};

// ============================================================================
// PRODUCT
// ============================================================================

/// A catalogue item as served by the authoritative store.
///
/// The caching layer treats products as immutable values: it stores and
/// returns serialized copies and never edits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    pub description: String,
    /// Image paths, in display order.
    #[serde(default)]
    pub image_url: Vec<String>,
    pub price: f32,
    /// Units in stock.
    pub count: i32,
    /// Tags attached to the product.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Product {
    /// Create a product with the given id and name and empty details.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            image_url: Vec::new(),
            price: 0.0,
            count: 0,
            tags: Vec::new(),
        }
    }

    /// Set the tags.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the price.
    pub fn with_price(mut self, price: f32) -> Self {
        self.price = price;
        self
    }

    /// Returns true if the product carries every tag in `tags`.
    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag))
    }
}

// ============================================================================
// QUERY DESCRIPTOR
// ============================================================================

/// Parameters identifying one logical listing request.
///
/// Two queries are cache-equivalent iff every field matches exactly,
/// including the order of `tags`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductQuery {
    /// Tag filters, in caller order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Sort mode, empty for the store's natural order.
    #[serde(default)]
    pub order: String,
    /// 1-based page number.
    pub page_num: u32,
    pub page_size: u32,
}

impl ProductQuery {
    /// Unfiltered, naturally ordered page.
    pub fn all(page_num: u32, page_size: u32) -> Self {
        Self {
            tags: Vec::new(),
            order: String::new(),
            page_num,
            page_size,
        }
    }

    /// Set the tag filters.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sort mode.
    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = order.into();
        self
    }

    /// Zero-based offset of the first item on this page.
    pub fn offset(&self) -> usize {
        (self.page_num.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }

    /// Returns true if the query carries no tag filter.
    pub fn is_unfiltered(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_offset() {
        assert_eq!(ProductQuery::all(1, 6).offset(), 0);
        assert_eq!(ProductQuery::all(3, 6).offset(), 12);
        // page 0 is clamped rather than underflowing
        assert_eq!(ProductQuery::all(0, 6).offset(), 0);
    }

    #[test]
    fn test_query_builders() {
        let query = ProductQuery::all(2, 12).with_tags(["blue", "geek"]).with_order("price");
        assert_eq!(query.tags, vec!["blue".to_string(), "geek".to_string()]);
        assert_eq!(query.order, "price");
        assert!(!query.is_unfiltered());
        assert!(ProductQuery::all(1, 6).is_unfiltered());
    }

    #[test]
    fn test_tag_order_is_significant_for_equality() {
        let a = ProductQuery::all(1, 6).with_tags(["a", "b"]);
        let b = ProductQuery::all(1, 6).with_tags(["b", "a"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_has_all_tags() {
        let product = Product::new("p-1", "Holy").with_tags(["blue", "geek"]);
        assert!(product.has_all_tags(&["geek".to_string()]));
        assert!(product.has_all_tags(&[]));
        assert!(!product.has_all_tags(&["brown".to_string()]));
    }

    #[test]
    fn test_product_json_defaults() {
        let product: Product = serde_json::from_str(
            r#"{"id":"p-1","name":"Holy","description":"","price":9.5,"count":3}"#,
        )
        .unwrap();
        assert!(product.tags.is_empty());
        assert!(product.image_url.is_empty());
        assert_eq!(product.price, 9.5);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: pages tile the result set without gaps or overlap.
        #[test]
        fn prop_consecutive_pages_are_adjacent(page_num in 1u32..10_000, page_size in 1u32..500) {
            let page = ProductQuery::all(page_num, page_size);
            let next = ProductQuery::all(page_num + 1, page_size);
            prop_assert_eq!(next.offset() - page.offset(), page_size as usize);
        }

        /// Property: a product always carries its own tags and any subset of them.
        #[test]
        fn prop_product_matches_own_tags(tags in prop::collection::vec("[a-z]{1,8}", 0..5), keep in 0usize..5) {
            let product = Product::new("p", "P").with_tags(tags.clone());
            prop_assert!(product.has_all_tags(&tags));
            let subset: Vec<String> = tags.into_iter().take(keep).collect();
            prop_assert!(product.has_all_tags(&subset));
        }
    }
}
