//! Cache key derivation.
//!
//! Every cache entry key is a pure function of the request that produced it,
//! so the same query always lands on the same key, across processes and
//! restarts. The formats are stable and shared with other deployments of the
//! catalogue; changing them orphans every existing entry.
//!
//! | request | key |
//! |---|---|
//! | list | `catalogue:products:<tags|all>:order:<order>:page:<n>:size:<n>` |
//! | get | `catalogue:product:<id>` |
//! | count | `catalogue:count:<tags|all>` |
//! | tags | `catalogue:tags:all` |
//!
//! Tags are joined with `,`. Delimiters inside tag, order or id strings are
//! not escaped.

use std::borrow::Cow;
use std::str::FromStr;

use catalogue_core::ProductQuery;
use serde::{Deserialize, Serialize};

use crate::constants::{ALL_TAGS_SEGMENT, KEY_NAMESPACE, TAGS_KEY};
use crate::error::ConfigError;

/// How tag filters are arranged before they become part of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOrdering {
    /// Keep caller order. `["a","b"]` and `["b","a"]` are different entries.
    #[default]
    Preserve,
    /// Sort tags first so filters that differ only in order share an entry.
    Sorted,
}

impl FromStr for TagOrdering {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "sorted" => Ok(Self::Sorted),
            other => Err(ConfigError::InvalidValue {
                field: "tag_ordering".to_string(),
                value: other.to_string(),
                reason: "expected \"preserve\" or \"sorted\"".to_string(),
            }),
        }
    }
}

/// Derives cache keys for catalogue reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver {
    ordering: TagOrdering,
}

impl KeyDeriver {
    pub fn new(ordering: TagOrdering) -> Self {
        Self { ordering }
    }

    pub fn ordering(&self) -> TagOrdering {
        self.ordering
    }

    /// Key for a page of products.
    pub fn list_key(&self, query: &ProductQuery) -> String {
        format!(
            "{}products:{}:order:{}:page:{}:size:{}",
            KEY_NAMESPACE,
            self.tags_segment(&query.tags),
            query.order,
            query.page_num,
            query.page_size
        )
    }

    /// Key for a single product.
    pub fn product_key(&self, id: &str) -> String {
        format!("{}product:{}", KEY_NAMESPACE, id)
    }

    /// Key for a product count.
    pub fn count_key(&self, tags: &[String]) -> String {
        format!("{}count:{}", KEY_NAMESPACE, self.tags_segment(tags))
    }

    /// Key for the distinct tag list.
    pub fn tags_key(&self) -> &'static str {
        TAGS_KEY
    }

    /// Prefix matching every key this deriver produces.
    pub fn namespace(&self) -> &'static str {
        KEY_NAMESPACE
    }

    fn tags_segment(&self, tags: &[String]) -> String {
        let tags: Cow<'_, [String]> = match self.ordering {
            TagOrdering::Preserve => Cow::Borrowed(tags),
            TagOrdering::Sorted => {
                let mut sorted = tags.to_vec();
                sorted.sort();
                Cow::Owned(sorted)
            }
        };

        let joined = tags.join(",");
        if joined.is_empty() {
            ALL_TAGS_SEGMENT.to_string()
        } else {
            joined
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    // A tag literally named "all" is indistinguishable from "no filter".
    fn tag_strategy() -> impl Strategy<Value = String> {
        "[a-z]{1,8}".prop_filter("reserved segment", |t| t != ALL_TAGS_SEGMENT)
    }

    fn query_strategy() -> impl Strategy<Value = ProductQuery> {
        (
            prop::collection::vec(tag_strategy(), 0..4),
            prop_oneof![Just(String::new()), Just("price".to_string()), Just("name".to_string())],
            1u32..50,
            1u32..100,
        )
            .prop_map(|(tags, order, page_num, page_size)| ProductQuery {
                tags,
                order,
                page_num,
                page_size,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: Equal queries always derive equal keys.
        #[test]
        fn prop_list_key_deterministic(query in query_strategy()) {
            let first = KeyDeriver::default().list_key(&query);
            let second = KeyDeriver::default().list_key(&query.clone());
            prop_assert_eq!(first, second);
        }

        /// Property: Queries differing in exactly one field derive different keys.
        #[test]
        fn prop_single_field_change_changes_key(
            query in query_strategy(),
            extra_tag in tag_strategy(),
            bump in 1u32..10,
        ) {
            let keys = KeyDeriver::default();
            let base = keys.list_key(&query);

            let mut tagged = query.clone();
            tagged.tags.push(extra_tag);
            prop_assert_ne!(&base, &keys.list_key(&tagged));

            let mut ordered = query.clone();
            ordered.order.push('x');
            prop_assert_ne!(&base, &keys.list_key(&ordered));

            let mut paged = query.clone();
            paged.page_num += bump;
            prop_assert_ne!(&base, &keys.list_key(&paged));

            let mut sized = query.clone();
            sized.page_size += bump;
            prop_assert_ne!(&base, &keys.list_key(&sized));
        }

        /// Property: Every derived key lives under the shared namespace.
        #[test]
        fn prop_keys_share_namespace(query in query_strategy(), id in "[a-z0-9-]{1,36}") {
            let keys = KeyDeriver::default();
            prop_assert!(keys.list_key(&query).starts_with(KEY_NAMESPACE));
            prop_assert!(keys.product_key(&id).starts_with(KEY_NAMESPACE));
            prop_assert!(keys.count_key(&query.tags).starts_with(KEY_NAMESPACE));
        }
    }
}
