//! Serialized forms of cached values.
//!
//! Lists, tag sets and single products are stored as JSON; counts as a
//! decimal string. Decoding never guesses: any payload that does not parse
//! cleanly into the expected shape is reported as [`CacheError::Codec`], which
//! the coordinator treats as a corrupted entry.

use catalogue_core::Product;

use crate::error::{CacheError, CacheResult};

/// A value that can be stored in the cache.
pub trait CacheValue: Sized + Send + Sync + 'static {
    /// Encode to the stored byte form.
    fn encode(&self) -> CacheResult<Vec<u8>>;

    /// Decode from the stored byte form.
    fn decode(bytes: &[u8]) -> CacheResult<Self>;

    /// Number of items, used for log fields.
    fn item_count(&self) -> usize {
        1
    }
}

fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Codec(e.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Codec(e.to_string()))
}

impl CacheValue for Product {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        encode_json(self)
    }

    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        decode_json(bytes)
    }
}

impl CacheValue for Vec<Product> {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        encode_json(self)
    }

    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        decode_json(bytes)
    }

    fn item_count(&self) -> usize {
        self.len()
    }
}

impl CacheValue for Vec<String> {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        encode_json(self)
    }

    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        decode_json(bytes)
    }

    fn item_count(&self) -> usize {
        self.len()
    }
}

impl CacheValue for u64 {
    fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(self.to_string().into_bytes())
    }

    fn decode(bytes: &[u8]) -> CacheResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| CacheError::Codec(e.to_string()))?;
        text.parse::<u64>()
            .map_err(|e| CacheError::Codec(format!("invalid count {:?}: {}", text, e)))
    }

    fn item_count(&self) -> usize {
        *self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_is_decimal_text() {
        assert_eq!(42u64.encode().unwrap(), b"42".to_vec());
        assert_eq!(u64::decode(b"42").unwrap(), 42);
    }

    #[test]
    fn test_count_rejects_garbage() {
        assert!(u64::decode(b"forty-two").unwrap_err().is_codec());
        assert!(u64::decode(b"-1").is_err());
        assert!(u64::decode(b"").is_err());
        assert!(u64::decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_corrupted_json_is_detected() {
        assert!(<Vec<Product>>::decode(b"[{\"id\":").is_err());
        assert!(<Vec<String>>::decode(b"{\"not\":\"a list\"}").is_err());
        assert!(Product::decode(b"[]").is_err());
    }

    #[test]
    fn test_count_is_not_a_tag_list() {
        // A count payload under a tags key must not misparse silently.
        assert!(<Vec<String>>::decode(b"17").is_err());
    }

    #[test]
    fn test_item_count() {
        let products = vec![Product::new("a", "A"), Product::new("b", "B")];
        assert_eq!(products.item_count(), 2);
        assert_eq!(Product::new("a", "A").item_count(), 1);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn product_strategy() -> impl Strategy<Value = Product> {
        (
            "[a-z0-9-]{1,36}",
            ".{0,20}",
            ".{0,40}",
            prop::collection::vec("/catalogue/images/[a-z]{1,8}\\.jpg", 0..3),
            0.0f32..1000.0,
            0i32..500,
            prop::collection::vec("[a-z]{1,8}", 0..4),
        )
            .prop_map(|(id, name, description, image_url, price, count, tags)| Product {
                id,
                name,
                description,
                image_url,
                price,
                count,
                tags,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: Decoding an encoded product list returns the original list.
        #[test]
        fn prop_product_list_roundtrip(products in prop::collection::vec(product_strategy(), 0..8)) {
            let bytes = products.encode().expect("encode should succeed");
            prop_assert_eq!(<Vec<Product>>::decode(&bytes).expect("decode should succeed"), products);
        }

        #[test]
        fn prop_product_roundtrip(product in product_strategy()) {
            let bytes = product.encode().expect("encode should succeed");
            prop_assert_eq!(Product::decode(&bytes).expect("decode should succeed"), product);
        }

        #[test]
        fn prop_tags_roundtrip(tags in prop::collection::vec(".{0,12}", 0..10)) {
            let bytes = tags.encode().expect("encode should succeed");
            prop_assert_eq!(<Vec<String>>::decode(&bytes).expect("decode should succeed"), tags);
        }

        #[test]
        fn prop_count_roundtrip(count in any::<u64>()) {
            let bytes = count.encode().expect("encode should succeed");
            prop_assert_eq!(u64::decode(&bytes).expect("decode should succeed"), count);
        }
    }
}
