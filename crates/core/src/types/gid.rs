//! Newtype Shopify global IDs for type-safe entity references.
//!
//! Use the `define_gid!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types (a cart line ID passed
//! where a merchandise ID is expected is the classic cart bug).

/// Macro to define a type-safe Shopify global ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use zkcart_core::define_gid;
/// define_gid!(OrderGid);
/// define_gid!(CustomerGid);
///
/// let order = OrderGid::new("gid://shopify/Order/1");
/// let customer = CustomerGid::new("gid://shopify/Customer/1");
///
/// // These are different types, so this won't compile:
/// // let _: OrderGid = customer;
/// ```
#[macro_export]
macro_rules! define_gid {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying ID string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the ID string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::convert::AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define the Storefront API entity IDs the cart layer passes around
define_gid!(CartId);
define_gid!(CartLineId);
define_gid!(MerchandiseId);
define_gid!(ProductId);

/// Check whether a string has the `gid://shopify/<Type>/<id>` shape.
///
/// Cart IDs carry a `?key=` suffix, which is accepted.
#[must_use]
pub fn is_shopify_gid(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("gid://shopify/") else {
        return false;
    };

    let mut parts = rest.splitn(2, '/');
    let kind = parts.next().unwrap_or_default();
    let id = parts.next().unwrap_or_default();

    !kind.is_empty() && kind.chars().all(char::is_alphanumeric) && !id.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gid_shape() {
        assert!(is_shopify_gid("gid://shopify/ProductVariant/42"));
        assert!(is_shopify_gid(
            "gid://shopify/Cart/c1-abc123?key=0f5c2fbb7d2f"
        ));
        assert!(!is_shopify_gid("gid://shopify/ProductVariant/"));
        assert!(!is_shopify_gid("gid://shopify//42"));
        assert!(!is_shopify_gid("gid://other/ProductVariant/42"));
        assert!(!is_shopify_gid("42"));
    }

    #[test]
    fn test_newtype_conversions() {
        let id = MerchandiseId::new("gid://shopify/ProductVariant/1");
        assert_eq!(id.as_str(), "gid://shopify/ProductVariant/1");
        assert_eq!(id.to_string(), "gid://shopify/ProductVariant/1");

        let line: CartLineId = "gid://shopify/CartLine/9".into();
        let raw: String = line.into();
        assert_eq!(raw, "gid://shopify/CartLine/9");
    }

    #[test]
    fn test_serde_transparent() {
        let id = CartId::new("gid://shopify/Cart/abc");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"gid://shopify/Cart/abc\"");
    }
}
