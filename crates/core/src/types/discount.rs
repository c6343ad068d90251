//! Discount code lists.

use serde::{Deserialize, Serialize};

/// An ordered list of discount codes without duplicates.
///
/// The Storefront API replaces a cart's discount codes wholesale, so every
/// list sent to it is built through this type. Codes are trimmed, empty codes
/// are dropped and the first occurrence of a repeated code wins.
///
/// ```
/// use zkcart_core::DiscountCodes;
///
/// let codes = DiscountCodes::from_codes(["SUMMER", " SUMMER ", "", "VIP"]);
/// assert_eq!(codes.as_slice(), ["SUMMER", "VIP"]);
///
/// let codes = codes.without_code("SUMMER");
/// assert_eq!(codes.as_slice(), ["VIP"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountCodes(Vec<String>);

impl DiscountCodes {
    /// Build a unique list from arbitrary codes, keeping first-seen order.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .fold(Self::default(), |acc, code| acc.with_code(code.as_ref()))
    }

    /// Append a code unless it is empty or already present.
    #[must_use]
    pub fn with_code(mut self, code: &str) -> Self {
        let code = code.trim();
        if !code.is_empty() && !self.0.iter().any(|c| c == code) {
            self.0.push(code.to_owned());
        }
        self
    }

    /// Remove every occurrence of a code.
    #[must_use]
    pub fn without_code(mut self, code: &str) -> Self {
        let code = code.trim();
        self.0.retain(|c| c != code);
        self
    }

    /// Returns the codes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consume the list and return the codes.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// Returns true if the list holds no codes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of codes in the list.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_removed_in_order() {
        let codes = DiscountCodes::from_codes(["B", "A", "B", "C", "A"]);
        assert_eq!(codes.as_slice(), ["B", "A", "C"]);
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn test_blank_codes_dropped() {
        let codes = DiscountCodes::from_codes(["", "   ", "WELCOME"]);
        assert_eq!(codes.into_vec(), vec!["WELCOME".to_string()]);
    }

    #[test]
    fn test_without_code_removes_all_occurrences() {
        let codes = DiscountCodes::from_codes(["A", "B"]).without_code("A");
        assert_eq!(codes.as_slice(), ["B"]);

        let codes = codes.without_code("B");
        assert!(codes.is_empty());
    }

    #[test]
    fn test_without_missing_code_is_noop() {
        let codes = DiscountCodes::from_codes(["A"]).without_code("Z");
        assert_eq!(codes.as_slice(), ["A"]);
    }

    #[test]
    fn test_codes_are_case_sensitive() {
        let codes = DiscountCodes::from_codes(["vip", "VIP"]);
        assert_eq!(codes.len(), 2);
    }
}
