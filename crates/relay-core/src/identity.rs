//! Sender identity normalization.
//!
//! Conversation keys are the digit-only form of whatever the platform sent as
//! the sender id, so `+55 (11) 9999-8888` and `5511999998888` share a thread.
//!
//! Delivery addresses may additionally go through [`MobilePrefixFixup`], a
//! regional heuristic for carriers that report legacy 8-digit mobile numbers.

use serde::{Deserialize, Serialize};

/// Strip every non-digit character. `None` yields an empty key.
pub fn normalize(raw: Option<&str>) -> String {
    raw.map(|s| s.chars().filter(char::is_ascii_digit).collect())
        .unwrap_or_default()
}

/// Inserts a mobile prefix digit into numbers of one exact national shape.
///
/// Precondition: the key starts with `country_code`, followed by a 2-digit
/// area code and exactly `local_len` local digits. Anything else passes
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobilePrefixFixup {
    pub country_code: String,
    pub local_len: usize,
    pub digit: char,
}

impl Default for MobilePrefixFixup {
    fn default() -> Self {
        Self {
            country_code: "55".to_string(),
            local_len: 8,
            digit: '9',
        }
    }
}

const AREA_CODE_LEN: usize = 2;

impl MobilePrefixFixup {
    /// Whether `key` has the exact legacy shape this fixup repairs.
    pub fn matches(&self, key: &str) -> bool {
        key.len() == self.country_code.len() + AREA_CODE_LEN + self.local_len
            && key.bytes().all(|b| b.is_ascii_digit())
            && key.starts_with(&self.country_code)
    }

    pub fn apply(&self, key: &str) -> String {
        if !self.matches(key) {
            return key.to_string();
        }
        let split = self.country_code.len() + AREA_CODE_LEN;
        let mut out = String::with_capacity(key.len() + 1);
        out.push_str(&key[..split]);
        out.push(self.digit);
        out.push_str(&key[split..]);
        out
    }
}

/// Resolves conversation keys and outbound delivery addresses.
#[derive(Debug, Clone, Default)]
pub struct IdentityNormalizer {
    fixup: Option<MobilePrefixFixup>,
}

impl IdentityNormalizer {
    /// Normalizer that never rewrites delivery addresses.
    pub fn plain() -> Self {
        Self { fixup: None }
    }

    pub fn with_fixup(fixup: MobilePrefixFixup) -> Self {
        Self { fixup: Some(fixup) }
    }

    /// Address to hand to the delivery channel for a conversation key.
    pub fn delivery_address(&self, key: &str) -> String {
        let key = normalize(Some(key));
        match &self.fixup {
            Some(fixup) => fixup.apply(&key),
            None => key,
        }
    }

    pub fn fixup_enabled(&self) -> bool {
        self.fixup.is_some()
    }
}
