//! Shared client-side utilities

pub mod rate_limit;
pub mod retry;

/// Percent-encode a query-string value.
///
/// Pagination follows service-built `next` URLs verbatim, so requests the
/// clients build themselves encode the same way for symmetry.
pub fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push_str("%20"),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_covers_reserved_and_non_ascii() {
        assert_eq!(urlencode("isrc:USUM71703085"), "isrc%3AUSUM71703085");
        assert_eq!(urlencode("Halo Beyoncé"), "Halo%20Beyonc%C3%A9");
        assert_eq!(urlencode("safe-chars_only.~"), "safe-chars_only.~");
    }
}
