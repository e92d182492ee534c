use std::borrow::Cow;

/// Recovers a readable upload filename from what the client sent.
///
/// Browsers either percent-encode the name or send raw UTF-8 bytes that end up
/// read as Latin-1. Attempts, first hit wins:
/// 1. names containing `%` are percent-decoded;
/// 2. the name is re-read as Latin-1 bytes and decoded as UTF-8, kept if it
///    contains CJK ideographs;
/// 3. the raw bytes are decoded as UTF-8, kept if they contain CJK ideographs;
/// 4. otherwise the name is returned untouched.
///
/// Any decoding failure yields the original name.
pub fn decode_upload_name(filename: &str) -> String {
    if filename.contains('%') {
        return match urlencoding::decode(filename) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => filename.to_string(),
        };
    }

    if let Some(bytes) = latin1_bytes(filename) {
        if let Ok(decoded) = String::from_utf8(bytes) {
            if contains_cjk(&decoded) {
                return decoded;
            }
        }
    }

    let raw: Cow<'_, str> = String::from_utf8_lossy(filename.as_bytes());
    if contains_cjk(&raw) {
        return raw.into_owned();
    }

    filename.to_string()
}

/// Bytes of `value` when every char fits in a single Latin-1 byte.
fn latin1_bytes(value: &str) -> Option<Vec<u8>> {
    value
        .chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect()
}

fn contains_cjk(value: &str) -> bool {
    value.chars().any(|ch| ('\u{4e00}'..='\u{9fff}').contains(&ch))
}
