//! Entity text normalizers.
//!
//! NLU entities arrive as raw utterance spans ("$300k", "two", "seattle").
//! These functions turn them into canonical filter values. They are pure and
//! total: unrecognized input is passed through unchanged, never rejected.

/// Cleans a raw price span into a plain digit string.
///
/// Strips `$`, `,` and spaces, and expands `k` to `000` ("$300k" becomes
/// "300000"). Non-numeric residue is passed through as-is; validation is the
/// search backend's problem, not ours.
pub fn normalize_price(text: &str) -> String {
    text.replace('$', "")
        .replace(',', "")
        .replace('k', "000")
        .replace(' ', "")
}

/// Maps the number words "one" through "six" (case-insensitive) to digit
/// strings. Anything else is returned unchanged.
pub fn normalize_room_count(text: &str) -> String {
    match text.to_lowercase().as_str() {
        "one" => "1".to_string(),
        "two" => "2".to_string(),
        "three" => "3".to_string(),
        "four" => "4".to_string(),
        "five" => "5".to_string(),
        "six" => "6".to_string(),
        _ => text.to_string(),
    }
}

/// Upper-cases the first character, leaving the rest untouched.
/// Empty input yields the empty string.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
