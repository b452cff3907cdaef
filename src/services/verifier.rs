/// Offset of the character checked by single-character verification codes:
/// the 5th character of the barcode, a fixed field in the label layout.
const SINGLE_CODE_OFFSET: usize = 4;

/// Judges whether a scanned barcode satisfies a slot's verification code.
///
/// Rules, evaluated in order:
/// 1. A missing or empty code auto-passes the slot.
/// 2. The barcode is normalized to uppercase.
/// 3. A multi-character code must occur as a contiguous substring anywhere
///    in the normalized barcode.
/// 4. A single-character code must equal the 5th character of the barcode
///    exactly; no other position counts, even if the code appears elsewhere.
/// 5. Fallback, always available: the normalized barcode equals the legacy
///    item code exactly (parts whose printed barcode is literally their item
///    code).
pub fn verify(barcode: &str, expected_code: Option<&str>, legacy_item_code: &str) -> bool {
    let code = match expected_code {
        Some(code) if !code.is_empty() => code,
        _ => return true,
    };

    let normalized = barcode.to_uppercase();

    let matched = if code.chars().count() > 1 {
        normalized.contains(code)
    } else {
        normalized
            .chars()
            .nth(SINGLE_CODE_OFFSET)
            .map(|c| c.to_string() == code)
            .unwrap_or(false)
    };

    matched || normalized == legacy_item_code
}
