use std::borrow::Cow;

const NAN_TOKEN: &[u8] = b"NaN";

/// Replaces bare `NaN` tokens with `0` so strict JSON decoding can proceed.
///
/// Occurrences inside string literals are left untouched; textual `"NaN"`
/// values are handled later by the coordinate normalizer.
pub fn sanitize_nan(raw: &[u8]) -> Cow<'_, [u8]> {
    if !raw.windows(NAN_TOKEN.len()).any(|window| window == NAN_TOKEN) {
        return Cow::Borrowed(raw);
    }

    let mut out = Vec::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut idx = 0;

    while idx < raw.len() {
        let byte = raw[idx];

        if in_string {
            out.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            idx += 1;
            continue;
        }

        if byte == b'"' {
            in_string = true;
            out.push(byte);
            idx += 1;
        } else if raw[idx..].starts_with(NAN_TOKEN) {
            out.push(b'0');
            idx += NAN_TOKEN.len();
        } else {
            out.push(byte);
            idx += 1;
        }
    }

    Cow::Owned(out)
}
