use crate::Diagnostic;

/// Parses a positive integer field, recording a diagnostic for junk.
///
/// Blank values count as absent. Zero is not a valid position or total.
pub(crate) fn parse_positive(
    field: &'static str,
    text: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<u32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            diagnostics.push(Diagnostic::MalformedField {
                field,
                value: text.to_string(),
            });
            None
        }
    }
}

/// Unpacks `"n/total"` or a bare `"n"`.
///
/// A missing or zero denominator leaves the total unset.
pub(crate) fn unpack_pair(
    field: &'static str,
    total_field: &'static str,
    text: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> (Option<u32>, Option<u32>) {
    match text.split_once('/') {
        Some((head, tail)) => {
            let number = parse_positive(field, head, diagnostics);
            let total = if tail.trim() == "0" {
                None
            } else {
                parse_positive(total_field, tail, diagnostics)
            };
            (number, total)
        }
        None => (parse_positive(field, text, diagnostics), None),
    }
}

pub(crate) fn pack_pair(number: u32, total: Option<u32>) -> String {
    match total {
        Some(total) => format!("{}/{}", number, total),
        None => number.to_string(),
    }
}
