/// Extracts the character range `[start, start + length)` from a
/// fixed-length record. Content beyond the end of the record reads as
/// empty; a range that starts inside the record is clipped at its end.
pub(crate) fn fixed_slice(text: &str, start: usize, length: usize) -> &str {
    let mut indices = text.char_indices().map(|(i, _)| i);
    let begin = match indices.nth(start) {
        Some(i) => i,
        None => return "",
    };
    match text[begin..].char_indices().map(|(i, _)| i).nth(length) {
        Some(end) => &text[begin..begin + end],
        None => &text[begin..],
    }
}

/// Appends `text` at character offset `offset`, padding the gap with
/// spaces. Offsets must not rewind into already-written content.
pub(crate) fn place_fixed(
    buf: &mut String,
    offset: usize,
    text: &str,
) -> std::result::Result<(), String> {
    let len = buf.chars().count();
    if offset < len {
        return Err(format!(
            "field at position {} overlaps previously written content",
            offset
        ));
    }
    for _ in len..offset {
        buf.push(' ');
    }
    buf.push_str(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_by_char() {
        assert_eq!(fixed_slice("abcdef", 0, 3), "abc");
        assert_eq!(fixed_slice("abcdef", 4, 2), "ef");
        assert_eq!(fixed_slice("abcdef", 4, 10), "ef");
        assert_eq!(fixed_slice("abcdef", 6, 2), "");
        assert_eq!(fixed_slice("abcdef", 10, 2), "");
    }

    #[test]
    fn multibyte_offsets() {
        assert_eq!(fixed_slice("日本語abc", 0, 3), "日本語");
        assert_eq!(fixed_slice("日本語abc", 3, 3), "abc");
    }

    #[test]
    fn places_with_gap_padding() {
        let mut buf = String::new();
        place_fixed(&mut buf, 0, "ab").unwrap();
        place_fixed(&mut buf, 4, "cd").unwrap();
        assert_eq!(buf, "ab  cd");
        assert!(place_fixed(&mut buf, 3, "x").is_err());
    }
}
