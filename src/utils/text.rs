/// Terminal columns taken by `c`: two for East Asian wide characters, one otherwise.
pub fn char_width(c: char) -> usize {
    match c {
        '\u{1100}'..='\u{115F}'   // Hangul Jamo
        | '\u{2E80}'..='\u{303F}' // CJK radicals, Kangxi, symbols
        | '\u{3040}'..='\u{33FF}' // kana through CJK compatibility
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{A000}'..='\u{A4CF}' // Yi
        | '\u{AC00}'..='\u{D7AF}' // Hangul syllables
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FE10}'..='\u{FE19}'
        | '\u{FE30}'..='\u{FE6F}'
        | '\u{FF00}'..='\u{FF60}' // fullwidth forms
        | '\u{FFE0}'..='\u{FFE6}'
        | '\u{1F300}'..='\u{1F64F}' // pictographs and emoticons
        | '\u{1F900}'..='\u{1F9FF}'
        | '\u{20000}'..='\u{2FFFD}' => 2,
        _ => 1,
    }
}

pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Splits `text` into lines no wider than `max_width` columns, breaking at
/// the last space that fits and hard-splitting words that never fit.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(2);
    let mut lines = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if display_width(remaining) <= max_width {
            lines.push(remaining.to_string());
            break;
        }

        let mut width = 0;
        let mut fit_end = 0;
        let mut last_space = None;
        for (pos, ch) in remaining.char_indices() {
            let w = char_width(ch);
            if width + w > max_width {
                break;
            }
            if ch == ' ' {
                last_space = Some(pos);
            }
            width += w;
            fit_end = pos + ch.len_utf8();
        }

        match last_space {
            Some(pos) if pos > 0 => {
                lines.push(remaining[..pos].to_string());
                remaining = remaining[pos + 1..].trim_start();
            }
            _ => {
                // Always make progress, even if one char is wider than the line.
                let end = if fit_end == 0 {
                    remaining.chars().next().map_or(remaining.len(), char::len_utf8)
                } else {
                    fit_end
                };
                lines.push(remaining[..end].to_string());
                remaining = remaining[end..].trim_start();
            }
        }
    }
    lines
}

/// Shortens `text` to `max_width` columns, marking the cut with `...`.
pub fn truncate(text: &str, max_width: usize) -> String {
    if display_width(text) <= max_width {
        return text.to_string();
    }
    let budget = max_width.saturating_sub(3);
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = char_width(ch);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(ch);
    }
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_characters_count_double() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("天气"), 4);
        assert_eq!(display_width("20°C"), 4);
    }

    #[test]
    fn wraps_at_spaces() {
        assert_eq!(
            wrap_text("the weather in Paris is sunny", 12),
            vec!["the weather", "in Paris is", "sunny"]
        );
    }

    #[test]
    fn splits_words_longer_than_a_line() {
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        for line in wrap_text("天气很好天气很好", 5) {
            assert!(display_width(&line) <= 5);
        }
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(wrap_text("hi", 10), vec!["hi"]);
        assert!(wrap_text("", 10).is_empty());
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_marks_the_cut() {
        assert_eq!(truncate("Weather.get_weather", 10), "Weather...");
    }
}
