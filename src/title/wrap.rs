/// Greedy word wrap. Each explicit line break starts a fresh paragraph;
/// words are never split, so a word wider than `max_width` sits alone on
/// its own line. Blank paragraphs produce no lines.
pub fn wrap_words<F>(text: &str, max_width: u32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> u32,
{
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ten pixels per character keeps the arithmetic obvious.
    fn fixed(s: &str) -> u32 {
        s.chars().count() as u32 * 10
    }

    #[test]
    fn test_wrap_fits_width() {
        let lines = wrap_words("THE QUICK BROWN FOX JUMPS OVER THE LAZY DOG", 100, fixed);
        assert_eq!(lines, vec!["THE QUICK", "BROWN FOX", "JUMPS OVER", "THE LAZY", "DOG"]);
        assert!(lines.iter().all(|l| fixed(l) <= 100));
    }

    #[test]
    fn test_wrap_keeps_word_order() {
        let text = "one two three four five six seven eight nine ten";
        for width in [30, 50, 80, 120, 500] {
            let lines = wrap_words(text, width, fixed);
            let rejoined: Vec<&str> = lines.iter().flat_map(|l| l.split(' ')).collect();
            let original: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(rejoined, original, "width {width}");
        }
    }

    #[test]
    fn test_long_word_sits_alone() {
        let lines = wrap_words("A SUPERCALIFRAGILISTIC B", 100, fixed);
        assert_eq!(lines, vec!["A", "SUPERCALIFRAGILISTIC", "B"]);
    }

    #[test]
    fn test_explicit_breaks_split_paragraphs() {
        let lines = wrap_words("AB\nCD EF", 1000, fixed);
        assert_eq!(lines, vec!["AB", "CD EF"]);
    }

    #[test]
    fn test_empty_text_has_no_lines() {
        assert!(wrap_words("", 100, fixed).is_empty());
        assert!(wrap_words("  \n ", 100, fixed).is_empty());
    }
}
