const PREVIEW_CHARS: usize = 30;

// Capitalize the first letter of every run of letters, e.g. "note_on" => "Note_On"
pub fn title_case(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut in_word = false;

    for ch in source.chars() {
        if ch.is_alphabetic() {
            if in_word {
                result.extend(ch.to_lowercase());
            } else {
                result.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(ch);
            in_word = false;
        }
    }

    result
}

// First 30 characters of the text, with an ellipsis when anything was cut
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

// Single-line rendering for table cells: line breaks shown as a return symbol
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", "⏎").replace('\n', "⏎")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify() {
        assert_eq!(title_case("note_on"), "Note_On");
        assert_eq!(title_case("control_change"), "Control_Change");
        assert_eq!(title_case("pitchwheel"), "Pitchwheel");
        assert_eq!(title_case("a1b"), "A1B");

        assert_eq!(preview("short"), "short");
        assert_eq!(preview(&"x".repeat(30)), "x".repeat(30));
        assert_eq!(preview(&"y".repeat(31)), format!("{}...", "y".repeat(30)));
        assert_eq!(preview(&"é".repeat(40)), format!("{}...", "é".repeat(30)));

        assert_eq!(single_line("a\nb"), "a⏎b");
    }
}
