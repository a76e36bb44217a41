//! Unwrapping of soft-wrapped list items
//!
//! GitHub renders line breaks inside release notes literally, so a bullet
//! wrapped over several lines in CHANGELOG.md is joined back into one line.
//! Only unordered lists (`*`, `+`, `-`) are handled.

/// Joins continuation lines onto the bullet they belong to until no more
/// joins apply.
pub fn unwrap(markdown: &str) -> String {
    let mut lines: Vec<String> = markdown.split('\n').map(str::to_string).collect();

    while let Some(index) = find_continuation(&lines) {
        let continuation = lines.remove(index + 1);
        let bullet = &mut lines[index];
        bullet.push(' ');
        bullet.push_str(continuation.trim_start_matches(' '));
    }

    lines.join("\n")
}

/// Index of the first bullet line followed by one of its continuations
fn find_continuation(lines: &[String]) -> Option<usize> {
    lines.windows(2).position(|pair| {
        bullet_indent(&pair[0]).is_some_and(|indent| continues(&pair[1], indent))
    })
}

/// Indent of a bullet line with at least two characters of text
fn bullet_indent(line: &str) -> Option<usize> {
    let indent = leading_spaces(line);
    let rest = &line[indent..];
    let after_marker = rest.strip_prefix(['*', '+', '-'])?;

    let text = after_marker.trim_start_matches(' ');
    if text.len() == after_marker.len() {
        return None;
    }

    let mut chars = text.chars();
    let first = chars.next()?;
    if first.is_whitespace() || chars.next().is_none() {
        return None;
    }
    Some(indent)
}

/// A continuation is indented at least two spaces past the bullet and does
/// not start a new list item
fn continues(line: &str, indent: usize) -> bool {
    let spaces = leading_spaces(line);
    spaces >= indent + 2
        && line[spaces..]
            .chars()
            .next()
            .is_some_and(|c| !matches!(c, '*' | '+' | '-'))
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("* Add support for\n  Go 1.21.\n", "* Add support for Go 1.21.\n")]
    #[case(
        "* A long line that\n  wraps twice and\n  then ends.\n",
        "* A long line that wraps twice and then ends.\n"
    )]
    #[case(
        "  - Nested item\n    continues here.\n",
        "  - Nested item continues here.\n"
    )]
    #[case("+ Wide indent\n        still joins.", "+ Wide indent still joins.")]
    fn unwrap_joins_continuations(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unwrap(input), expected);
    }

    #[rstest]
    #[case("* First item.\n* Second item.\n")]
    #[case("* Item with\n  - a nested list.\n")]
    #[case("* Item\n continued by one space only.\n")]
    #[case("Paragraph text\n  indented next line.\n")]
    #[case("* Item.\n\n  Separate paragraph.\n")]
    #[case("*\n  not a bullet.\n")]
    fn unwrap_leaves_other_structure_alone(#[case] input: &str) {
        assert_eq!(unwrap(input), input);
    }

    #[test]
    fn unwrap_handles_items_in_sequence() {
        let input = "\
* First item is
  wrapped.
* Second item is
  wrapped too.
";

        assert_eq!(
            unwrap(input),
            "* First item is wrapped.\n* Second item is wrapped too.\n"
        );
    }
}
