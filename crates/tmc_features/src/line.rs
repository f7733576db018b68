//! Line grammar shared by names and data files
//!
//! Both file kinds use the same per-line cleanup:
//! - the line terminator is dropped
//! - everything from the first unescaped `|` is a comment
//! - trailing `.` and spaces are dropped, then leading spaces
//!
//! Data rows additionally collapse the spaces around each comma so that
//! `39, State-gov, 77516` splits into bare values.

/// Token marking a missing value in a data row.
pub const MISSING: &str = "?";

/// Normalize one raw line of a names file. Returns an empty string for
/// blank and comment-only lines.
pub fn normalize_names_line(raw: &str) -> &str {
    let line = strip_terminator(raw);
    let line = strip_comment(line);
    line.trim_end_matches(['.', ' ']).trim_start_matches(' ')
}

/// Normalize one raw data row.
pub fn normalize_data_line(raw: &str) -> String {
    let line = normalize_names_line(raw);
    if !line.contains(',') {
        return line.to_string();
    }
    line.split(',')
        .map(|field| field.trim_matches(' '))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a normalized data row into its positional fields.
pub fn split_fields(row: &str) -> Vec<&str> {
    row.split(',').collect()
}

fn strip_terminator(raw: &str) -> &str {
    raw.trim_end_matches(['\n', '\r'])
}

fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '|' => return &line[..idx],
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_line_strips_comment_and_terminator() {
        assert_eq!(normalize_names_line("age: continuous.\n"), "age: continuous");
        assert_eq!(
            normalize_names_line("   feature1: continuous.   | note\r\n"),
            "feature1: continuous"
        );
        assert_eq!(normalize_names_line(">50K, <=50K. | the target"), ">50K, <=50K");
    }

    #[test]
    fn test_blank_and_comment_only_lines_become_empty() {
        assert_eq!(normalize_names_line("\n"), "");
        assert_eq!(normalize_names_line("| only a comment\n"), "");
        assert_eq!(normalize_names_line("   | indented comment"), "");
        assert_eq!(normalize_names_line(" . . "), "");
    }

    #[test]
    fn test_escaped_pipe_is_not_a_comment() {
        assert_eq!(normalize_names_line(r"a\|b: continuous. | c"), r"a\|b: continuous");
    }

    #[test]
    fn test_data_line_compacts_spaces_around_commas() {
        assert_eq!(
            normalize_data_line("39, State-gov , 77516, <=50K.\n"),
            "39,State-gov,77516,<=50K"
        );
        assert_eq!(normalize_data_line("1,?,3 | trailing note"), "1,?,3");
        assert_eq!(normalize_data_line("\n"), "");
    }

    #[test]
    fn test_split_fields_keeps_empty_positions() {
        assert_eq!(split_fields("a,,c"), vec!["a", "", "c"]);
        assert_eq!(split_fields("solo"), vec!["solo"]);
    }
}
