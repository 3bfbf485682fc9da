//! Text format conventions shared by every table file.
//!
//! Absent values are `Option<String>` in memory; the sentinel strings only
//! exist at the file boundary.

pub const DEFAULT_DELIMITER: char = '\t';

/// Sentinel written for an absent value.
pub const SENTINEL_NONE: &str = "None";
/// Alternate sentinel accepted on input (external mapping dumps use it).
pub const SENTINEL_NULL: &str = "NULL";

/// Lines starting with one of these are comments.
pub const COMMENT_PREFIXES: [char; 2] = ['#', '!'];

/// Comment or blank line.
pub fn is_comment(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with(COMMENT_PREFIXES)
}

/// Split a line on `delimiter` and trim every field.
pub fn split_then_strip(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(|f| f.trim().to_string()).collect()
}

pub fn parse_optional(field: &str) -> Option<String> {
    let field = field.trim();
    if field.is_empty() || field == SENTINEL_NONE || field == SENTINEL_NULL {
        None
    } else {
        Some(field.to_string())
    }
}

pub fn format_optional(value: Option<&str>) -> &str {
    value.unwrap_or(SENTINEL_NONE)
}

/// Date stamp used in `# File generated on:` lines.
pub fn generated_on() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

/// Schema comment for a per-dataset table: the fixed leading columns, then
/// `C<i>` for every input column not consumed as a key.
pub fn schema_line(delimiter: char, leading: &[&str], columns: usize, keys: &[usize]) -> String {
    let mut line = format!("# {}", leading.join(delimiter.to_string().as_str()));
    for i in (0..columns).filter(|i| !keys.contains(i)) {
        line.push(delimiter);
        line.push('C');
        line.push_str(&i.to_string());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_detection() {
        assert!(is_comment("# header"));
        assert!(is_comment("!gaf-version: 2.1"));
        assert!(is_comment("\n"));
        assert!(is_comment("   "));
        assert!(!is_comment("TP53\t7157"));
    }

    #[test]
    fn test_sentinels_round_to_option() {
        assert_eq!(parse_optional("None"), None);
        assert_eq!(parse_optional("NULL"), None);
        assert_eq!(parse_optional(" P04637 "), Some("P04637".to_string()));
        assert_eq!(format_optional(None), "None");
    }

    #[test]
    fn test_schema_line_skips_key_columns() {
        let line = schema_line('\t', &["mambo_eid", "src_dataset_id", "dst_dataset_id"], 4, &[0, 1]);
        assert_eq!(line, "# mambo_eid\tsrc_dataset_id\tdst_dataset_id\tC2\tC3");
    }
}
