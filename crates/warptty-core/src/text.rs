//! Text cleanup and numeric shorthand parsing.

use std::sync::OnceLock;

use regex::Regex;

fn ansi_color() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("\x1b\\[.*?m").expect("static pattern"))
}

/// Remove ANSI color sequences and carriage returns from a raw line.
pub fn clean_line(raw: &str) -> String {
    ansi_color().replace_all(raw, "").replace('\r', "")
}

/// Parse an integer that may contain thousands separators, e.g. "12,345".
pub fn parse_num(s: &str) -> Option<i64> {
    let cleaned = s.trim().replace(',', "");
    cleaned.parse().ok()
}

/// Parse the abbreviated quantities used in scan summaries.
///
/// "---" means zero, a trailing `T` means thousands, and a trailing `M`
/// means millions. Anything else is a plain integer.
pub fn parse_summary(s: &str) -> Option<i64> {
    let cleaned = s.trim().replace(',', "");
    if cleaned == "---" {
        return Some(0);
    }
    if let Some(base) = cleaned.strip_suffix('T') {
        return base.parse::<i64>().ok().map(|n| n * 1_000);
    }
    if let Some(base) = cleaned.strip_suffix('M') {
        return base.parse::<i64>().ok().map(|n| n * 1_000_000);
    }
    cleaned.parse().ok()
}

/// Parse a course display into its sector list.
///
/// The game prints routes as `(18) > (125) > (442)`.
pub fn parse_route(s: &str) -> Option<Vec<u32>> {
    s.split(" > ")
        .map(|part| part.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace()))
        .map(|part| part.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_line_strips_color_codes() {
        let raw = "\x1b[1;33mSector  : 100\x1b[0m\r";
        assert_eq!(clean_line(raw), "Sector  : 100");
    }

    #[test]
    fn test_parse_num_with_separators() {
        assert_eq!(parse_num("12,345"), Some(12345));
        assert_eq!(parse_num(" 7 "), Some(7));
        assert_eq!(parse_num("1,234,567"), Some(1234567));
        assert_eq!(parse_num("n/a"), None);
    }

    #[test]
    fn test_parse_summary_shorthand() {
        assert_eq!(parse_summary("3T"), Some(3_000));
        assert_eq!(parse_summary("2M"), Some(2_000_000));
        assert_eq!(parse_summary("---"), Some(0));
        assert_eq!(parse_summary("450"), Some(450));
        assert_eq!(parse_summary("12,5T"), Some(125_000));
        assert_eq!(parse_summary("bogus"), None);
    }

    #[test]
    fn test_parse_route() {
        assert_eq!(parse_route("(18) > (125) > (442)"), Some(vec![18, 125, 442]));
        assert_eq!(parse_route("(7)"), Some(vec![7]));
        assert_eq!(parse_route("(7) > (x)"), None);
    }

}
