use once_cell::sync::Lazy;
use regex::Regex;

// A token is either a C"..."/X"..." literal, which may hold whitespace, or a
// plain run of non-whitespace characters. Literals only start a token.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[CcXx]"[^"]*"|\S+"#).expect("token pattern is valid"));

/// Split source text into lines of whitespace-delimited tokens.
///
/// Blank lines are dropped. Never fails: anything that does not look like a
/// quoted literal is an ordinary token.
pub fn tokenize(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(tokenize_line)
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

pub fn tokenize_line(line: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(line)
        .map(|m| m.as_str().trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join tokens back into the single-space form used in messages and output.
pub fn join_tokens(tokens: &[String]) -> String {
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_simple_lines() {
        let lines = tokenize("PROG START 256\n  JMP   L1\n");
        assert_eq!(lines, vec![vec!["PROG", "START", "256"], vec!["JMP", "L1"]]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let source = indoc! {"
            PROG START 100

               \t
            END
        "};
        let lines = tokenize(source);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], vec!["END"]);
    }

    #[test]
    fn test_crlf_line_breaks() {
        let lines = tokenize("A START 1\r\nEND\r\n");
        assert_eq!(lines, vec![vec!["A", "START", "1"], vec!["END"]]);
    }

    #[test]
    fn test_character_literal_keeps_spaces() {
        let lines = tokenize(r#"MSG BYTE C"HELLO  WORLD""#);
        assert_eq!(lines[0], vec!["MSG", "BYTE", r#"C"HELLO  WORLD""#]);
    }

    #[test]
    fn test_lowercase_literal_prefix() {
        let lines = tokenize(r#"BYTE x"0f" c"a b""#);
        assert_eq!(lines[0], vec!["BYTE", r#"x"0f""#, r#"c"a b""#]);
    }

    #[test]
    fn test_unterminated_literal_is_plain_token() {
        let lines = tokenize(r#"BYTE C"AB CD"#);
        assert_eq!(lines[0], vec!["BYTE", r#"C"AB"#, "CD"]);
    }

    #[test]
    fn test_literal_only_at_token_start() {
        let lines = tokenize(r#"ABC"x y""#);
        assert_eq!(lines[0], vec![r#"ABC"x"#, r#"y""#]);
    }

    #[test]
    fn test_rejoin_is_stable() {
        let source = "L1   JMP\tL2\nEND";
        let once: Vec<String> = tokenize(source).iter().map(|l| join_tokens(l)).collect();
        let twice: Vec<String> = tokenize(&once.join("\n"))
            .iter()
            .map(|l| join_tokens(l))
            .collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec!["L1 JMP L2", "END"]);
    }
}
