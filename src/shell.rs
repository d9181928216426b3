//! Shell quoting helpers
//!
//! The generated chroot script embeds user-supplied values. Each one goes
//! through [`single_quote`] so that it reaches bash as a single literal word.

/// Escape a value for use inside a single-quoted shell string.
///
/// A single quote cannot appear inside `'...'`, so every `'` is replaced by
/// `'\''` (close quote, escaped quote, reopen quote). Nothing else changes.
pub fn escape_single_quotes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out
}

/// Wrap a value in single quotes, escaping embedded quotes.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", escape_single_quotes(value))
}

/// Render a command line for logs and dry-run output.
///
/// Falls back to a plain join if an argument cannot be quoted (NUL bytes).
pub fn display_command(program: &str, args: &[String]) -> String {
    let words = std::iter::once(program).chain(args.iter().map(String::as_str));
    match shlex::try_join(words) {
        Ok(joined) => joined,
        Err(_) => {
            let mut joined = program.to_string();
            for arg in args {
                joined.push(' ');
                joined.push_str(arg);
            }
            joined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_leaves_plain_text_alone() {
        assert_eq!(escape_single_quotes("archbox"), "archbox");
        assert_eq!(escape_single_quotes(""), "");
        assert_eq!(escape_single_quotes("a b $HOME `x` \"y\""), "a b $HOME `x` \"y\"");
    }

    #[test]
    fn test_escape_single_quote() {
        assert_eq!(escape_single_quotes("it's"), "it'\\''s");
        assert_eq!(escape_single_quotes("''"), "'\\'''\\''");
    }

    #[test]
    fn test_single_quote_wraps() {
        assert_eq!(single_quote("Asia/Tehran"), "'Asia/Tehran'");
        assert_eq!(single_quote("o'neil"), "'o'\\''neil'");
    }

    #[test]
    fn test_single_quote_parses_back_to_one_word() {
        for value in ["plain", "with space", "it's", "$(reboot)", "a'b'c", "", "tab\there"] {
            let quoted = single_quote(value);
            let words = shlex::split(&quoted).expect("quoted value should parse");
            assert_eq!(words, vec![value.to_string()], "round trip of {value:?}");
        }
    }

    #[test]
    fn test_display_command_round_trips() {
        let args = vec![
            "-o".to_string(),
            "noatime,subvol=@".to_string(),
            "/dev/sda3".to_string(),
            "/mnt".to_string(),
        ];
        let line = display_command("mount", &args);
        assert!(line.starts_with("mount -o "));
        assert_eq!(shlex::split(&line).unwrap()[1..], args[..]);

        let args = vec!["-c".to_string(), "United States".to_string()];
        let line = display_command("reflector", &args);
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["reflector", "-c", "United States"]
        );
    }
}
