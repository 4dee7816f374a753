//! Shallow structural checks on LaTeX source.
//!
//! Counts delimiters and environment markers; it does not parse. Equal counts
//! in the wrong order (`\end{a}\begin{a}`) pass.

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{anychar, char, multispace0},
    combinator::{map, value},
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde::Serialize;

/// Outcome of [`validate_notation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Dollar,
    DisplayOpen,
    DisplayClose,
    InlineOpen,
    InlineClose,
    Begin(&'a str),
    End(&'a str),
    Other,
}

#[derive(Debug, Default)]
struct Counts {
    dollars: usize,
    display_open: usize,
    display_close: usize,
    inline_open: usize,
    inline_close: usize,
    /// Environment name -> (begins, ends).
    environments: BTreeMap<String, (usize, usize)>,
}

impl Counts {
    fn record(&mut self, token: Token<'_>) {
        match token {
            Token::Dollar => self.dollars += 1,
            Token::DisplayOpen => self.display_open += 1,
            Token::DisplayClose => self.display_close += 1,
            Token::InlineOpen => self.inline_open += 1,
            Token::InlineClose => self.inline_close += 1,
            Token::Begin(name) => self.environments.entry(name.to_string()).or_default().0 += 1,
            Token::End(name) => self.environments.entry(name.to_string()).or_default().1 += 1,
            Token::Other => {}
        }
    }

    fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.dollars % 2 != 0 {
            issues.push(format!(
                "Unmatched inline math delimiter: found {} `$` (expected an even number)",
                self.dollars
            ));
        }

        if self.display_open != self.display_close {
            issues.push(format!(
                "Unbalanced display math delimiters: {} `\\[` but {} `\\]`",
                self.display_open, self.display_close
            ));
        }

        if self.inline_open != self.inline_close {
            issues.push(format!(
                "Unbalanced inline math delimiters: {} `\\(` but {} `\\)`",
                self.inline_open, self.inline_close
            ));
        }

        for (name, (begins, ends)) in &self.environments {
            if begins != ends {
                issues.push(format!(
                    "Unbalanced environment `{}`: {} \\begin but {} \\end",
                    name, begins, ends
                ));
            }
        }

        issues
    }
}

/// Check `source` for unbalanced math delimiters and environments.
pub fn validate_notation(source: &str) -> ValidationReport {
    match scan(source) {
        Ok(counts) => ValidationReport::from_issues(counts.issues()),
        Err(offset) => ValidationReport::from_issues(vec![format!(
            "Could not scan notation at byte {}",
            offset
        )]),
    }
}

fn scan(source: &str) -> Result<Counts, usize> {
    let mut counts = Counts::default();
    let mut remaining = source;

    while !remaining.is_empty() {
        match token(remaining) {
            Ok((rest, tok)) => {
                counts.record(tok);
                remaining = rest;
            }
            Err(_) => return Err(source.len() - remaining.len()),
        }
    }

    Ok(counts)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        comment,
        map(preceded(tag("\\begin"), environment_name), Token::Begin),
        map(preceded(tag("\\end"), environment_name), Token::End),
        value(Token::DisplayOpen, tag("\\[")),
        value(Token::DisplayClose, tag("\\]")),
        value(Token::InlineOpen, tag("\\(")),
        value(Token::InlineClose, tag("\\)")),
        // Escaped pairs: `\$`, `\\`, `\%` and the first letter of other commands
        value(Token::Other, pair(char('\\'), anychar)),
        value(Token::Dollar, char('$')),
        value(Token::Other, anychar),
    ))(input)
}

/// `%` to end of line.
fn comment(input: &str) -> IResult<&str, Token<'_>> {
    value(Token::Other, pair(char('%'), take_while(|c: char| c != '\n')))(input)
}

/// `{name}` after `\begin` or `\end`.
fn environment_name(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        delimited(
            char('{'),
            take_while1(|c: char| c != '}' && c != '{' && c != '\n'),
            char('}'),
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_balanced_inline() {
        assert_eq!(
            validate_notation("$x$"),
            ValidationReport {
                valid: true,
                issues: vec![]
            }
        );
    }

    #[test]
    fn test_unmatched_inline() {
        let report = validate_notation("$x");
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("Unmatched inline math delimiter"));
    }

    #[test]
    fn test_display_dollars_and_brackets() {
        assert!(validate_notation("$$a$$ and \\[b\\]").valid);

        let report = validate_notation("\\[ x = 1");
        assert_eq!(
            report.issues,
            vec!["Unbalanced display math delimiters: 1 `\\[` but 0 `\\]`".to_string()]
        );
    }

    #[test]
    fn test_environments_counted_per_name() {
        let source = r"\begin{align} a \end{align} \begin{matrix} b \begin{cases} c \end{cases}";
        let report = validate_notation(source);

        assert_eq!(
            report.issues,
            vec!["Unbalanced environment `matrix`: 1 \\begin but 0 \\end".to_string()]
        );
    }

    #[test]
    fn test_escapes_and_comments_are_skipped() {
        assert!(validate_notation(r"costs \$5 and $x$").valid);
        assert!(validate_notation("$x$ % stray $ in a comment\n$y$").valid);
        assert!(validate_notation(r"\begin{align} a \\[2pt] b \end{align}").valid);
        assert!(validate_notation(r"\endgroup \beginning").valid);
    }

    #[test]
    fn test_wrong_nesting_with_equal_counts_passes() {
        assert!(validate_notation(r"\end{a}\begin{a}").valid);
    }

    #[test]
    fn test_inline_parens() {
        let report = validate_notation(r"\(x");
        assert!(!report.valid);
        assert!(report.issues[0].contains("\\("));
    }

    #[test]
    fn test_multiple_issues() {
        let report = validate_notation(r"$ \] \begin{x}");
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(validate_notation("").valid);
    }
}
