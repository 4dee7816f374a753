//! Best-effort LaTeX reconstruction from presentation MathML.
//!
//! Used only when no annotation carries the exact source. The mapping is
//! lossy: fonts, spacing and most stretchy constructs are not recovered.

use std::sync::Arc;

use super::NotationRecovery;
use crate::html::Element;
use crate::logging::Logger;

/// A typed node of the MathML accessibility tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticNode {
    Identifier(String),
    Number(String),
    Operator(String),
    Text(String),
    Space,
    Row(Vec<SemanticNode>),
    Superscript {
        base: Box<SemanticNode>,
        exponent: Box<SemanticNode>,
    },
    Subscript {
        base: Box<SemanticNode>,
        subscript: Box<SemanticNode>,
    },
    SubSuperscript {
        base: Box<SemanticNode>,
        subscript: Box<SemanticNode>,
        superscript: Box<SemanticNode>,
    },
    Fraction {
        numerator: Box<SemanticNode>,
        denominator: Box<SemanticNode>,
    },
    SquareRoot(Vec<SemanticNode>),
    NthRoot {
        radicand: Box<SemanticNode>,
        index: Box<SemanticNode>,
    },
    Unknown {
        tag: String,
        text: String,
    },
}

impl SemanticNode {
    /// Build a node from a MathML element.
    pub fn from_element(el: &Element) -> SemanticNode {
        let mut operands = el.child_elements().map(SemanticNode::from_element);
        let mut next = || Box::new(operands.next().unwrap_or(SemanticNode::Row(Vec::new())));

        match el.local_name() {
            "mi" => SemanticNode::Identifier(el.text_content().trim().to_string()),
            "mn" => SemanticNode::Number(el.text_content().trim().to_string()),
            "mo" => SemanticNode::Operator(el.text_content().trim().to_string()),
            "mtext" => SemanticNode::Text(el.text_content()),
            "mspace" => SemanticNode::Space,
            "math" | "mrow" | "mstyle" | "mpadded" => SemanticNode::Row(row_children(el)),
            "semantics" => match presentation_child(el) {
                Some(child) => SemanticNode::from_element(child),
                None => SemanticNode::Row(Vec::new()),
            },
            "msup" => SemanticNode::Superscript {
                base: next(),
                exponent: next(),
            },
            "msub" => SemanticNode::Subscript {
                base: next(),
                subscript: next(),
            },
            "msubsup" => SemanticNode::SubSuperscript {
                base: next(),
                subscript: next(),
                superscript: next(),
            },
            "mfrac" => SemanticNode::Fraction {
                numerator: next(),
                denominator: next(),
            },
            "msqrt" => SemanticNode::SquareRoot(row_children(el)),
            "mroot" => SemanticNode::NthRoot {
                radicand: next(),
                index: next(),
            },
            other => SemanticNode::Unknown {
                tag: other.to_string(),
                text: el.text_content(),
            },
        }
    }

    /// Convert to LaTeX, depth first.
    pub fn to_latex(&self, logger: &dyn Logger) -> String {
        match self {
            SemanticNode::Identifier(text) | SemanticNode::Number(text) => text.clone(),
            SemanticNode::Operator(op) => operator_latex(op),
            SemanticNode::Text(text) if text.trim().is_empty() => String::new(),
            SemanticNode::Text(text) => format!("\\text{{{}}}", text),
            SemanticNode::Space => String::new(),
            SemanticNode::Row(children) => join(children, logger),
            SemanticNode::Superscript { base, exponent } => format!(
                "{}^{{{}}}",
                base.to_latex(logger),
                exponent.to_latex(logger)
            ),
            SemanticNode::Subscript { base, subscript } => format!(
                "{}_{{{}}}",
                base.to_latex(logger),
                subscript.to_latex(logger)
            ),
            SemanticNode::SubSuperscript {
                base,
                subscript,
                superscript,
            } => format!(
                "{}_{{{}}}^{{{}}}",
                base.to_latex(logger),
                subscript.to_latex(logger),
                superscript.to_latex(logger)
            ),
            SemanticNode::Fraction {
                numerator,
                denominator,
            } => format!(
                "\\frac{{{}}}{{{}}}",
                numerator.to_latex(logger),
                denominator.to_latex(logger)
            ),
            SemanticNode::SquareRoot(children) => format!("\\sqrt{{{}}}", join(children, logger)),
            SemanticNode::NthRoot { radicand, index } => format!(
                "\\sqrt[{}]{{{}}}",
                index.to_latex(logger),
                radicand.to_latex(logger)
            ),
            SemanticNode::Unknown { tag, text } => {
                logger.warn(&format!(
                    "no LaTeX mapping for <{}>, copying its text; reconstruction may be inaccurate",
                    tag
                ));
                text.clone()
            }
        }
    }
}

fn join(children: &[SemanticNode], logger: &dyn Logger) -> String {
    children.iter().map(|c| c.to_latex(logger)).collect()
}

fn row_children(el: &Element) -> Vec<SemanticNode> {
    el.child_elements()
        .filter(|child| !is_annotation(child))
        .map(SemanticNode::from_element)
        .collect()
}

fn is_annotation(el: &Element) -> bool {
    el.is("annotation") || el.is("annotation-xml")
}

/// The presentation tree under `<semantics>`: its first non-annotation child.
fn presentation_child(semantics: &Element) -> Option<&Element> {
    semantics.child_elements().find(|child| !is_annotation(child))
}

/// Operators with a named command. Emitted with a trailing space so a
/// following letter cannot extend the command name.
const NAMED_OPERATORS: &[(&str, &str)] = &[
    ("\u{00D7}", "\\times "),
    ("\u{00F7}", "\\div "),
    ("\u{00B1}", "\\pm "),
    ("\u{2213}", "\\mp "),
    ("\u{00B7}", "\\cdot "),
    ("\u{22C5}", "\\cdot "),
    ("\u{2264}", "\\leq "),
    ("\u{2265}", "\\geq "),
    ("\u{2260}", "\\neq "),
    ("\u{2192}", "\\to "),
    ("\u{221E}", "\\infty "),
    ("\u{2208}", "\\in "),
];

/// Invisible times, function application and invisible separator.
const INVISIBLE_OPERATORS: &[&str] = &["\u{2062}", "\u{2061}", "\u{2063}"];

fn operator_latex(op: &str) -> String {
    if INVISIBLE_OPERATORS.contains(&op) {
        return String::new();
    }
    NAMED_OPERATORS
        .iter()
        .find(|(symbol, _)| *symbol == op)
        .map(|(_, command)| command.to_string())
        .unwrap_or_else(|| op.to_string())
}

/// Recursive-descent fallback converter from MathML to LaTeX.
pub struct SemanticTreeReconstructor {
    logger: Arc<dyn Logger>,
}

impl SemanticTreeReconstructor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Reconstruct LaTeX for `math`, or `None` if nothing usable comes out.
    pub fn reconstruct(&self, math: &Element) -> Option<String> {
        let root = SemanticNode::from_element(math);
        let latex = root.to_latex(self.logger.as_ref());
        let latex = latex.trim();

        if latex.is_empty() {
            None
        } else {
            Some(latex.to_string())
        }
    }
}

impl NotationRecovery for SemanticTreeReconstructor {
    fn recover(&self, math: &Element) -> Option<String> {
        self.reconstruct(math)
    }

    fn name(&self) -> &'static str {
        "semantic reconstruction"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse;
    use crate::logging::{MemoryLogger, NullLogger};
    use pretty_assertions::assert_eq;

    fn reconstruct(mathml: &str) -> Option<String> {
        let doc = parse(&format!("<math>{}</math>", mathml)).unwrap();
        let math = doc.children[0].as_element().unwrap();
        SemanticTreeReconstructor::new(Arc::new(NullLogger)).reconstruct(math)
    }

    #[test]
    fn test_superscript() {
        assert_eq!(
            reconstruct("<msup><mi>x</mi><mn>2</mn></msup>"),
            Some("x^{2}".to_string())
        );
    }

    #[test]
    fn test_fraction() {
        assert_eq!(
            reconstruct("<mfrac><mn>1</mn><mn>2</mn></mfrac>"),
            Some(r"\frac{1}{2}".to_string())
        );
    }

    #[test]
    fn test_subscript_and_subsup() {
        assert_eq!(
            reconstruct("<msub><mi>a</mi><mi>n</mi></msub>"),
            Some("a_{n}".to_string())
        );
        assert_eq!(
            reconstruct("<msubsup><mo>∫</mo><mn>0</mn><mn>1</mn></msubsup>"),
            Some("∫_{0}^{1}".to_string())
        );
    }

    #[test]
    fn test_roots() {
        assert_eq!(
            reconstruct("<msqrt><mi>x</mi><mo>+</mo><mn>1</mn></msqrt>"),
            Some(r"\sqrt{x+1}".to_string())
        );
        assert_eq!(
            reconstruct("<mroot><mi>x</mi><mn>3</mn></mroot>"),
            Some(r"\sqrt[3]{x}".to_string())
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            reconstruct("<mrow><mn>2</mn><mo>\u{2062}</mo><mi>x</mi></mrow>"),
            Some("2x".to_string())
        );
        assert_eq!(
            reconstruct("<mrow><mi>a</mi><mo>×</mo><mi>b</mi></mrow>"),
            Some(r"a\times b".to_string())
        );
    }

    #[test]
    fn test_semantics_skips_annotations() {
        assert_eq!(
            reconstruct(
                r#"<semantics><mrow><mi>E</mi><mo>=</mo><mi>m</mi><msup><mi>c</mi><mn>2</mn></msup></mrow><annotation encoding="text/plain">junk</annotation></semantics>"#
            ),
            Some("E=mc^{2}".to_string())
        );
    }

    #[test]
    fn test_text_and_space() {
        assert_eq!(
            reconstruct("<mrow><mi>x</mi><mspace width=\"1em\"></mspace><mtext>if</mtext></mrow>"),
            Some(r"x\text{if}".to_string())
        );
    }

    #[test]
    fn test_unknown_passthrough_is_logged() {
        let logger = Arc::new(MemoryLogger::default());
        let doc = parse("<math><mover><mi>x</mi><mo>^</mo></mover></math>").unwrap();
        let math = doc.children[0].as_element().unwrap();

        let result = SemanticTreeReconstructor::new(logger.clone()).reconstruct(math);

        assert_eq!(result, Some("x^".to_string()));
        assert_eq!(logger.count("warn"), 1);
    }

    #[test]
    fn test_missing_operands_are_empty() {
        assert_eq!(
            reconstruct("<mfrac><mn>1</mn></mfrac>"),
            Some(r"\frac{1}{}".to_string())
        );
    }

    #[test]
    fn test_empty_result_is_none() {
        assert_eq!(reconstruct(""), None);
        assert_eq!(reconstruct("<mrow><mo>\u{2062}</mo></mrow>"), None);
    }
}
