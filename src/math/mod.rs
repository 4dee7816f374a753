//! Recovery of LaTeX source from rendered maths.

mod annotation;
mod rewrite;
mod semantic;

pub use self::annotation::{AnnotationEncoding, AnnotationExtractor};
pub use self::rewrite::{RenderedMathRewriter, RewriteConfig, RewriteOutcome};
pub use self::semantic::{SemanticNode, SemanticTreeReconstructor};

use serde::{Deserialize, Serialize};

use crate::html::Element;

/// A way of getting LaTeX back out of a MathML subtree.
pub trait NotationRecovery: Send + Sync {
    /// Recover the notation for `math`, or `None` on failure.
    fn recover(&self, math: &Element) -> Option<String>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Delimiter pair used to wrap recovered notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiters {
    /// `$...$` inline, `$$...$$` display.
    #[default]
    Dollars,
    /// `\(...\)` inline, `\[...\]` display.
    Brackets,
}

impl Delimiters {
    /// Wrap `latex` in the inline or display pair.
    pub fn wrap(self, latex: &str, display: bool) -> String {
        let (open, close) = match (self, display) {
            (Delimiters::Dollars, false) => ("$", "$"),
            (Delimiters::Dollars, true) => ("$$", "$$"),
            (Delimiters::Brackets, false) => ("\\(", "\\)"),
            (Delimiters::Brackets, true) => ("\\[", "\\]"),
        };
        format!("{}{}{}", open, latex, close)
    }
}
