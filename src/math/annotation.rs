//! Exact LaTeX recovery from MathML `<annotation>` elements.

use std::sync::Arc;

use super::NotationRecovery;
use crate::html::Element;
use crate::logging::Logger;

/// Annotation encodings that carry TeX source, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationEncoding {
    /// `application/x-tex`, emitted by KaTeX and MathJax.
    XTex,
    /// `application/x-latex`, emitted by some converters.
    XLatex,
    /// `TeX`, the short form.
    Tex,
}

impl AnnotationEncoding {
    /// Probe order: first match wins.
    pub const PRIORITY: [AnnotationEncoding; 3] = [
        AnnotationEncoding::XTex,
        AnnotationEncoding::XLatex,
        AnnotationEncoding::Tex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationEncoding::XTex => "application/x-tex",
            AnnotationEncoding::XLatex => "application/x-latex",
            AnnotationEncoding::Tex => "TeX",
        }
    }
}

/// Placeholder text some pipelines write when the source was lost.
const CORRUPT_MARKER: &str = "undefined";

/// Pulls the stored source out of a MathML subtree.
pub struct AnnotationExtractor {
    logger: Arc<dyn Logger>,
}

impl AnnotationExtractor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Return the first valid annotation text under `math`, trimmed.
    pub fn extract(&self, math: &Element) -> Option<String> {
        let annotations: Vec<&Element> = math
            .descendants()
            .into_iter()
            .filter(|e| e.is("annotation"))
            .collect();

        for encoding in AnnotationEncoding::PRIORITY {
            for annotation in annotations
                .iter()
                .filter(|a| a.attr("encoding").map(str::trim) == Some(encoding.as_str()))
            {
                let text = annotation.text_content();
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if text == CORRUPT_MARKER {
                    self.logger.debug(&format!(
                        "ignoring placeholder {} annotation",
                        encoding.as_str()
                    ));
                    continue;
                }
                return Some(text.to_string());
            }
        }

        None
    }
}

impl NotationRecovery for AnnotationExtractor {
    fn recover(&self, math: &Element) -> Option<String> {
        self.extract(math)
    }

    fn name(&self) -> &'static str {
        "annotation"
    }
}
