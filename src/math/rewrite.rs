//! Replace rendered maths in an HTML fragment with recoverable LaTeX.
//!
//! The fragment is parsed once into an immutable tree, rewritten by three
//! passes that each consume a tree and return a new one, and serialized once:
//!
//! 1. rendered containers outside legacy wrappers become delimited LaTeX text;
//! 2. legacy wrappers keep their element but get the LaTeX as their only child;
//! 3. leftover engine `<script>`/`<style>` blocks are dropped.
//!
//! Every step degrades locally: an expression that cannot be recovered stays
//! as rendered markup, and a fragment that cannot be parsed is returned as is.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{AnnotationExtractor, Delimiters, NotationRecovery, SemanticTreeReconstructor};
use crate::error::Result;
use crate::html::{self, Element, Node, ParseLimits};
use crate::logging::{default_logger, Logger};

/// Configuration for the rewriter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Name token of the typesetting engine. Containers carry it as a class
    /// (`katex`, `katex-display`) and its assets mention it.
    pub engine: String,
    /// Delimiters written around recovered notation.
    pub delimiters: Delimiters,
    /// Class marking the wrappers our exporter emitted before auto-render.
    pub legacy_wrapper_class: String,
    /// Remove the engine's `<script>`/`<style>` blocks.
    pub strip_engine_assets: bool,
    /// Inputs larger than this are returned untouched. `None` disables the limit.
    pub max_input_bytes: Option<usize>,
    /// Inputs nesting elements deeper than this are returned untouched.
    pub max_depth: Option<usize>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            engine: "katex".to_string(),
            delimiters: Delimiters::default(),
            legacy_wrapper_class: "math".to_string(),
            strip_engine_assets: true,
            max_input_bytes: Some(64 * 1024 * 1024),
            max_depth: Some(html::DEFAULT_MAX_DEPTH),
        }
    }
}

/// Result of rewriting one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteOutcome {
    /// The rewritten fragment.
    pub html: String,
    /// Expressions replaced by LaTeX.
    pub conversions: usize,
    /// Expressions left as rendered markup.
    pub failures: usize,
    /// Engine script/style blocks removed.
    pub stripped: usize,
}

impl RewriteOutcome {
    fn unchanged(html: &str) -> Self {
        Self {
            html: html.to_string(),
            conversions: 0,
            failures: 0,
            stripped: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    conversions: usize,
    failures: usize,
    stripped: usize,
}

/// Orchestrates annotation extraction and reconstruction over a fragment.
pub struct RenderedMathRewriter {
    config: RewriteConfig,
    primary: Box<dyn NotationRecovery>,
    fallback: Box<dyn NotationRecovery>,
    logger: Arc<dyn Logger>,
}

impl Default for RenderedMathRewriter {
    fn default() -> Self {
        Self::new(RewriteConfig::default(), default_logger())
    }
}

impl RenderedMathRewriter {
    /// Annotation first, MathML reconstruction as fallback.
    pub fn new(config: RewriteConfig, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            primary: Box::new(AnnotationExtractor::new(logger.clone())),
            fallback: Box::new(SemanticTreeReconstructor::new(logger.clone())),
            logger,
        }
    }

    /// Replace the fallback strategy.
    pub fn with_fallback(mut self, fallback: Box<dyn NotationRecovery>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Replace the primary strategy.
    pub fn with_primary(mut self, primary: Box<dyn NotationRecovery>) -> Self {
        self.primary = primary;
        self
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Rewrite `fragment`, never failing: on a parse or serialization error
    /// the input comes back unchanged.
    pub fn rewrite(&self, fragment: &str) -> RewriteOutcome {
        match self.try_rewrite(fragment) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.logger
                    .warn(&format!("leaving fragment unchanged: {}", err));
                RewriteOutcome::unchanged(fragment)
            }
        }
    }

    /// Rewrite `fragment`, surfacing whole-fragment errors to the caller.
    pub fn try_rewrite(&self, fragment: &str) -> Result<RewriteOutcome> {
        let limits = ParseLimits {
            max_bytes: self.config.max_input_bytes,
            max_depth: self.config.max_depth,
        };
        let document = html::parse_with_limits(fragment, limits)?;
        let mut stats = Stats::default();

        let nodes = self.modern_pass(document.children, &mut stats);
        let nodes = self.legacy_pass(nodes, &mut stats);
        let nodes = if self.config.strip_engine_assets {
            self.strip_pass(nodes, &mut stats)
        } else {
            nodes
        };

        // Nothing changed: hand back the exact input rather than a re-serialization.
        let html = if stats.conversions == 0 && stats.stripped == 0 {
            fragment.to_string()
        } else {
            html::serialize_nodes(&nodes)?
        };

        self.logger.debug(&format!(
            "rewrote fragment: {} converted, {} left rendered, {} engine blocks stripped",
            stats.conversions, stats.failures, stats.stripped
        ));

        Ok(RewriteOutcome {
            html,
            conversions: stats.conversions,
            failures: stats.failures,
            stripped: stats.stripped,
        })
    }

    fn modern_pass(&self, nodes: Vec<Node>, stats: &mut Stats) -> Vec<Node> {
        nodes
            .into_iter()
            .map(|node| match node {
                Node::Element(el) if self.legacy_target(&el).is_some() => Node::Element(el),
                Node::Element(el) if self.is_container(&el) => {
                    let display = self.is_display(&el);
                    match self.recover(&el) {
                        Some(latex) => {
                            stats.conversions += 1;
                            Node::Text(self.config.delimiters.wrap(&latex, display))
                        }
                        None => {
                            stats.failures += 1;
                            Node::Element(el)
                        }
                    }
                }
                Node::Element(Element {
                    name,
                    attrs,
                    children,
                }) => Node::Element(Element {
                    name,
                    attrs,
                    children: self.modern_pass(children, stats),
                }),
                other => other,
            })
            .collect()
    }

    fn legacy_pass(&self, nodes: Vec<Node>, stats: &mut Stats) -> Vec<Node> {
        nodes
            .into_iter()
            .map(|node| match node {
                Node::Element(el) => {
                    let recovered = self.legacy_target(&el).map(|container| {
                        let display = el.has_class("display") || self.is_display(container);
                        (display, self.recover(container))
                    });

                    match recovered {
                        Some((display, Some(latex))) => {
                            stats.conversions += 1;
                            let text = Node::Text(self.config.delimiters.wrap(&latex, display));
                            Node::Element(el.with_children(vec![text]))
                        }
                        Some((_, None)) => {
                            stats.failures += 1;
                            Node::Element(el)
                        }
                        None => {
                            let Element {
                                name,
                                attrs,
                                children,
                            } = el;
                            Node::Element(Element {
                                name,
                                attrs,
                                children: self.legacy_pass(children, stats),
                            })
                        }
                    }
                }
                other => other,
            })
            .collect()
    }

    fn strip_pass(&self, nodes: Vec<Node>, stats: &mut Stats) -> Vec<Node> {
        nodes
            .into_iter()
            .filter_map(|node| match node {
                Node::Element(el) if self.is_engine_asset(&el) => {
                    stats.stripped += 1;
                    None
                }
                Node::Element(Element {
                    name,
                    attrs,
                    children,
                }) => Some(Node::Element(Element {
                    name,
                    attrs,
                    children: self.strip_pass(children, stats),
                })),
                other => Some(other),
            })
            .collect()
    }

    /// Annotation first; reconstruction only when that finds nothing.
    fn recover(&self, container: &Element) -> Option<String> {
        let Some(math) = container.find(|e| e.is("math")) else {
            self.logger
                .warn("rendered expression has no MathML subtree, leaving it in place");
            return None;
        };

        if let Some(latex) = self.primary.recover(math) {
            return Some(latex);
        }

        self.logger.debug(&format!(
            "{} found nothing, trying {}",
            self.primary.name(),
            self.fallback.name()
        ));

        match self.fallback.recover(math) {
            Some(latex) => {
                self.logger.info(&format!(
                    "recovered `{}` by {}; result may differ from the original source",
                    latex,
                    self.fallback.name()
                ));
                Some(latex)
            }
            None => {
                self.logger.warn(&format!(
                    "could not recover notation ({} and {} failed), leaving expression rendered",
                    self.primary.name(),
                    self.fallback.name()
                ));
                None
            }
        }
    }

    fn display_class(&self) -> String {
        format!("{}-display", self.config.engine)
    }

    fn is_container(&self, el: &Element) -> bool {
        el.has_class(&self.config.engine) || el.has_class(&self.display_class())
    }

    fn is_display(&self, container: &Element) -> bool {
        container.has_class(&self.display_class())
            || container
                .find(|e| e.is("math"))
                .and_then(|math| math.attr("display"))
                .is_some_and(|mode| mode.eq_ignore_ascii_case("block"))
    }

    /// The container a legacy wrapper holds, when it holds exactly one.
    fn legacy_target<'a>(&self, el: &'a Element) -> Option<&'a Element> {
        let is_wrapper = el.has_class(&self.config.legacy_wrapper_class)
            && (el.has_class("display") || el.has_class("inline"));
        if !is_wrapper {
            return None;
        }

        let mut containers = Vec::new();
        self.outer_containers(&el.children, &mut containers);
        match containers.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn outer_containers<'a>(&self, nodes: &'a [Node], out: &mut Vec<&'a Element>) {
        for el in nodes.iter().filter_map(Node::as_element) {
            if self.is_container(el) {
                out.push(el);
            } else {
                self.outer_containers(&el.children, out);
            }
        }
    }

    fn is_engine_asset(&self, el: &Element) -> bool {
        let token = self.config.engine.to_ascii_lowercase();
        if token.is_empty() {
            return false;
        }
        let mentions = |text: &str| text.to_ascii_lowercase().contains(&token);

        if el.is("script") {
            el.attr("src").is_some_and(mentions) || mentions(&el.text_content())
        } else if el.is("style") {
            mentions(&el.text_content())
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{MemoryLogger, NullLogger};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// KaTeX output for one expression.
    fn katex(mathml: &str, annotation: Option<&str>, display: bool) -> String {
        let annotation = annotation
            .map(|a| format!(r#"<annotation encoding="application/x-tex">{}</annotation>"#, a))
            .unwrap_or_default();
        let mode = if display { r#" display="block""# } else { "" };
        let inner = format!(
            r#"<span class="katex"><span class="katex-mathml"><math xmlns="http://www.w3.org/1998/Math/MathML"{}><semantics><mrow>{}</mrow>{}</semantics></math></span><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord">rendered</span></span></span></span>"#,
            mode, mathml, annotation
        );
        if display {
            format!(r#"<span class="katex-display">{}</span>"#, inner)
        } else {
            inner
        }
    }

    const EMC2: &str = "<mi>E</mi><mo>=</mo><mi>m</mi><msup><mi>c</mi><mn>2</mn></msup>";

    /// Counts calls before delegating to the real reconstructor.
    struct CountingRecovery {
        calls: Arc<AtomicUsize>,
        inner: SemanticTreeReconstructor,
    }

    impl NotationRecovery for CountingRecovery {
        fn recover(&self, math: &Element) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.recover(math)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn spied_rewriter() -> (RenderedMathRewriter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = CountingRecovery {
            calls: calls.clone(),
            inner: SemanticTreeReconstructor::new(Arc::new(NullLogger)),
        };
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), Arc::new(NullLogger))
            .with_fallback(Box::new(spy));
        (rewriter, calls)
    }

    #[test]
    fn test_display_annotation_scenario() {
        let (rewriter, calls) = spied_rewriter();
        let input = format!("<p>Energy:</p>{}", katex(EMC2, Some("E=mc^2"), true));

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome.html, "<p>Energy:</p>$$E=mc^2$$");
        assert_eq!(outcome.conversions, 1);
        assert_eq!(outcome.html.matches("$$E=mc^2$$").count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reconstructor_never_runs_with_annotations() {
        let (rewriter, calls) = spied_rewriter();
        let input = format!(
            "<p>{} and {} and {}</p>",
            katex("<mi>a</mi>", Some("a"), false),
            katex("<mi>b</mi>", Some(r"\beta"), false),
            katex(EMC2, Some("E=mc^2"), true),
        );

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome.conversions, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.html, r"<p>$a$ and $\beta$ and $$E=mc^2$$</p>");
    }

    #[test]
    fn test_undefined_annotation_falls_back() {
        let (rewriter, calls) = spied_rewriter();
        let input = katex(EMC2, Some("undefined"), false);

        let outcome = rewriter.rewrite(&input);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.html, "$E=mc^{2}$");
        assert_eq!(outcome.conversions, 1);
    }

    #[test]
    fn test_display_mode_preserved_on_both_paths() {
        let rewriter = RenderedMathRewriter::new(
            RewriteConfig {
                delimiters: Delimiters::Brackets,
                ..RewriteConfig::default()
            },
            Arc::new(NullLogger),
        );

        let annotated = rewriter.rewrite(&katex("<mi>x</mi>", Some("x"), true));
        let reconstructed = rewriter.rewrite(&katex("<mi>x</mi>", None, true));
        let inline = rewriter.rewrite(&katex("<mi>x</mi>", None, false));

        assert_eq!(annotated.html, r"\[x\]");
        assert_eq!(reconstructed.html, r"\[x\]");
        assert_eq!(inline.html, r"\(x\)");
    }

    #[test]
    fn test_display_from_math_attribute() {
        // A bare .katex whose MathML says display="block".
        let input = katex("<mi>y</mi>", Some("y"), true)
            .replacen(r#"<span class="katex-display">"#, "<div>", 1)
            .replacen("</span></span></span></span></span>", "</span></span></span></span></div>", 1);
        let outcome = RenderedMathRewriter::new(RewriteConfig::default(), Arc::new(NullLogger))
            .rewrite(&input);

        assert_eq!(outcome.html, "<div>$$y$$</div>");
    }

    #[test]
    fn test_no_math_returns_input_verbatim() {
        let rewriter = RenderedMathRewriter::default();
        let input = "<p>Plain <br/> text<p>unclosed";

        let outcome = rewriter.rewrite(input);

        assert_eq!(outcome.html, input);
        assert_eq!(outcome.conversions, 0);
    }

    #[test]
    fn test_unrecoverable_container_is_kept() {
        let logger = Arc::new(MemoryLogger::default());
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), logger.clone());
        let broken = r#"<span class="katex"><span class="katex-html">x</span></span>"#;
        let input = format!("{}{}", broken, katex("<mi>z</mi>", Some("z"), false));

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome.conversions, 1);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.html, format!("{}$z$", broken));
        assert!(logger.count("warn") >= 1);
    }

    #[test]
    fn test_legacy_wrapper_keeps_element() {
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), Arc::new(NullLogger));
        let input = format!(
            r#"<div class="math display" id="eq1">{}</div><span class="math inline">{}</span>"#,
            katex("<mi>x</mi>", Some("x^2"), false),
            katex("<mi>y</mi>", Some("y"), false),
        );

        let outcome = rewriter.rewrite(&input);

        assert_eq!(
            outcome.html,
            r#"<div class="math display" id="eq1">$$x^2$$</div><span class="math inline">$y$</span>"#
        );
        assert_eq!(outcome.conversions, 2);
    }

    #[test]
    fn test_unrecoverable_legacy_wrapper_is_kept() {
        let logger = Arc::new(MemoryLogger::default());
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), logger.clone());
        let wrapper =
            r#"<div class="math display"><span class="katex"><span class="katex-html">x</span></span></div>"#;

        let outcome = rewriter.rewrite(wrapper);
        assert_eq!(outcome.html, wrapper);
        assert_eq!(outcome.conversions, 0);
        assert_eq!(outcome.failures, 1);
        assert!(logger.count("warn") >= 1);

        // Re-serialized alongside a converted sibling, the wrapper is still intact.
        let input = format!("{}{}", wrapper, katex("<mi>z</mi>", Some("z"), false));
        let outcome = rewriter.rewrite(&input);
        assert_eq!(outcome.html, format!("{}$z$", wrapper));
        assert_eq!(outcome.conversions, 1);
        assert_eq!(outcome.failures, 1);
    }

    #[test]
    fn test_wrapper_with_several_containers_is_not_legacy() {
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), Arc::new(NullLogger));
        let input = format!(
            r#"<p class="math inline">{} {}</p>"#,
            katex("<mi>a</mi>", Some("a"), false),
            katex("<mi>b</mi>", Some("b"), false),
        );

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome.html, r#"<p class="math inline">$a$ $b$</p>"#);
    }

    #[test]
    fn test_strips_only_engine_assets() {
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), Arc::new(NullLogger));
        let input = concat!(
            r#"<script src="https://cdn.example/KaTeX/katex.min.js"></script>"#,
            "<script>renderMathInElement(document.body); katex.render();</script>",
            "<script>console.log(1)</script>",
            "<style>.katex { font: 1em KaTeX_Main; }</style>",
            "<style>p { margin: 0; }</style>",
            "<p>text</p>"
        );

        let outcome = rewriter.rewrite(input);

        assert_eq!(outcome.stripped, 3);
        assert_eq!(
            outcome.html,
            "<script>console.log(1)</script><style>p { margin: 0; }</style><p>text</p>"
        );
    }

    #[test]
    fn test_strip_can_be_disabled() {
        let rewriter = RenderedMathRewriter::new(
            RewriteConfig {
                strip_engine_assets: false,
                ..RewriteConfig::default()
            },
            Arc::new(NullLogger),
        );
        let input = r#"<script src="katex.js"></script>"#;

        assert_eq!(rewriter.rewrite(input).html, input);
    }

    #[test]
    fn test_notation_is_escaped_in_output() {
        let rewriter = RenderedMathRewriter::default();
        let input = katex("<mi>a</mi><mo>&lt;</mo><mi>b</mi>", Some("a &lt; b"), false);

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome.html, "$a &lt; b$");
    }

    #[test]
    fn test_oversized_input_is_returned_unchanged() {
        let logger = Arc::new(MemoryLogger::default());
        let rewriter = RenderedMathRewriter::new(
            RewriteConfig {
                max_input_bytes: Some(16),
                ..RewriteConfig::default()
            },
            logger.clone(),
        );
        let input = katex("<mi>x</mi>", Some("x"), false);

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome, RewriteOutcome::unchanged(&input));
        assert_eq!(logger.count("warn"), 1);
        assert!(rewriter.try_rewrite(&input).is_err());
    }

    #[test]
    fn test_full_document_is_preserved() {
        let rewriter = RenderedMathRewriter::default();
        let input = format!(
            "<!DOCTYPE html><html><head><title>Doc</title></head><body><p>{}</p></body></html>",
            katex("<mi>x</mi>", Some("x"), false)
        );

        let outcome = rewriter.rewrite(&input);

        assert_eq!(
            outcome.html,
            "<!DOCTYPE html><html><head><title>Doc</title></head><body><p>$x$</p></body></html>"
        );
    }

    #[test]
    fn test_deeply_nested_fragment_is_returned_unchanged() {
        let logger = Arc::new(MemoryLogger::default());
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), logger.clone());
        let input = format!(
            "{}{}{}",
            "<div>".repeat(5000),
            katex("<mi>x</mi>", Some("x"), false),
            "</div>".repeat(5000)
        );

        let outcome = rewriter.rewrite(&input);

        assert_eq!(outcome, RewriteOutcome::unchanged(&input));
        assert_eq!(logger.count("warn"), 1);
    }

    #[test]
    fn test_deep_mathml_is_returned_unchanged() {
        let rewriter = RenderedMathRewriter::new(RewriteConfig::default(), Arc::new(NullLogger));
        let deep = format!("{}<mi>x</mi>", "<mrow>".repeat(5000));
        let input = katex(&deep, None, false);

        assert_eq!(rewriter.rewrite(&input), RewriteOutcome::unchanged(&input));
    }

    #[test]
    fn test_nesting_within_bound_is_converted() {
        let rewriter = RenderedMathRewriter::new(
            RewriteConfig {
                max_depth: Some(64),
                ..RewriteConfig::default()
            },
            Arc::new(NullLogger),
        );
        let input = format!(
            "{}{}{}",
            "<div>".repeat(20),
            katex("<mi>x</mi>", Some("x"), false),
            "</div>".repeat(20)
        );

        let outcome = rewriter.rewrite(&input);

        assert_eq!(
            outcome.html,
            format!("{}$x${}", "<div>".repeat(20), "</div>".repeat(20))
        );
    }
}
