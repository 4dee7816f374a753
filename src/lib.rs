//! # math-roundtrip
//!
//! Recovers LaTeX source from KaTeX-rendered HTML, so a document exported with
//! static maths can be re-typeset and regain its interactive behaviour.
//!
//! ## How recovery works
//!
//! Each rendered expression normally carries a hidden MathML copy with an
//! `<annotation encoding="application/x-tex">` holding the exact source. That
//! annotation is always preferred. When it is missing or holds a placeholder,
//! the LaTeX is rebuilt from the MathML structure; this fallback is lossy.
//!
//! ## Quick Start
//!
//! ```rust
//! use math_roundtrip::rewrite_rendered_math;
//!
//! let html = r#"<p>Energy: <span class="katex"><span class="katex-mathml"><math><semantics><mrow><mi>E</mi></mrow><annotation encoding="application/x-tex">E=mc^2</annotation></semantics></math></span></span></p>"#;
//!
//! let outcome = rewrite_rendered_math(html);
//! assert_eq!(outcome.html, "<p>Energy: $E=mc^2$</p>");
//! assert_eq!(outcome.conversions, 1);
//! ```
//!
//! ## Components
//!
//! - [`RenderedMathRewriter`]: rewrites a whole fragment
//! - [`AnnotationExtractor`] and [`SemanticTreeReconstructor`]: the two
//!   recovery strategies, tried in that order
//! - [`validate_notation`]: shallow delimiter and environment balance check
//! - [`MetadataExtractor`]: title, author, date, document class and outline
//!
//! Everything is synchronous and side-effect free apart from logging, which
//! goes through an injected [`Logger`] (by default, the `log` crate).
//!
//! ## Features
//!
//! - `wasm`: WebAssembly bindings for the browser-side exporter

pub mod config;
pub mod error;
pub mod html;
pub mod logging;
pub mod math;
pub mod metadata;
pub mod validate;

// WASM module (only with feature)
#[cfg(feature = "wasm")]
pub mod wasm;

// Convenience re-exports
pub use config::Config;
pub use error::{ConfigError, Error, ParseError, RenderError, Result};
pub use logging::{LogFacade, Logger, NullLogger};
pub use math::{
    AnnotationExtractor, Delimiters, NotationRecovery, RenderedMathRewriter, RewriteConfig,
    RewriteOutcome, SemanticTreeReconstructor,
};
pub use metadata::{DocumentMetadata, MetadataExtractor, MetadataRules, Section};
pub use validate::{validate_notation, ValidationReport};

/// Rewrite rendered maths in `fragment` with the default configuration.
pub fn rewrite_rendered_math(fragment: &str) -> RewriteOutcome {
    RenderedMathRewriter::default().rewrite(fragment)
}

/// Extract metadata from `source` with the default rules.
pub fn extract_metadata(source: &str) -> DocumentMetadata {
    MetadataExtractor::default().extract(source)
}
