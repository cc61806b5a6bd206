/*! Convert Anchor program source to a Warden program model.
 *
 * Tree-sitter gives a Rust syntax tree, but Anchor's access control hides inside attribute token
 * trees and handler bodies. This pipeline walks the tree in two passes: declarations first
 * (accounts contexts, state structs, events), then `#[program]` handlers, whose operations
 * are resolved against the declared accounts.
 */

mod attributes;
mod context;
mod errors;
mod expression_scanner;
mod instruction_transformer;
mod seed_classifier;
mod structural_transformer;
mod type_resolver;


use std::path::PathBuf;
use tracing::{debug, info_span};
use tree_sitter::{Node, Tree};
use warden_core::{ProgramModel, ProgramModelBuilder, SourceFile};

pub use errors::{Result, TransformError};
pub use instruction_transformer::InstructionTransformer;
pub use structural_transformer::StructuralTransformer;
pub use type_resolver::TypeResolver;

use context::span_of;

pub trait ModelTransformer {
    fn name(&self) -> &str;

    fn transform(&mut self, builder: &mut ProgramModelBuilder, ast: &Node, source: &str) -> Result<()>;

    fn check_prerequisites(&self, _builder: &ProgramModelBuilder) -> Result<()> {
        Ok(())
    }
}

pub struct TransformationPipeline {
    source: String,
    filename: Option<String>,
    ast: Option<Tree>,
    transformers: Vec<Box<dyn ModelTransformer>>,
}

impl TransformationPipeline {
    pub fn default(source: &str) -> Self {
        Self {
            source: source.to_string(),
            filename: None,
            ast: None,
            transformers: vec![
                Box::new(StructuralTransformer::new()),
                Box::new(InstructionTransformer::new()),
            ],
        }
    }

    pub fn with_filename(source: &str, filename: String) -> Self {
        Self {
            source: source.to_string(),
            filename: Some(filename.clone()),
            ast: None,
            transformers: vec![
                Box::new(StructuralTransformer::with_filename(filename.clone())),
                Box::new(InstructionTransformer::with_filename(filename)),
            ],
        }
    }

    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            filename: None,
            ast: None,
            transformers: vec![],
        }
    }

    pub fn with_transformer(mut self, transformer: Box<dyn ModelTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn transform(mut self) -> Result<ProgramModel> {
        let _span = info_span!("build_model", file = self.filename.as_deref().unwrap_or("<unknown>")).entered();
        let file = SourceFile::new(self.filename.as_ref().map(PathBuf::from), &self.source)?;

        if self.ast.is_none() {
            let mut parser = tree_sitter::Parser::new();
            let language = tree_sitter_rust::LANGUAGE.into();
            parser
                .set_language(&language)
                .map_err(|e| TransformError::Language(format!("Failed to set language: {}", e)))?;

            let tree = parser
                .parse(&self.source, None)
                .ok_or_else(|| TransformError::Language("Failed to parse source".to_string()))?;

            if let Some(bad) = first_syntax_error(tree.root_node()) {
                let (line, column) = file.to_line_col(bad.start_byte());
                let message = if bad.is_missing() {
                    format!("missing `{}`", bad.kind())
                } else {
                    let text = &self.source[bad.byte_range()];
                    let token: String = text.chars().take(24).collect();
                    format!("unexpected `{}`", token.trim())
                };
                return Err(TransformError::ParseError {
                    line,
                    column,
                    message,
                    span: span_of(bad),
                });
            }

            self.ast = Some(tree);
        }

        let ast = self
            .ast
            .as_ref()
            .ok_or_else(|| TransformError::Language("AST not initialized".to_string()))?;
        let root_node = ast.root_node();

        let mut builder = ProgramModelBuilder::new(file);

        for transformer in &mut self.transformers {
            transformer.check_prerequisites(&builder)?;
            debug!(transformer = transformer.name(), "running");
            transformer.transform(&mut builder, &root_node, &self.source)?;
        }

        Ok(builder.build()?)
    }
}

/// First ERROR or MISSING node in document order.
fn first_syntax_error(root: Node) -> Option<Node> {
    if !root.has_error() {
        return None;
    }
    if root.is_error() || root.is_missing() {
        return Some(root);
    }
    let mut cursor = root.walk();
    let children: Vec<Node> = root.children(&mut cursor).collect();
    children.into_iter().find_map(first_syntax_error)
}

pub fn build_program_model(source: &str) -> Result<ProgramModel> {
    build_program_model_with_filename(source, None)
}

pub fn build_program_model_with_filename(source: &str, filename: Option<&str>) -> Result<ProgramModel> {
    match filename {
        Some(file) => TransformationPipeline::with_filename(source, file.to_string()).transform(),
        None => TransformationPipeline::default(source).transform(),
    }
}
