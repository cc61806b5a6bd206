/*! Transform Anchor program source into an analyzable program model.
 *
 * An Anchor program spreads its security story across account structs, attribute constraints
 * and handler bodies. This crate parses the source with tree-sitter and folds all three into
 * one `ProgramModel`, so every pass reads accounts, CPIs, PDAs and arithmetic the same way.
 */

pub mod anchor_to_model;

pub use anchor_to_model::{
    build_program_model, build_program_model_with_filename, ModelTransformer, TransformError,
    TransformationPipeline,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_parsing() {
        use tree_sitter::{Language, Parser};

        let mut parser = Parser::new();
        let language: Language = tree_sitter_rust::LANGUAGE.into();

        parser
            .set_language(&language)
            .expect("Failed to set language");

        let code = "pub struct Vault {}";
        let tree = parser.parse(code, None).expect("Failed to parse");

        assert_eq!(tree.root_node().kind(), "source_file");
    }

    #[test]
    fn test_basic_transformation() {
        let source = r#"
use anchor_lang::prelude::*;

#[program]
pub mod counter {
    use super::*;

    pub fn increment(ctx: Context<Increment>) -> Result<()> {
        ctx.accounts.counter.count += 1;
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Increment<'info> {
    #[account(mut)]
    pub counter: Account<'info, Counter>,
}

#[account]
pub struct Counter {
    pub count: u64,
}
"#;

        match build_program_model(source) {
            Ok(model) => {
                assert_eq!(model.program_name(), Some("counter"));
                assert_eq!(model.instructions().len(), 1);
                assert_eq!(model.instructions()[0].name, "increment");
            }
            Err(e) => {
                panic!("Transformation failed: {}", e);
            }
        }
    }
}
