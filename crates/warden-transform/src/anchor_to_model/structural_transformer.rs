use super::attributes::{attributes_before, find, Attribute};
use super::context::{line_of, span_of, NodeText, SimpleContext};
use super::expression_scanner::{identifiers, length_bounded, path_segments};
use super::seed_classifier::SeedScope;
use super::type_resolver::TypeResolver;
use super::{ModelTransformer, Result, TransformError};
use indexmap::IndexMap;
use tracing::debug;
use tree_sitter::Node;
use warden_core::model::{
    account_key, AccountDecl, AccountsContext, AttributeSite, BumpConstraint, BumpSource,
    ConstraintEntry, ConstraintSet, CustomConstraint, InitMode, Param, PdaOrigin, PdaSpec,
    StateField, StateLayout,
};
use warden_core::{ProgramModelBuilder, SourceSpan};
use warden_parser::ConstraintAnnotation;

/// Collects accounts contexts, state layouts, events and the program name.
pub struct StructuralTransformer {
    filename: String,
}

impl StructuralTransformer {
    pub fn new() -> Self {
        Self {
            filename: "<unknown>".to_string(),
        }
    }

    pub fn with_filename(filename: String) -> Self {
        Self { filename }
    }

    fn process_items(&mut self, node: Node, source: &str, builder: &mut ProgramModelBuilder) -> Result<()> {
        let ctx = SimpleContext::new(source);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "struct_item" => self.process_struct(child, &ctx, builder)?,
                "mod_item" => {
                    let (attributes, _) = attributes_before(child, &ctx);
                    if find(&attributes, "program").is_some() {
                        if let Some(name) = child.child_by_field_name("name") {
                            builder.set_program_name(ctx.get_node_text(name));
                        }
                    }
                    if let Some(body) = child.child_by_field_name("body") {
                        self.process_items(body, source, builder)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn process_struct(&mut self, node: Node, ctx: &SimpleContext, builder: &mut ProgramModelBuilder) -> Result<()> {
        let (attributes, _) = attributes_before(node, ctx);
        let name = node
            .child_by_field_name("name")
            .map(|n| ctx.get_node_text(n).to_string())
            .ok_or_else(|| TransformError::missing("name", "struct_item"))?;

        if attributes.iter().any(|a| a.derives("Accounts", ctx.source)) {
            debug!(file = %self.filename, context = %name, "accounts context");
            self.process_context(node, name, &attributes, ctx, builder)
        } else if find(&attributes, "account").is_some() {
            let has_init_space = attributes.iter().any(|a| a.derives("InitSpace", ctx.source));
            builder.add_state_layout(StateLayout {
                name,
                fields: state_fields(node, ctx),
                has_init_space,
                span: span_of(node),
            });
            Ok(())
        } else {
            if find(&attributes, "event").is_some() {
                builder.add_event(name);
            }
            Ok(())
        }
    }

    fn process_context(
        &mut self,
        node: Node,
        name: String,
        attributes: &[Attribute],
        ctx: &SimpleContext,
        builder: &mut ProgramModelBuilder,
    ) -> Result<()> {
        let instruction_args = match find(attributes, "instruction") {
            Some(attribute) => instruction_args(attribute, ctx, builder)?,
            None => Vec::new(),
        };

        let mut fields = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            fields = body
                .named_children(&mut cursor)
                .filter(|n| n.kind() == "field_declaration")
                .collect();
        }

        let field_names: Vec<String> = fields
            .iter()
            .filter_map(|f| f.child_by_field_name("name"))
            .map(|n| ctx.get_node_text(n).to_string())
            .collect();

        builder.add_context(AccountsContext {
            name: name.clone(),
            instruction_args: instruction_args.clone(),
            fields: field_names.iter().map(|f| account_key(&name, f)).collect(),
            span: span_of(node),
        })?;

        let account_of = |text: &str| -> Option<String> {
            let root = path_segments(text).first().map(|s| s.to_string())?;
            field_names.contains(&root).then_some(root)
        };
        let scope = SeedScope {
            params: &instruction_args,
            account_of: &account_of,
        };

        for field in fields {
            let decl = self.process_field(field, &name, ctx, &scope, builder)?;
            builder.add_account(decl)?;
        }
        Ok(())
    }

    fn process_field(
        &mut self,
        node: Node,
        context: &str,
        ctx: &SimpleContext,
        scope: &SeedScope,
        builder: &mut ProgramModelBuilder,
    ) -> Result<AccountDecl> {
        let name_node = node
            .child_by_field_name("name")
            .ok_or_else(|| TransformError::missing("name", "field_declaration"))?;
        let type_node = node
            .child_by_field_name("type")
            .ok_or_else(|| TransformError::missing("type", "field_declaration"))?;
        let name = ctx.get_node_text(name_node).to_string();
        let ty = ctx.get_node_text(type_node).to_string();

        let (attributes, has_check_comment) = attributes_before(node, ctx);
        let account_attribute = find(&attributes, "account");

        let (constraints, attribute) = match account_attribute {
            Some(attribute) => {
                let constraints = match attribute.content_range() {
                    Some(range) => {
                        let annotations = warden_parser::parse_constraints(&ctx.source[range.clone()])
                            .map_err(|e| invalid_attribute(builder, range.start + e.offset, e.to_string()))?;
                        constraint_set(&annotations, range.start)
                    }
                    None => ConstraintSet::default(),
                };
                (constraints, attribute_site(attribute))
            }
            None => (ConstraintSet::default(), None),
        };

        if let Some(seeds) = constraints.entry("seeds") {
            let value_span = seeds.value_span.unwrap_or(seeds.span);
            let list = &ctx.source[value_span.range()];
            let components = scope.components(builder.source(), list, value_span.start as usize)?;
            let bump_entry = constraints.entry("bump");
            let bump = match bump_entry.and_then(|e| e.value.as_deref()) {
                None => BumpSource::Rederived,
                Some(v) if v.trim().chars().all(|c| c.is_ascii_digit() || c == '_') => BumpSource::Hardcoded,
                Some(_) => BumpSource::Stored,
            };
            let line = builder.source().line_of(seeds.span);
            builder.add_pda(PdaSpec {
                origin: PdaOrigin::Constraint {
                    account: account_key(context, &name),
                },
                seeds: components,
                bump,
                bump_span: bump_entry.map(|e| e.span),
                init: constraints.initializes(),
                span: seeds.span,
                line,
            });
        }

        Ok(AccountDecl {
            name,
            context: context.to_string(),
            kind: TypeResolver::account_kind(&ty),
            ty,
            constraints,
            layout: None,
            has_check_comment,
            field_span: span_of(node),
            type_span: span_of(type_node),
            attribute,
            line: line_of(node),
        })
    }
}

impl Default for StructuralTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTransformer for StructuralTransformer {
    fn name(&self) -> &str {
        "StructuralTransformer"
    }

    fn transform(&mut self, builder: &mut ProgramModelBuilder, ast: &Node, source: &str) -> Result<()> {
        self.process_items(*ast, source, builder)
    }
}

fn invalid_attribute(builder: &ProgramModelBuilder, at: usize, message: String) -> TransformError {
    let (line, column) = builder.source().to_line_col(at);
    TransformError::InvalidAttribute {
        line,
        column,
        message,
        span: SourceSpan::from_range(at, at),
    }
}

fn attribute_site(attribute: &Attribute) -> Option<AttributeSite> {
    let content = attribute.content_range()?;
    Some(AttributeSite {
        item_span: span_of(attribute.item),
        content_span: SourceSpan::from_range(content.start, content.end),
    })
}

fn instruction_args(
    attribute: &Attribute,
    ctx: &SimpleContext,
    builder: &ProgramModelBuilder,
) -> Result<Vec<Param>> {
    let Some(range) = attribute.content_range() else {
        return Ok(Vec::new());
    };
    let args = warden_parser::parse_instruction_args(&ctx.source[range.clone()])
        .map_err(|e| invalid_attribute(builder, range.start + e.offset, e.to_string()))?;
    Ok(args
        .into_iter()
        .map(|arg| Param {
            class: TypeResolver::param_class(&arg.ty),
            name: arg.name,
            ty: arg.ty,
        })
        .collect())
}

fn state_fields(node: Node, ctx: &SimpleContext) -> IndexMap<String, StateField> {
    let mut fields = IndexMap::new();
    let Some(body) = node.child_by_field_name("body") else {
        return fields;
    };
    let mut cursor = body.walk();
    for field in body.named_children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let (Some(name), Some(ty)) = (field.child_by_field_name("name"), field.child_by_field_name("type")) else {
            continue;
        };
        let name = ctx.get_node_text(name).to_string();
        let ty = ctx.get_node_text(ty).to_string();
        fields.insert(
            name.clone(),
            StateField {
                name,
                size: TypeResolver::semantic_size(&ty),
                ty,
            },
        );
    }
    fields
}

/// Folds parsed `#[account(...)]` entries into a constraint set; `offset` is
/// where the list text starts in the file.
pub fn constraint_set(annotations: &[ConstraintAnnotation], offset: usize) -> ConstraintSet {
    let absolute = |range: &std::ops::Range<usize>| SourceSpan::from_range(offset + range.start, offset + range.end);
    let mut set = ConstraintSet::default();

    for annotation in annotations {
        let entry = ConstraintEntry {
            key: annotation.key.clone(),
            value: annotation.value.clone(),
            span: absolute(&annotation.span),
            value_span: annotation.value_span.as_ref().map(absolute),
        };
        let value = annotation.value.clone();

        match annotation.key.as_str() {
            "mut" => set.mutable = true,
            "init" | "zero" => set.init = InitMode::Init,
            "init_if_needed" => set.init = InitMode::InitIfNeeded,
            "signer" => set.signer = true,
            "seeds" => set.seeds = value,
            "bump" => set.bump = Some(value.map(BumpConstraint::Expr).unwrap_or(BumpConstraint::Canonical)),
            "has_one" => set.has_one.extend(value),
            "close" => set.close = value,
            "owner" => set.owner = value,
            "address" => set.address = value,
            "payer" => set.payer = value,
            "space" => set.space = value,
            "realloc::payer" => set.realloc_payer = value,
            "constraint" => {
                if let Some(expr) = value {
                    set.custom.push(CustomConstraint {
                        subjects: identifiers(&expr),
                        length_bounded: length_bounded(&expr),
                        expr,
                        span: entry.span,
                    });
                }
            }
            _ => {}
        }
        set.entries.push(entry);
    }
    set
}
