use super::attributes::{attributes_before, find};
use super::context::{line_of, span_of, Binding, CpiBinding, NodeText, Scope, SimpleContext};
use super::expression_scanner::{first_identifier, identifiers, is_constant_operand, length_bounded, path_segments};
use super::seed_classifier::SeedScope;
use super::type_resolver::{split_top_level, TypeResolver};
use super::{ModelTransformer, Result, TransformError};
use tracing::{debug, trace};
use tree_sitter::Node;
use warden_core::model::{
    account_key, AccountKind, ArithExpr, ArithKind, ArithMode, ArithOp, BumpSource, CpiCall,
    CpiStyle, CpiTarget, ForwardedAccount, InstructionDecl, Operation, OperationKind, Param,
    PdaOrigin, PdaSpec,
};
use warden_core::{ProgramModelBuilder, SourceSpan};

/// Module prefixes of Anchor CPI helpers that take a `CpiContext` first.
const CPI_MODULES: &[&str] = &[
    "token",
    "token_interface",
    "token_2022",
    "system_program",
    "associated_token",
    "anchor_spl",
];

const MUTATING_METHODS: &[&str] = &[
    "set_inner",
    "close",
    "realloc",
    "assign",
    "try_borrow_mut_data",
    "sub_lamports",
    "add_lamports",
];

/// Account handles that still refer to the account itself.
const VIEW_METHODS: &[&str] = &["to_account_info", "as_mut", "as_ref", "clone", "deref_mut", "to_owned"];

/// Walks `#[program]` handlers into instructions with their operations,
/// CPI edges, body PDA derivations and arithmetic sites.
pub struct InstructionTransformer {
    filename: String,
}

impl InstructionTransformer {
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
            if child.kind() != "mod_item" {
                continue;
            }
            let Some(body) = child.child_by_field_name("body") else {
                continue;
            };
            let (attributes, _) = attributes_before(child, &ctx);
            if find(&attributes, "program").is_none() {
                self.process_items(body, source, builder)?;
                continue;
            }

            let mut functions = body.walk();
            for item in body.named_children(&mut functions) {
                if item.kind() == "function_item" {
                    self.process_handler(item, source, builder)?;
                }
            }
        }
        Ok(())
    }

    fn process_handler(&mut self, node: Node, source: &str, builder: &mut ProgramModelBuilder) -> Result<()> {
        let ctx = SimpleContext::new(source);
        let name = node
            .child_by_field_name("name")
            .map(|n| ctx.get_node_text(n).to_string())
            .ok_or_else(|| TransformError::missing("name", "function_item"))?;
        let parameters = node
            .child_by_field_name("parameters")
            .ok_or_else(|| TransformError::missing("parameters", "function_item"))?;

        let mut context = None;
        let mut params = Vec::new();
        let mut cursor = parameters.walk();
        for parameter in parameters.named_children(&mut cursor) {
            if parameter.kind() != "parameter" {
                continue;
            }
            let (Some(pattern), Some(ty)) = (
                parameter.child_by_field_name("pattern"),
                parameter.child_by_field_name("type"),
            ) else {
                continue;
            };
            let pattern = ctx.get_node_text(pattern);
            let pattern = pattern.strip_prefix("mut ").unwrap_or(pattern).trim().to_string();
            let ty = ctx.get_node_text(ty).to_string();

            match (context.is_none(), TypeResolver::context_name(&ty)) {
                (true, Some(context_name)) => context = Some((pattern, context_name)),
                _ => params.push(Param {
                    class: TypeResolver::param_class(&ty),
                    name: pattern,
                    ty,
                }),
            }
        }

        let Some((ctx_name, context)) = context else {
            debug!(file = %self.filename, function = %name, "skipping function without a Context parameter");
            return Ok(());
        };
        let body = node
            .child_by_field_name("body")
            .ok_or_else(|| TransformError::missing("body", "function_item"))?;

        let fields = builder
            .context(&context)
            .map(|c| {
                c.fields
                    .iter()
                    .filter_map(|key| key.rsplit('.').next())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut walker = HandlerWalker {
            ctx,
            builder: &mut *builder,
            instruction: name.clone(),
            context: context.clone(),
            ctx_name,
            params: params.clone(),
            fields,
            scope: Scope::new(),
            loop_depth: 0,
            folding: false,
            operations: Vec::new(),
        };
        walker.walk_block(body);
        let operations = walker.operations;

        debug!(instruction = %name, context = %context, operations = operations.len(), "handler");
        builder.add_instruction(InstructionDecl {
            name,
            context,
            params,
            accounts: Vec::new(),
            operations,
            span: span_of(node),
            body_start: SourceSpan::insertion(body.start_byte() + 1),
            line: line_of(node),
        })?;
        Ok(())
    }
}

impl Default for InstructionTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTransformer for InstructionTransformer {
    fn name(&self) -> &str {
        "InstructionTransformer"
    }

    fn transform(&mut self, builder: &mut ProgramModelBuilder, ast: &Node, source: &str) -> Result<()> {
        self.process_items(*ast, source, builder)
    }
}

struct HandlerWalker<'a, 's> {
    ctx: SimpleContext<'s>,
    builder: &'a mut ProgramModelBuilder,
    instruction: String,
    context: String,
    ctx_name: String,
    params: Vec<Param>,
    fields: Vec<String>,
    scope: Scope,
    loop_depth: u32,
    /// Inside an unchecked arithmetic site; nested arithmetic is already folded into it.
    folding: bool,
    operations: Vec<Operation>,
}

impl<'s> HandlerWalker<'_, 's> {
    fn text(&self, node: Node) -> &'s str {
        let source: &'s str = self.ctx.source;
        &source[node.byte_range()]
    }

    fn push(&mut self, kind: OperationKind, node: Node) {
        self.operations.push(Operation {
            kind,
            span: span_of(node),
            line: line_of(node),
            loop_depth: self.loop_depth,
        });
    }

    /// Context account an expression reads, through `ctx.accounts.x` or a local alias.
    fn account_of(&self, text: &str) -> Option<String> {
        let segments = path_segments(text);
        let root = *segments.first()?;
        if root == self.ctx_name {
            if segments.get(1) != Some(&"accounts") {
                return None;
            }
            let field = segments.get(2)?;
            return (self.fields.is_empty() || self.fields.iter().any(|f| f == field)).then(|| field.to_string());
        }
        self.scope.account(root).map(str::to_string)
    }

    /// Account an expression refers to as a whole, not one of its fields.
    fn account_handle(&self, text: &str) -> Option<String> {
        let account = self.account_of(text)?;
        let segments = path_segments(text);
        let depth = if segments.first() == Some(&self.ctx_name.as_str()) { 3 } else { 1 };
        segments[depth.min(segments.len())..]
            .iter()
            .all(|s| VIEW_METHODS.contains(s))
            .then_some(account)
    }

    fn enter_scope(&mut self) {
        let parent = std::mem::take(&mut self.scope);
        self.scope = Scope::with_parent(parent);
    }

    fn leave_scope(&mut self) {
        let scope = std::mem::take(&mut self.scope);
        self.scope = scope.into_parent().unwrap_or_default();
    }

    fn walk_block(&mut self, node: Node) {
        self.enter_scope();
        self.walk_children(node);
        self.leave_scope();
    }

    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn walk_nested(&mut self, node: Node) {
        self.loop_depth += 1;
        self.walk(node);
        self.loop_depth -= 1;
    }

    fn walk(&mut self, node: Node) {
        match node.kind() {
            "block" => self.walk_block(node),
            "let_declaration" => self.walk_let(node),
            "compound_assignment_expr" => self.compound_assignment(node),
            "assignment_expression" => self.assignment(node),
            "binary_expression" if arith_kind(node, self.ctx.source).is_some() => {
                if self.folding {
                    self.walk_children(node);
                } else {
                    self.arithmetic_site(node, None);
                }
            }
            "call_expression" => self.call(node),
            "macro_invocation" => self.macro_call(node),
            "if_expression" => self.if_expression(node),
            "for_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk(value);
                }
                self.enter_scope();
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    for ident in identifiers(self.text(pattern)) {
                        self.scope.shadow(&ident);
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_nested(body);
                }
                self.leave_scope();
            }
            "while_expression" => {
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.walk_nested(condition);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_nested(body);
                }
            }
            "loop_expression" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_nested(body);
                }
            }
            "closure_expression" => {
                if let Some(body) = node.child_by_field_name("body") {
                    // A closure body is its own site even inside folded arithmetic.
                    let folding = std::mem::replace(&mut self.folding, false);
                    self.enter_scope();
                    self.walk_nested(body);
                    self.leave_scope();
                    self.folding = folding;
                }
            }
            "function_item" | "struct_item" | "enum_item" | "impl_item" | "use_declaration"
            | "const_item" | "static_item" | "line_comment" | "block_comment" | "attribute_item" => {}
            _ => self.walk_children(node),
        }
    }

    fn walk_let(&mut self, node: Node) {
        let value = node.child_by_field_name("value");
        if let Some(value) = value {
            self.walk(value);
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            self.walk(alternative);
        }

        let Some(pattern) = node.child_by_field_name("pattern") else {
            return;
        };
        let pattern_text = self.text(pattern);
        let name = pattern_text.strip_prefix("mut ").unwrap_or(pattern_text).trim();
        let simple = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !simple {
            for ident in identifiers(pattern_text) {
                self.scope.shadow(&ident);
            }
            return;
        }

        let binding = value.and_then(|v| self.binding_for(v));
        match binding {
            Some(binding) => {
                trace!(local = %name, ?binding, "bound");
                self.scope.insert(name, binding);
            }
            None => self.scope.shadow(name),
        }
    }

    fn binding_for(&self, value: Node) -> Option<Binding> {
        let text = self.text(value);
        if let Some(binding) = self.cpi_context_of(value) {
            return Some(Binding::CpiContext(binding));
        }
        if let Some(account) = self.account_handle(text) {
            return Some(Binding::Account(account));
        }

        match value.kind() {
            "struct_expression" if text.trim_start().starts_with("Instruction") => Some(Binding::Instruction {
                callee: None,
                text: text.to_string(),
            }),
            "struct_expression" => {
                let accounts = self.struct_accounts(value);
                (!accounts.is_empty()).then_some(Binding::Accounts(accounts))
            }
            "call_expression" => {
                let function = value.child_by_field_name("function").map(|f| self.text(f))?;
                (function.contains("instruction::") || function.starts_with("Instruction::")).then(|| {
                    Binding::Instruction {
                        callee: Some(function.to_string()),
                        text: text.to_string(),
                    }
                })
            }
            _ => None,
        }
    }

    fn record_mutation(&mut self, target: Node, statement: Node) {
        let text = self.text(target);
        let lamports = text.contains("lamports");
        let account = self.account_of(text);
        if account.is_none() && !lamports {
            return;
        }
        self.push(
            OperationKind::StateMutation {
                account,
                target: text.to_string(),
                lamports,
            },
            statement,
        );
    }

    fn assignment(&mut self, node: Node) {
        if let Some(right) = node.child_by_field_name("right") {
            self.walk(right);
        }
        if let Some(left) = node.child_by_field_name("left") {
            self.record_mutation(left, node);
        }
    }

    fn compound_assignment(&mut self, node: Node) {
        let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right")) else {
            self.walk_children(node);
            return;
        };
        let operator = node
            .child_by_field_name("operator")
            .map(|op| self.text(op))
            .unwrap_or("");

        match ArithKind::from_operator(operator) {
            Some(op) if !self.folding => {
                let target = self.text(left).to_string();
                let expr = ArithExpr::Binary {
                    op,
                    lhs: Box::new(ArithExpr::Operand {
                        text: target.clone(),
                        span: span_of(left),
                        nested: Vec::new(),
                    }),
                    rhs: Box::new(self.arith_expr(right)),
                    span: span_of(node),
                };
                self.register(node, expr, ArithMode::Unchecked, Some(target));
                self.folding = true;
                self.walk(right);
                self.folding = false;
            }
            _ => self.walk(right),
        }
        self.record_mutation(left, node);
    }

    fn register(&mut self, node: Node, expr: ArithExpr, mode: ArithMode, assign_target: Option<String>) {
        if all_constant(&expr) {
            return;
        }
        self.builder.add_arithmetic(ArithOp {
            instruction: self.instruction.clone(),
            span: span_of(node),
            line: line_of(node),
            mode,
            expr,
            assign_target,
            loop_depth: self.loop_depth,
        });
    }

    fn arithmetic_site(&mut self, node: Node, assign_target: Option<String>) {
        let expr = self.arith_expr(node);
        self.register(node, expr, ArithMode::Unchecked, assign_target);
        self.folding = true;
        self.walk_children(node);
        self.folding = false;
    }

    fn arith_expr(&self, node: Node) -> ArithExpr {
        let source = self.ctx.source;
        if let Some(op) = arith_kind(node, source) {
            if let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right")) {
                return ArithExpr::Binary {
                    op,
                    lhs: Box::new(self.arith_expr(left)),
                    rhs: Box::new(self.arith_expr(right)),
                    span: span_of(node),
                };
            }
        }
        if node.kind() == "parenthesized_expression" {
            if let Some(inner) = node.named_child(0) {
                if is_unchecked_arith(inner, source) {
                    return self.arith_expr(inner);
                }
            }
        }
        if let Some(method) = method_arith(node, source) {
            if !matches!(method.mode, ArithMode::Checked | ArithMode::Saturating) {
                return ArithExpr::Binary {
                    op: method.op,
                    lhs: Box::new(self.arith_expr(method.receiver)),
                    rhs: Box::new(self.arith_expr(method.argument)),
                    span: span_of(node),
                };
            }
        }
        ArithExpr::Operand {
            text: self.text(node).to_string(),
            span: span_of(node),
            nested: self.nested_sites(node),
        }
    }

    /// Outermost unchecked arithmetic below `node`.
    fn nested_sites(&self, node: Node) -> Vec<ArithExpr> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "closure_expression" {
                continue;
            }
            if is_unchecked_arith(child, self.ctx.source) {
                out.push(self.arith_expr(child));
            } else {
                out.extend(self.nested_sites(child));
            }
        }
        out
    }

    fn call(&mut self, node: Node) {
        let source = self.ctx.source;
        let function_text = node
            .child_by_field_name("function")
            .map(|f| self.text(f))
            .unwrap_or("");

        if let Some(method) = method_arith(node, source) {
            if self.folding {
                self.walk_children(node);
                return;
            }
            match method.mode {
                ArithMode::Checked | ArithMode::Saturating => {
                    let expr = ArithExpr::Binary {
                        op: method.op,
                        lhs: Box::new(self.plain_operand(method.receiver)),
                        rhs: Box::new(self.plain_operand(method.argument)),
                        span: span_of(node),
                    };
                    self.register(node, expr, method.mode, None);
                    self.walk_children(node);
                }
                _ => self.arithmetic_site(node, None),
            }
            return;
        }

        let last = function_text.rsplit("::").next().unwrap_or(function_text).trim();
        match last {
            "find_program_address" | "create_program_address" => {
                self.walk_arguments(node);
                self.pda_derivation(node, last == "create_program_address");
                return;
            }
            "invoke" | "invoke_signed" => {
                self.walk_arguments(node);
                self.invoke(node, last == "invoke_signed");
                return;
            }
            _ => {}
        }

        if let Some(arguments) = node.child_by_field_name("arguments") {
            let binding = self.cpi_argument(arguments);
            let via_helper = binding.is_none() && self.is_cpi_helper(function_text, arguments);
            if binding.is_some() || via_helper {
                self.walk_arguments(node);
                let binding = binding.unwrap_or_else(|| CpiBinding {
                    program_expr: arguments.named_child(0).map(|a| self.text(a).to_string()).unwrap_or_default(),
                    ..Default::default()
                });
                self.context_cpi(node, function_text, binding);
                return;
            }
        }

        if let Some(function) = node.child_by_field_name("function") {
            if function.kind() == "field_expression" {
                let method = function.child_by_field_name("field").map(|f| self.text(f)).unwrap_or("");
                if MUTATING_METHODS.contains(&method) {
                    self.walk_children(node);
                    if let Some(receiver) = function.child_by_field_name("value") {
                        let receiver_text = self.text(receiver);
                        let lamports = method.ends_with("_lamports");
                        if let Some(account) = self.account_of(receiver_text) {
                            self.push(
                                OperationKind::StateMutation {
                                    account: Some(account),
                                    target: receiver_text.to_string(),
                                    lamports,
                                },
                                node,
                            );
                        }
                    }
                    return;
                }
            }
        }

        self.walk_children(node);
    }

    fn plain_operand(&self, node: Node) -> ArithExpr {
        ArithExpr::Operand {
            text: self.text(node).to_string(),
            span: span_of(node),
            nested: Vec::new(),
        }
    }

    fn walk_arguments(&mut self, node: Node) {
        if let Some(arguments) = node.child_by_field_name("arguments") {
            self.walk_children(arguments);
        }
    }

    fn arguments(node: Node) -> Vec<Node> {
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut cursor = arguments.walk();
        arguments
            .named_children(&mut cursor)
            .filter(|n| !n.kind().ends_with("comment"))
            .collect()
    }

    /// `CpiContext::new(...)`, `.with_signer(...)` on one, or a local bound to one.
    fn cpi_context_of(&self, node: Node) -> Option<CpiBinding> {
        match node.kind() {
            "identifier" => match self.scope.lookup(self.text(node))? {
                Binding::CpiContext(binding) => Some(binding.clone()),
                _ => None,
            },
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                let function_text = self.text(function);
                if function_text.ends_with("CpiContext::new") || function_text.ends_with("CpiContext::new_with_signer") {
                    return Some(self.cpi_binding(node, function_text.ends_with("new_with_signer")));
                }
                if function.kind() == "field_expression"
                    && function.child_by_field_name("field").map(|f| self.text(f)) == Some("with_signer")
                {
                    let mut binding = self.cpi_context_of(function.child_by_field_name("value")?)?;
                    let seeds = Self::arguments(node).first().map(|s| self.text(*s).to_string());
                    binding.signer_seeds = seeds.map(|s| vec![s]);
                    return Some(binding);
                }
                None
            }
            _ => None,
        }
    }

    fn cpi_argument(&self, arguments: Node) -> Option<CpiBinding> {
        let mut cursor = arguments.walk();
        let children: Vec<Node> = arguments.named_children(&mut cursor).collect();
        children.into_iter().find_map(|arg| self.cpi_context_of(arg))
    }

    /// `token::transfer(ctx.accounts.transfer_context(), amount)` style helpers.
    fn is_cpi_helper(&self, function_text: &str, arguments: Node) -> bool {
        let mut segments = function_text.split("::");
        let head = segments.next().unwrap_or("");
        if segments.next().is_none() || !CPI_MODULES.contains(&head) {
            return false;
        }
        arguments
            .named_child(0)
            .map(|first| self.text(first).contains(&format!("{}.", self.ctx_name)))
            .unwrap_or(false)
    }

    fn cpi_binding(&self, call: Node, signed: bool) -> CpiBinding {
        let args = Self::arguments(call);
        let program_expr = args.first().map(|a| self.text(*a).to_string()).unwrap_or_default();
        let program = self.account_of(&program_expr);

        let forwarded = match args.get(1) {
            Some(accounts) if accounts.kind() == "identifier" => match self.scope.lookup(self.text(*accounts)) {
                Some(Binding::Accounts(names)) => names.clone(),
                _ => Vec::new(),
            },
            Some(accounts) => self.struct_accounts(*accounts),
            None => Vec::new(),
        };

        let signer_seeds = if signed {
            args.get(2).map(|s| vec![self.text(*s).to_string()])
        } else {
            None
        };

        CpiBinding {
            program,
            program_expr,
            forwarded,
            signer_seeds,
        }
    }

    /// Context accounts named by the fields of a struct literal.
    fn struct_accounts(&self, node: Node) -> Vec<String> {
        let mut out = Vec::new();
        let Some(body) = node.child_by_field_name("body") else {
            return out;
        };
        let mut cursor = body.walk();
        for field in body.named_children(&mut cursor) {
            let value = match field.kind() {
                "field_initializer" => field.child_by_field_name("value"),
                "shorthand_field_initializer" => field.named_child(0),
                _ => None,
            };
            if let Some(account) = value.and_then(|v| self.account_of(self.text(v))) {
                if !out.contains(&account) {
                    out.push(account);
                }
            }
        }
        out
    }

    fn target_for(&self, account: Option<String>, expr: String) -> CpiTarget {
        let key = account.as_deref().map(|a| account_key(&self.context, a));
        match key.as_deref().and_then(|k| self.builder.account(k)).map(|d| &d.kind) {
            Some(AccountKind::Program { inner }) => CpiTarget::Typed {
                account: account.unwrap_or_default(),
                program: inner.clone(),
            },
            _ => CpiTarget::Unverified { account, expr },
        }
    }

    fn context_cpi(&mut self, node: Node, callee: &str, binding: CpiBinding) {
        let target = self.target_for(binding.program.clone(), binding.program_expr.clone());
        let call = CpiCall {
            instruction: self.instruction.clone(),
            callee: callee.to_string(),
            style: CpiStyle::CpiContext,
            target,
            forwarded: forwarded(&binding.forwarded),
            signer_seeds: binding.signer_seeds,
            op_index: 0,
            mutations_before: 0,
            mutations_after: 0,
            span: span_of(node),
            line: line_of(node),
        };
        let edge = self.builder.add_cpi(call);
        self.push(OperationKind::CpiCall { edge }, node);
    }

    fn invoke(&mut self, node: Node, signed: bool) {
        let args = Self::arguments(node);
        let Some(instruction_arg) = args.first() else {
            return;
        };
        let ix_text = self.text(*instruction_arg).trim_start_matches('&').trim();

        let (callee, built) = match self.scope.lookup(ix_text) {
            Some(Binding::Instruction { callee, text }) => (callee.clone(), text.clone()),
            _ => {
                let callee = ix_text
                    .split('(')
                    .next()
                    .filter(|head| ix_text.contains('(') && !head.contains(' '))
                    .map(str::to_string);
                (callee, ix_text.to_string())
            }
        };

        let mut accounts = Vec::new();
        for item in args.get(1).map(|infos| array_items(*infos)).unwrap_or_default() {
            if let Some(account) = self.account_of(self.text(item)) {
                if !accounts.contains(&account) {
                    accounts.push(account);
                }
            }
        }

        let program = self
            .program_id_account(&built)
            .or_else(|| accounts.iter().find(|a| self.is_program_account(a)).cloned());

        let call = CpiCall {
            instruction: self.instruction.clone(),
            callee: callee.unwrap_or_else(|| if signed { "invoke_signed" } else { "invoke" }.to_string()),
            style: if signed { CpiStyle::InvokeSigned } else { CpiStyle::Invoke },
            target: self.target_for(program, built),
            forwarded: forwarded(&accounts),
            signer_seeds: if signed {
                args.get(2).map(|s| vec![self.text(*s).to_string()])
            } else {
                None
            },
            op_index: 0,
            mutations_before: 0,
            mutations_after: 0,
            span: span_of(node),
            line: line_of(node),
        };
        let edge = self.builder.add_cpi(call);
        self.push(OperationKind::CpiCall { edge }, node);
    }

    /// Account passed as `program_id` of a built instruction, or as the first builder argument.
    fn program_id_account(&self, built: &str) -> Option<String> {
        if let Some(pos) = built.find("program_id") {
            let rest = built[pos + "program_id".len()..].trim_start().strip_prefix(':')?;
            let value = split_top_level(rest.trim_end_matches('}')).first().copied()?;
            return self.account_of(value);
        }
        let open = built.find('(')?;
        let close = built.rfind(')')?;
        let first = split_top_level(built.get(open + 1..close)?).first().copied()?;
        self.account_of(first).filter(|a| self.is_program_account(a))
    }

    fn is_program_account(&self, name: &str) -> bool {
        self.builder
            .account(&account_key(&self.context, name))
            .map(|d| d.is_program())
            .unwrap_or_else(|| name.ends_with("_program"))
    }

    fn pda_derivation(&mut self, node: Node, create: bool) {
        let args = Self::arguments(node);
        let Some(seeds_arg) = args.first() else {
            return;
        };
        let list = self.text(*seeds_arg);
        let offset = seeds_arg.start_byte();

        let account_of = |text: &str| self.account_of(text);
        let scope = SeedScope {
            params: &self.params,
            account_of: &account_of,
        };
        let mut seeds = match scope.components(self.builder.source(), list, offset) {
            Ok(seeds) => seeds,
            Err(e) => {
                debug!(instruction = %self.instruction, error = %e, "seed list not literal");
                Vec::new()
            }
        };

        let bump = if create {
            match seeds.last() {
                Some(last) if last.text.trim_start_matches('&').starts_with('[') => {
                    let inner = last.text.trim_start_matches('&').trim_matches(|c| c == '[' || c == ']');
                    let hardcoded = inner.trim().chars().all(|c| c.is_ascii_digit() || c == '_') && !inner.trim().is_empty();
                    seeds.pop();
                    if hardcoded {
                        BumpSource::Hardcoded
                    } else {
                        BumpSource::Stored
                    }
                }
                _ => BumpSource::Stored,
            }
        } else {
            BumpSource::Rederived
        };

        let pda = self.builder.add_pda(PdaSpec {
            origin: PdaOrigin::Derivation {
                instruction: self.instruction.clone(),
            },
            seeds,
            bump,
            bump_span: None,
            init: false,
            span: span_of(node),
            line: line_of(node),
        });
        self.push(OperationKind::PdaDerivation { pda }, node);
    }

    fn macro_call(&mut self, node: Node) {
        let name = node
            .child_by_field_name("macro")
            .map(|m| self.text(m))
            .unwrap_or("");
        let name = name.rsplit("::").next().unwrap_or(name);
        let mut cursor = node.walk();
        let content = node
            .named_children(&mut cursor)
            .find(|n| n.kind() == "token_tree")
            .map(|tt| {
                let text = self.text(tt);
                text.get(1..text.len().saturating_sub(1)).unwrap_or("")
            })
            .unwrap_or("");

        match name {
            "emit" | "emit_cpi" => {
                if let Some(event) = first_identifier(content) {
                    self.push(OperationKind::Emit { event }, node);
                }
            }
            "msg" | "sol_log" => self.push(OperationKind::Log, node),
            _ if name.starts_with("require") || name.starts_with("assert") => self.push(
                OperationKind::ValidationCheck {
                    check: self.text(node).to_string(),
                    subjects: identifiers(content),
                    length_bounded: length_bounded(content),
                },
                node,
            ),
            _ => {}
        }
    }

    fn if_expression(&mut self, node: Node) {
        let condition = node.child_by_field_name("condition");
        if let Some(condition) = condition {
            self.walk(condition);
        }
        if let (Some(condition), Some(consequence)) = (condition, node.child_by_field_name("consequence")) {
            let body = self.text(consequence);
            let rejects = body.contains("return Err") || body.contains("err!(") || body.contains("error!(")
                || body.contains("panic!(");
            if rejects {
                let check = self.text(condition);
                self.push(
                    OperationKind::ValidationCheck {
                        check: check.to_string(),
                        subjects: identifiers(check),
                        length_bounded: length_bounded(check),
                    },
                    condition,
                );
            }
            self.walk(consequence);
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            self.walk(alternative);
        }
    }
}

struct MethodArith<'t> {
    op: ArithKind,
    mode: ArithMode,
    receiver: Node<'t>,
    argument: Node<'t>,
}

fn arith_kind(node: Node, source: &str) -> Option<ArithKind> {
    if node.kind() != "binary_expression" {
        return None;
    }
    let operator = node.child_by_field_name("operator")?;
    let op = &source[operator.byte_range()];
    if op.len() != 1 {
        return None;
    }
    ArithKind::from_operator(op)
}

/// `a.checked_add(b)`, `a.wrapping_mul(b)`, `a.pow(n)` and friends.
fn method_arith<'t>(node: Node<'t>, source: &str) -> Option<MethodArith<'t>> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    if function.kind() != "field_expression" {
        return None;
    }
    let method = &source[function.child_by_field_name("field")?.byte_range()];
    let (mode, op) = if method == "pow" {
        (ArithMode::Unchecked, "pow")
    } else if let Some(op) = method.strip_prefix("checked_") {
        (ArithMode::Checked, op)
    } else if let Some(op) = method.strip_prefix("saturating_") {
        (ArithMode::Saturating, op)
    } else if let Some(op) = method.strip_prefix("wrapping_") {
        (ArithMode::Wrapping, op)
    } else {
        return None;
    };
    let op = match op {
        "add" => ArithKind::Add,
        "sub" => ArithKind::Sub,
        "mul" => ArithKind::Mul,
        "div" => ArithKind::Div,
        "rem" => ArithKind::Rem,
        "pow" => ArithKind::Pow,
        _ => return None,
    };
    let arguments = node.child_by_field_name("arguments")?;
    Some(MethodArith {
        op,
        mode,
        receiver: function.child_by_field_name("value")?,
        argument: arguments.named_child(0)?,
    })
}

fn is_unchecked_arith(node: Node, source: &str) -> bool {
    arith_kind(node, source).is_some()
        || method_arith(node, source)
            .map(|m| !matches!(m.mode, ArithMode::Checked | ArithMode::Saturating))
            .unwrap_or(false)
        || (node.kind() == "parenthesized_expression"
            && node.named_child(0).map(|inner| is_unchecked_arith(inner, source)).unwrap_or(false))
}

fn all_constant(expr: &ArithExpr) -> bool {
    match expr {
        ArithExpr::Operand { text, .. } => is_constant_operand(text),
        ArithExpr::Binary { lhs, rhs, .. } => all_constant(lhs) && all_constant(rhs),
    }
}

/// Elements of `&[a, b]` or `[a, b]`; any other expression is a single item.
fn array_items(node: Node) -> Vec<Node> {
    match node.kind() {
        "array_expression" => {
            let mut cursor = node.walk();
            node.named_children(&mut cursor).collect()
        }
        "reference_expression" => node
            .child_by_field_name("value")
            .map(array_items)
            .unwrap_or_default(),
        _ => vec![node],
    }
}

fn forwarded(accounts: &[String]) -> Vec<ForwardedAccount> {
    accounts
        .iter()
        .map(|name| ForwardedAccount {
            name: name.clone(),
            writable: false,
            signer: false,
        })
        .collect()
}
