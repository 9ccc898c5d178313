//! Builds an [`IrGraph`] from a tree-sitter Python concrete syntax tree.
//!
//! Mirrors a classic recursive-descent AST lowering pass: one entry point
//! per statement/expression shape, a scope stack, and a symbol table keyed
//! by `(scope_id, name)`. Anything the grammar produces that we don't
//! recognize degrades to a `Literal` node tagged `unsupported` rather than
//! failing the whole file — callers still get a usable (if partial) graph.

use std::collections::HashMap;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tree_sitter::{Node, Tree};

use super::embedded_lang::detect_embedded_language;
use crate::config::PipelineOptions;
use crate::shared::models::{
    push_unique_tag, EdgeType, IdAllocator, IrEdge, IrGraph, IrNode, NodeKind, Span, Symbol,
    SymbolKind, Value, MODULE_SCOPE,
};

struct LoopContext {
    continue_target: String,
    break_target: String,
    guard_id: Option<String>,
}

/// Lowers one Python source file into an [`IrGraph`].
///
/// Constructed fresh per file; not reused across files (scope/symbol state
/// is file-local).
pub struct IrBuilder<'a> {
    source: &'a str,
    file_path: String,
    graph: IrGraph,
    ids: IdAllocator,
    scope_index: u64,
    scope_stack: Vec<String>,
    last_stmt_by_scope: HashMap<String, String>,
    last_stmt_by_block: HashMap<String, String>,
    symbols: IndexMap<(String, String), Symbol>,
    loop_stack: Vec<LoopContext>,
    options: &'a PipelineOptions,
}

impl<'a> IrBuilder<'a> {
    pub fn new(source: &'a str, file_path: &str, options: &'a PipelineOptions) -> Self {
        Self {
            source,
            file_path: file_path.to_string(),
            graph: IrGraph::new(),
            ids: IdAllocator::default(),
            scope_index: 0,
            scope_stack: vec![MODULE_SCOPE.to_string()],
            last_stmt_by_scope: HashMap::new(),
            last_stmt_by_block: HashMap::new(),
            symbols: IndexMap::new(),
            loop_stack: Vec::new(),
            options,
        }
    }

    /// Consumes a parsed tree and produces the final graph.
    pub fn build(mut self, tree: &Tree) -> IrGraph {
        let root = tree.root_node();
        self.visit_module(root);
        self.finalize_symbols();
        self.graph
    }

    fn finalize_symbols(&mut self) {
        self.graph.symbols = self.symbols.drain(..).map(|(_, sym)| sym).collect();
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn span(&self, node: Node) -> Span {
        let start = node.start_position();
        let end = node.end_position();
        Span::new(
            self.file_path.clone(),
            start.row as i64 + 1,
            start.column as i64,
            end.row as i64 + 1,
            end.column as i64,
        )
    }

    fn current_scope(&self) -> String {
        self.scope_stack.last().cloned().unwrap_or_else(|| MODULE_SCOPE.to_string())
    }

    fn new_scope_id(&mut self, label: &str) -> String {
        self.scope_index += 1;
        format!("{}:{}:{}", self.current_scope(), label, self.scope_index)
    }

    fn add_node(
        &mut self,
        kind: NodeKind,
        node: Node,
        parent_id: Option<String>,
        scope_id: String,
        attrs: std::collections::BTreeMap<String, Value>,
    ) -> String {
        let span = self.span(node);
        let id = self.ids.next_id(kind, &self.file_path, span.start_line, span.start_col);
        let mut ir_node = IrNode::new(id.clone(), kind, span, parent_id, scope_id);
        ir_node.attrs = attrs;
        self.graph.add_node(ir_node);
        id
    }

    fn set_attr(&mut self, node_id: &str, key: &str, value: Value) {
        if let Some(node) = self.graph.node_mut(node_id) {
            node.set(key, value);
        }
    }

    fn edge(&mut self, from_id: &str, to_id: &str, edge_type: EdgeType, guard_id: Option<String>) {
        let edge = IrEdge::new(from_id.to_string(), to_id.to_string(), edge_type, guard_id);
        self.graph.add_edge(edge);
    }

    fn record_scope_flow(&mut self, stmt_id: &str) {
        let scope = self.current_scope();
        if let Some(prev) = self.last_stmt_by_scope.get(&scope).cloned() {
            self.edge(&prev, stmt_id, EdgeType::Flow, None);
        }
        self.last_stmt_by_scope.insert(scope, stmt_id.to_string());
    }

    fn record_block_flow(&mut self, block_id: &str, stmt_id: &str) {
        if let Some(prev) = self.last_stmt_by_block.get(block_id).cloned() {
            self.edge(&prev, stmt_id, EdgeType::Flow, None);
        }
        self.last_stmt_by_block.insert(block_id.to_string(), stmt_id.to_string());
    }

    fn symbol_mut(&mut self, name: &str, kind: SymbolKind, scope_id: &str) -> &mut Symbol {
        self.symbols
            .entry((scope_id.to_string(), name.to_string()))
            .or_insert_with(|| Symbol::new(name.to_string(), kind, scope_id.to_string()))
    }

    fn add_symbol_def(&mut self, name: &str, kind: SymbolKind, scope_id: &str, node_id: &str) {
        self.symbol_mut(name, kind, scope_id).defs.push(node_id.to_string());
    }

    fn add_symbol_use(&mut self, name: &str, kind: SymbolKind, scope_id: &str, node_id: &str) {
        self.symbol_mut(name, kind, scope_id).uses.push(node_id.to_string());
    }

    // ---- statements -------------------------------------------------

    fn visit_module(&mut self, node: Node) -> String {
        let scope = self.current_scope();
        let module_id = self.add_node(NodeKind::Module, node, None, scope, Default::default());
        let body_ids = self.visit_statement_seq(named_children(node), &module_id);
        self.set_attr(&module_id, "body_ids", Value::List(body_ids.into_iter().map(Value::Str).collect()));
        module_id
    }

    /// Lowers a module/function/class body. The leading statement of such a
    /// body is the only place a Python docstring can appear, so that's the
    /// only spot `strip_docstrings` needs to check.
    fn visit_statement_seq(&mut self, mut nodes: Vec<Node<'a>>, parent_id: &str) -> Vec<String> {
        if self.options.strip_comments {
            nodes.retain(|n| n.kind() != "comment");
        }
        if self.options.strip_docstrings {
            if let Some(first) = nodes.first() {
                if is_docstring_statement(*first) {
                    nodes.remove(0);
                }
            }
        }

        let mut ids = Vec::new();
        for stmt in nodes {
            if let Some(id) = self.visit_statement(stmt, parent_id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Lowers a `block` node's statements under a synthetic Block IR node,
    /// chaining flow edges within it. Used for all compound-statement bodies.
    /// `anchor` supplies a span when `block_node` is absent (e.g. a loop with
    /// no `else` clause still needs an exit block with *some* location).
    fn visit_block(&mut self, block_node: Option<Node<'a>>, anchor: Node<'a>, parent_id: &str, label: &str) -> String {
        let block_id = self.add_node(
            NodeKind::Block,
            block_node.unwrap_or(anchor),
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("label", Value::from(label)), ("owner_id", Value::from(parent_id))]),
        );
        let mut stmt_ids = Vec::new();
        if let Some(block_node) = block_node {
            for stmt in named_children(block_node) {
                if let Some(stmt_id) = self.visit_statement(stmt, &block_id) {
                    self.record_block_flow(&block_id, &stmt_id);
                    stmt_ids.push(stmt_id);
                }
            }
        }
        self.set_attr(&block_id, "stmt_ids", Value::List(stmt_ids.into_iter().map(Value::Str).collect()));
        block_id
    }

    fn visit_statement(&mut self, node: Node<'a>, parent_id: &str) -> Option<String> {
        match node.kind() {
            "function_definition" => Some(self.visit_function(node, parent_id)),
            "class_definition" => Some(self.visit_class(node, parent_id)),
            "decorated_definition" => {
                let inner = node.child_by_field_name("definition")?;
                self.visit_statement(inner, parent_id)
            }
            "if_statement" => Some(self.visit_if(node, parent_id)),
            "while_statement" => Some(self.visit_while(node, parent_id)),
            "for_statement" => Some(self.visit_for(node, parent_id)),
            "try_statement" => Some(self.visit_try(node, parent_id)),
            "with_statement" => Some(self.visit_with(node, parent_id)),
            "match_statement" => Some(self.visit_match(node, parent_id)),
            "return_statement" => Some(self.visit_return(node, parent_id)),
            "raise_statement" => Some(self.visit_raise(node, parent_id)),
            "break_statement" => Some(self.visit_break(node, parent_id)),
            "continue_statement" => Some(self.visit_continue(node, parent_id)),
            "assert_statement" => Some(self.visit_assert(node, parent_id)),
            "delete_statement" | "del_statement" => Some(self.visit_delete(node, parent_id)),
            "global_statement" => {
                for id_node in named_children(node) {
                    let name = self.text(id_node).to_string();
                    self.symbol_mut(&name, SymbolKind::Var, MODULE_SCOPE).is_global = true;
                }
                None
            }
            "nonlocal_statement" => {
                let scope = self.current_scope();
                for id_node in named_children(node) {
                    let name = self.text(id_node).to_string();
                    self.symbol_mut(&name, SymbolKind::Var, &scope).is_nonlocal = true;
                }
                None
            }
            "import_statement" => Some(self.visit_import(node, parent_id)),
            "import_from_statement" => Some(self.visit_import_from(node, parent_id)),
            "expression_statement" => self.visit_expression_statement(node, parent_id),
            "pass_statement" => None,
            _ => None,
        }
    }

    fn visit_expression_statement(&mut self, node: Node<'a>, parent_id: &str) -> Option<String> {
        let inner = node.named_child(0)?;
        match inner.kind() {
            "assignment" => Some(self.visit_assignment(inner, parent_id)),
            "augmented_assignment" => Some(self.visit_aug_assignment(inner, parent_id)),
            _ => {
                let expr_id = self.visit_expr(inner, parent_id)?;
                self.record_scope_flow(&expr_id);
                Some(expr_id)
            }
        }
    }

    fn visit_function(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| self.text(n).to_string()).unwrap_or_default();
        let scope_id = format!("scope:{name}");
        let is_async = first_child_is_keyword(node, "async");

        let params = node
            .child_by_field_name("parameters")
            .map(|p| param_names(p, self))
            .unwrap_or_default();

        let func_id = self.add_node(
            NodeKind::Function,
            node,
            Some(parent_id.to_string()),
            scope_id.clone(),
            attrs(&[
                ("name", Value::from(name.as_str())),
                ("params", Value::List(params.iter().cloned().map(Value::Str).collect())),
                ("is_async", Value::Bool(is_async)),
            ]),
        );

        self.scope_stack.push(scope_id.clone());
        for param in &params {
            self.add_symbol_def(param, SymbolKind::Param, &scope_id, &func_id);
        }
        let body_ids = match node.child_by_field_name("body") {
            Some(body) => self.visit_statement_seq(named_children(body), &func_id),
            None => Vec::new(),
        };
        self.scope_stack.pop();
        self.set_attr(&func_id, "body_ids", Value::List(body_ids.into_iter().map(Value::Str).collect()));
        self.record_scope_flow(&func_id);
        func_id
    }

    fn visit_class(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| self.text(n).to_string()).unwrap_or_default();
        let scope_id = format!("scope:{name}");

        let bases = node
            .child_by_field_name("superclasses")
            .map(|n| named_children(n).into_iter().map(|c| self.text(c).to_string()).collect())
            .unwrap_or_else(Vec::new);

        let class_id = self.add_node(
            NodeKind::Class,
            node,
            Some(parent_id.to_string()),
            scope_id.clone(),
            attrs(&[
                ("name", Value::from(name.as_str())),
                ("bases", Value::List(bases.into_iter().map(Value::Str).collect())),
            ]),
        );
        let defining_scope = self.current_scope();
        self.add_symbol_def(&name, SymbolKind::Class, &defining_scope, &class_id);

        self.scope_stack.push(scope_id.clone());
        let body_ids = match node.child_by_field_name("body") {
            Some(body) => self.visit_statement_seq(named_children(body), &class_id),
            None => Vec::new(),
        };
        self.scope_stack.pop();
        self.set_attr(&class_id, "body_ids", Value::List(body_ids.into_iter().map(Value::Str).collect()));
        self.record_scope_flow(&class_id);
        class_id
    }

    /// `if`/`elif`/`else` lowers to a chain of nested `If` IR nodes, one per
    /// condition — an `elif` becomes the sole statement of its parent's
    /// `orelse` block, exactly like Python's own `ast.If.orelse` nesting.
    fn visit_if(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut cursor = node.walk();
        let alternatives: Vec<Node<'a>> = node.children_by_field_name("alternative", &mut cursor).collect();
        self.build_if_chain(
            node,
            node.child_by_field_name("condition"),
            node.child_by_field_name("consequence"),
            &alternatives,
            parent_id,
        )
    }

    fn build_if_chain(
        &mut self,
        span_node: Node<'a>,
        condition: Option<Node<'a>>,
        consequence: Option<Node<'a>>,
        rest: &[Node<'a>],
        parent_id: &str,
    ) -> String {
        let test_id = condition.and_then(|c| self.visit_expr(c, parent_id));
        let if_id = self.add_node(
            NodeKind::If,
            span_node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("test_id", opt_value(&test_id))]),
        );

        let body_block = self.visit_block(consequence, span_node, &if_id, "body");
        self.edge(&if_id, &body_block, EdgeType::True, test_id.clone());

        if let Some((first, remaining)) = rest.split_first() {
            match first.kind() {
                "elif_clause" => {
                    let nested_id = self.build_if_chain(
                        *first,
                        first.child_by_field_name("condition"),
                        first.child_by_field_name("consequence"),
                        remaining,
                        &if_id,
                    );
                    self.edge(&if_id, &nested_id, EdgeType::False, test_id.clone());
                }
                "else_clause" => {
                    let else_block = self.visit_block(first.child_by_field_name("body"), *first, &if_id, "orelse");
                    self.edge(&if_id, &else_block, EdgeType::False, test_id.clone());
                }
                _ => {}
            }
        }

        self.record_scope_flow(&if_id);
        if_id
    }

    fn visit_while(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let test_id = node
            .child_by_field_name("condition")
            .and_then(|c| self.visit_expr(c, parent_id));
        let while_id = self.add_node(
            NodeKind::While,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("test_id", opt_value(&test_id))]),
        );

        let exit_block = self.visit_block(else_body(node), node, &while_id, "exit");
        self.loop_stack.push(LoopContext {
            continue_target: while_id.clone(),
            break_target: exit_block.clone(),
            guard_id: test_id.clone(),
        });
        let body_block = self.visit_block(node.child_by_field_name("body"), node, &while_id, "body");
        self.loop_stack.pop();

        self.edge(&while_id, &body_block, EdgeType::True, test_id.clone());
        self.edge(&while_id, &exit_block, EdgeType::False, test_id.clone());
        self.edge(&body_block, &while_id, EdgeType::Flow, test_id);
        self.record_scope_flow(&while_id);
        while_id
    }

    fn visit_for(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let iter_id = node
            .child_by_field_name("right")
            .and_then(|c| self.visit_expr(c, parent_id));
        let target_id = node
            .child_by_field_name("left")
            .and_then(|c| self.visit_expr(c, parent_id));
        let is_async = first_child_is_keyword(node, "async");

        let for_id = self.add_node(
            NodeKind::For,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("target_id", opt_value(&target_id)),
                ("iter_id", opt_value(&iter_id)),
                ("is_async", Value::Bool(is_async)),
            ]),
        );

        if let Some(left) = node.child_by_field_name("left") {
            if let Some(name) = extract_target_name(left, self) {
                self.add_symbol_def(&name, SymbolKind::Var, &self.current_scope(), &for_id);
            }
        }

        let exit_block = self.visit_block(else_body(node), node, &for_id, "exit");
        self.loop_stack.push(LoopContext {
            continue_target: for_id.clone(),
            break_target: exit_block.clone(),
            guard_id: iter_id.clone(),
        });
        let body_block = self.visit_block(node.child_by_field_name("body"), node, &for_id, "body");
        self.loop_stack.pop();

        self.edge(&for_id, &body_block, EdgeType::True, iter_id.clone());
        self.edge(&for_id, &exit_block, EdgeType::False, iter_id.clone());
        self.edge(&body_block, &for_id, EdgeType::Flow, iter_id);
        self.record_scope_flow(&for_id);
        for_id
    }

    fn visit_try(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let try_id = self.add_node(
            NodeKind::Try,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            Default::default(),
        );

        let body_block = self.visit_block(node.child_by_field_name("body"), node, &try_id, "body");
        self.edge(&try_id, &body_block, EdgeType::Flow, None);

        let mut handler_blocks = Vec::new();
        let mut else_block = None;
        let mut finally_block = None;

        let mut cursor = node.walk();
        let clauses: Vec<Node<'a>> = node.children(&mut cursor).collect();
        for child in clauses {
            match child.kind() {
                "except_clause" | "except_group_clause" => {
                    let body = find_child_kind(child, "block");
                    let handler_block = self.visit_block(body, child, &try_id, "handler");
                    self.edge(&try_id, &handler_block, EdgeType::Exception, Some(try_id.clone()));
                    handler_blocks.push(handler_block);
                }
                "else_clause" => {
                    let body = child.child_by_field_name("body").or_else(|| find_child_kind(child, "block"));
                    else_block = Some(self.visit_block(body, child, &try_id, "orelse"));
                }
                "finally_clause" => {
                    let body = find_child_kind(child, "block");
                    finally_block = Some(self.visit_block(body, child, &try_id, "finally"));
                }
                _ => {}
            }
        }

        if let Some(finally_block) = &finally_block {
            self.edge(&body_block, finally_block, EdgeType::Flow, None);
            for handler in &handler_blocks {
                self.edge(handler, finally_block, EdgeType::Flow, None);
            }
        }
        if let Some(else_block) = &else_block {
            self.edge(&body_block, else_block, EdgeType::Flow, None);
        }

        self.record_scope_flow(&try_id);
        try_id
    }

    fn visit_with(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut items = Vec::new();
        let mut optional_var_names = Vec::new();

        if let Some(clause) = find_child_kind(node, "with_clause") {
            for item in clause.children(&mut clause.walk()) {
                if item.kind() != "with_item" {
                    continue;
                }
                let value = item.child_by_field_name("value");
                let context_expr_id = value.and_then(|v| self.visit_expr(v, parent_id));
                let alias = find_child_kind(item, "as_pattern_target")
                    .or_else(|| item.child_by_field_name("alias"));
                let optional_vars_id = alias.and_then(|a| self.visit_expr(a, parent_id));
                if let Some(alias_node) = alias {
                    if let Some(name) = extract_target_name(alias_node, self) {
                        optional_var_names.push(name);
                    }
                }
                items.push(Value::Map(attrs(&[
                    ("context_expr_id", opt_value(&context_expr_id)),
                    ("optional_vars_id", opt_value(&optional_vars_id)),
                ])));
            }
        }

        let is_async = first_child_is_keyword(node, "async");
        let with_id = self.add_node(
            NodeKind::With,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("items", Value::List(items)), ("is_async", Value::Bool(is_async))]),
        );
        let scope = self.current_scope();
        for name in optional_var_names {
            self.add_symbol_def(&name, SymbolKind::Var, &scope, &with_id);
        }

        let body_block = self.visit_block(node.child_by_field_name("body"), node, &with_id, "body");
        self.edge(&with_id, &body_block, EdgeType::Flow, None);
        self.record_scope_flow(&with_id);
        with_id
    }

    fn visit_match(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let subject_id = node
            .child_by_field_name("subject")
            .and_then(|s| self.visit_expr(s, parent_id));
        let match_id = self.add_node(
            NodeKind::Match,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("subject_id", opt_value(&subject_id))]),
        );

        let mut cases = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for case in named_children(body) {
                if case.kind() != "case_clause" {
                    continue;
                }
                let guard_id = case
                    .child_by_field_name("guard")
                    .and_then(|g| self.visit_expr(g, parent_id));
                let consequence = case.child_by_field_name("consequence");
                let binds = collect_case_binds(case, self);
                let scope = self.current_scope();
                for name in &binds {
                    self.add_symbol_def(name, SymbolKind::Var, &scope, &match_id);
                }
                let body_block = self.visit_block(consequence, case, &match_id, "case");
                cases.push(Value::Map(attrs(&[
                    ("binds", Value::List(binds.into_iter().map(Value::Str).collect())),
                    ("guard_id", opt_value(&guard_id)),
                    ("body_block_id", Value::from(body_block.as_str())),
                ])));
                self.edge(&match_id, &body_block, EdgeType::Flow, guard_id);
            }
        }
        self.set_attr(&match_id, "cases", Value::List(cases));
        self.record_scope_flow(&match_id);
        match_id
    }

    fn visit_return(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let value_id = node.named_child(0).and_then(|c| self.visit_expr(c, parent_id));
        let stmt_id = self.add_node(
            NodeKind::Return,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("value_id", opt_value(&value_id))]),
        );
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_raise(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut children = named_children(node).into_iter();
        let exc_id = children.next().and_then(|c| self.visit_expr(c, parent_id));
        let cause_id = children.next().and_then(|c| self.visit_expr(c, parent_id));
        let stmt_id = self.add_node(
            NodeKind::Raise,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("exc_id", opt_value(&exc_id)), ("cause_id", opt_value(&cause_id))]),
        );
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_break(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let stmt_id = self.add_node(
            NodeKind::Break,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            Default::default(),
        );
        if let Some(loop_ctx) = self.loop_stack.last() {
            let target = loop_ctx.break_target.clone();
            let guard = loop_ctx.guard_id.clone();
            self.edge(&stmt_id, &target, EdgeType::Break, guard);
        }
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_continue(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let stmt_id = self.add_node(
            NodeKind::Continue,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            Default::default(),
        );
        if let Some(loop_ctx) = self.loop_stack.last() {
            let target = loop_ctx.continue_target.clone();
            let guard = loop_ctx.guard_id.clone();
            self.edge(&stmt_id, &target, EdgeType::Continue, guard);
        }
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_assert(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut children = named_children(node).into_iter();
        let test_id = children.next().and_then(|c| self.visit_expr(c, parent_id));
        let msg_id = children.next().and_then(|c| self.visit_expr(c, parent_id));
        let stmt_id = self.add_node(
            NodeKind::Assert,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("test_id", opt_value(&test_id)), ("msg_id", opt_value(&msg_id))]),
        );
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_delete(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let targets: Vec<Value> = named_children(node)
            .into_iter()
            .filter_map(|t| self.visit_expr(t, parent_id))
            .map(Value::Str)
            .collect();
        let stmt_id = self.add_node(
            NodeKind::Delete,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("targets", Value::List(targets))]),
        );
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_assignment(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let value_id = node
            .child_by_field_name("right")
            .and_then(|v| self.visit_expr(v, parent_id));
        let left = node.child_by_field_name("left");
        let target_names: Vec<String> = match left {
            Some(l) if l.kind() == "pattern_list" || l.kind() == "tuple_pattern" => {
                named_children(l).into_iter().filter_map(|t| extract_target_name(t, self)).collect()
            }
            Some(l) => extract_target_name(l, self).into_iter().collect(),
            None => Vec::new(),
        };

        let stmt_id = self.add_node(
            NodeKind::Assign,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("targets", Value::List(target_names.iter().cloned().map(Value::Str).collect())),
                ("value_id", opt_value(&value_id)),
            ]),
        );
        let scope = self.current_scope();
        for name in target_names {
            self.add_symbol_def(&name, SymbolKind::Var, &scope, &stmt_id);
        }
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_aug_assignment(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let value_id = node
            .child_by_field_name("right")
            .and_then(|v| self.visit_expr(v, parent_id));
        let target_name = node
            .child_by_field_name("left")
            .and_then(|l| extract_target_name(l, self));
        let op = node
            .child_by_field_name("operator")
            .map(|o| self.text(o).to_string())
            .unwrap_or_default();

        let stmt_id = self.add_node(
            NodeKind::Assign,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("target", opt_value(&target_name)),
                ("op", Value::from(op.as_str())),
                ("value_id", opt_value(&value_id)),
            ]),
        );
        if let Some(name) = &target_name {
            let scope = self.current_scope();
            self.add_symbol_use(name, SymbolKind::Var, &scope, &stmt_id);
            self.add_symbol_def(name, SymbolKind::Var, &scope, &stmt_id);
        }
        self.record_scope_flow(&stmt_id);
        stmt_id
    }

    fn visit_import(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut names = Vec::new();
        let mut asnames = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "aliased_import" => {
                    let name = child.child_by_field_name("name").map(|n| self.text(n).to_string());
                    let alias = child.child_by_field_name("alias").map(|n| self.text(n).to_string());
                    names.push(name);
                    asnames.push(alias);
                }
                "dotted_name" | "identifier" => {
                    names.push(Some(self.text(child).to_string()));
                    asnames.push(None);
                }
                _ => {}
            }
        }

        let import_id = self.add_node(
            NodeKind::Import,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("names", Value::List(names.iter().cloned().map(opt_str_value).collect())),
                ("asnames", Value::List(asnames.iter().cloned().map(opt_str_value).collect())),
            ]),
        );
        let scope = self.current_scope();
        for (name, asname) in names.into_iter().zip(asnames.into_iter()) {
            if let Some(bound) = asname.or(name) {
                self.add_symbol_def(&bound, SymbolKind::Import, &scope, &import_id);
            }
        }
        self.record_scope_flow(&import_id);
        import_id
    }

    fn visit_import_from(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let module = node
            .child_by_field_name("module_name")
            .map(|m| self.text(m).to_string());
        let mut names = Vec::new();
        let mut asnames = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "aliased_import" => {
                    let name = child.child_by_field_name("name").map(|n| self.text(n).to_string());
                    let alias = child.child_by_field_name("alias").map(|n| self.text(n).to_string());
                    names.push(name);
                    asnames.push(alias);
                }
                "dotted_name" | "identifier" | "wildcard_import" => {
                    names.push(Some(self.text(child).to_string()));
                    asnames.push(None);
                }
                _ => {}
            }
        }

        let import_id = self.add_node(
            NodeKind::Import,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("module", opt_value(&module)),
                ("names", Value::List(names.iter().cloned().map(opt_str_value).collect())),
                ("asnames", Value::List(asnames.iter().cloned().map(opt_str_value).collect())),
            ]),
        );
        let scope = self.current_scope();
        for (name, asname) in names.into_iter().zip(asnames.into_iter()) {
            if let Some(bound) = asname.or(name) {
                self.add_symbol_def(&bound, SymbolKind::Import, &scope, &import_id);
            }
        }
        self.record_scope_flow(&import_id);
        import_id
    }

    // ---- expressions --------------------------------------------------

    fn visit_expr(&mut self, node: Node<'a>, parent_id: &str) -> Option<String> {
        let id = match node.kind() {
            "identifier" => self.visit_name(node, parent_id),
            "true" | "false" | "none" | "integer" | "float" | "string" | "concatenated_string" => {
                self.visit_literal(node, parent_id)
            }
            "list" => self.visit_seq_literal(node, parent_id, "elts"),
            "tuple" => self.visit_seq_literal(node, parent_id, "elts"),
            "set" => self.visit_seq_literal(node, parent_id, "elts"),
            "dictionary" => self.visit_dict_literal(node, parent_id),
            "list_comprehension" | "set_comprehension" | "generator_expression" => {
                self.visit_comprehension_literal(node, parent_id)
            }
            "dictionary_comprehension" => self.visit_dict_comprehension(node, parent_id),
            "lambda" => self.visit_lambda(node, parent_id),
            "conditional_expression" => self.visit_if_exp(node, parent_id),
            "named_expression" => self.visit_named_expr(node, parent_id),
            "boolean_operator" => self.visit_bool_op(node, parent_id),
            "not_operator" => self.visit_unary(node, parent_id, "Not"),
            "unary_operator" => {
                let op = node.child_by_field_name("operator").map(|o| self.text(o).to_string());
                self.visit_unary(node, parent_id, op.as_deref().unwrap_or("?"))
            }
            "binary_operator" => self.visit_bin_op(node, parent_id),
            "comparison_operator" => self.visit_compare(node, parent_id),
            "call" => self.visit_call(node, parent_id),
            "attribute" => self.visit_attribute(node, parent_id),
            "subscript" => self.visit_subscript(node, parent_id),
            "await" => self.visit_await(node, parent_id),
            "yield" => self.visit_yield(node, parent_id),
            "parenthesized_expression" => {
                return node.named_child(0).and_then(|inner| self.visit_expr(inner, parent_id));
            }
            _ => self.visit_unsupported(node, parent_id),
        };
        Some(id)
    }

    fn visit_name(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let name = self.text(node).to_string();
        let node_id = self.add_node(
            NodeKind::Name,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("name", Value::from(name.as_str())), ("ctx", Value::from("Load"))]),
        );
        let scope = self.current_scope();
        self.add_symbol_use(&name, SymbolKind::Var, &scope, &node_id);
        node_id
    }

    fn visit_literal(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let raw = self.text(node).to_string();
        let value_type = match node.kind() {
            "true" | "false" => "bool",
            "none" => "NoneType",
            "integer" => "int",
            "float" => "float",
            _ => "str",
        };

        let mut map = std::collections::BTreeMap::new();
        map.insert("value_type".to_string(), Value::from(value_type));

        if value_type == "str" {
            let literal = strip_string_quotes(&raw);
            if literal.len() > self.options.max_literal_len {
                let truncated = truncate_to_byte_boundary(&literal, self.options.max_literal_len).to_string();
                let hash = format!("{:x}", Sha256::digest(literal.as_bytes()));
                map.insert("value".to_string(), Value::from(truncated.as_str()));
                map.insert("value_hash".to_string(), Value::from(hash.as_str()));
                map.insert("value_truncated".to_string(), Value::Bool(true));
            } else {
                map.insert("value".to_string(), Value::from(literal.as_str()));
            }
            if let Some((lang, confidence)) = detect_embedded_language(&literal) {
                map.insert("embedded_lang".to_string(), Value::from(lang));
                map.insert("embedded_lang_confidence".to_string(), Value::Float(confidence));
            }
        } else {
            map.insert("value".to_string(), Value::from(raw.as_str()));
        }

        self.add_node(NodeKind::Literal, node, Some(parent_id.to_string()), self.current_scope(), map)
    }

    fn visit_seq_literal(&mut self, node: Node<'a>, parent_id: &str, _label: &str) -> String {
        let elts: Vec<Value> = named_children(node)
            .into_iter()
            .filter_map(|e| self.visit_expr(e, parent_id))
            .map(Value::Str)
            .collect();
        self.add_node(
            NodeKind::Literal,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("elts", Value::List(elts))]),
        )
    }

    fn visit_dict_literal(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for pair in named_children(node) {
            if pair.kind() != "pair" {
                continue;
            }
            let key_id = pair.child_by_field_name("key").and_then(|k| self.visit_expr(k, parent_id));
            let value_id = pair.child_by_field_name("value").and_then(|v| self.visit_expr(v, parent_id));
            keys.push(opt_value(&key_id));
            values.push(opt_value(&value_id));
        }
        self.add_node(
            NodeKind::Literal,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("keys", Value::List(keys)), ("values", Value::List(values))]),
        )
    }

    fn visit_comprehension_literal(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let outer_scope = self.current_scope();
        let comp_scope = self.new_scope_id("comp");
        self.scope_stack.push(comp_scope.clone());

        let elt_id = node.named_child(0).and_then(|e| self.visit_expr(e, parent_id));
        let generators = self.visit_for_in_clauses(node, parent_id);

        self.scope_stack.pop();
        self.add_node(
            NodeKind::Literal,
            node,
            Some(parent_id.to_string()),
            outer_scope,
            attrs(&[
                ("elt_id", opt_value(&elt_id)),
                ("generators", Value::List(generators)),
                ("comp_scope", Value::from(comp_scope.as_str())),
            ]),
        )
    }

    fn visit_dict_comprehension(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let outer_scope = self.current_scope();
        let comp_scope = self.new_scope_id("comp");
        self.scope_stack.push(comp_scope.clone());

        let pair = find_child_kind(node, "pair");
        let key_id = pair.and_then(|p| p.child_by_field_name("key")).and_then(|k| self.visit_expr(k, parent_id));
        let value_id = pair.and_then(|p| p.child_by_field_name("value")).and_then(|v| self.visit_expr(v, parent_id));
        let generators = self.visit_for_in_clauses(node, parent_id);

        self.scope_stack.pop();
        self.add_node(
            NodeKind::Literal,
            node,
            Some(parent_id.to_string()),
            outer_scope,
            attrs(&[
                ("key_id", opt_value(&key_id)),
                ("value_id", opt_value(&value_id)),
                ("generators", Value::List(generators)),
                ("comp_scope", Value::from(comp_scope.as_str())),
            ]),
        )
    }

    fn visit_for_in_clauses(&mut self, node: Node<'a>, parent_id: &str) -> Vec<Value> {
        let mut generators = Vec::new();
        for clause in named_children(node) {
            if clause.kind() != "for_in_clause" {
                continue;
            }
            let target = clause.child_by_field_name("left");
            let iter = clause.child_by_field_name("right");
            let target_id = target.and_then(|t| self.visit_expr(t, parent_id));
            let iter_id = iter.and_then(|i| self.visit_expr(i, parent_id));
            let ifs: Vec<Value> = named_children(clause)
                .into_iter()
                .filter(|c| c.kind() == "if_clause")
                .filter_map(|c| c.named_child(0))
                .filter_map(|cond| self.visit_expr(cond, parent_id))
                .map(Value::Str)
                .collect();
            if let Some(t) = target {
                if let Some(name) = extract_target_name(t, self) {
                    if target_id.is_some() {
                        let scope = self.current_scope();
                        self.add_symbol_def(&name, SymbolKind::Var, &scope, target_id.as_ref().unwrap());
                    }
                }
            }
            generators.push(Value::Map(attrs(&[
                ("target_id", opt_value(&target_id)),
                ("iter_id", opt_value(&iter_id)),
                ("ifs", Value::List(ifs)),
            ])));
        }
        generators
    }

    fn visit_lambda(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let params = node
            .child_by_field_name("parameters")
            .map(|p| param_names(p, self))
            .unwrap_or_default();
        let body_id = node.child_by_field_name("body").and_then(|b| self.visit_expr(b, parent_id));
        self.add_node(
            NodeKind::Lambda,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("params", Value::List(params.into_iter().map(Value::Str).collect())),
                ("body_id", opt_value(&body_id)),
            ]),
        )
    }

    fn visit_if_exp(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let children = named_children(node);
        let body_id = children.first().and_then(|n| self.visit_expr(*n, parent_id));
        let test_id = children.get(1).and_then(|n| self.visit_expr(*n, parent_id));
        let orelse_id = children.get(2).and_then(|n| self.visit_expr(*n, parent_id));
        self.add_node(
            NodeKind::IfExp,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("test_id", opt_value(&test_id)),
                ("body_id", opt_value(&body_id)),
                ("orelse_id", opt_value(&orelse_id)),
            ]),
        )
    }

    fn visit_named_expr(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let target = node.child_by_field_name("name");
        let value_id = node.child_by_field_name("value").and_then(|v| self.visit_expr(v, parent_id));
        let target_id = target.and_then(|t| self.visit_expr(t, parent_id));
        let target_name = target.and_then(|t| extract_target_name(t, self));

        let node_id = self.add_node(
            NodeKind::NamedExpr,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("target_id", opt_value(&target_id)),
                ("target_name", opt_value(&target_name)),
                ("value_id", opt_value(&value_id)),
            ]),
        );
        if let Some(name) = target_name {
            let scope = self.current_scope();
            self.add_symbol_def(&name, SymbolKind::Var, &scope, &node_id);
        }
        node_id
    }

    fn visit_bool_op(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let op = node.child_by_field_name("operator").map(|o| self.text(o).to_string()).unwrap_or_default();
        let mut values = Vec::new();
        flatten_bool_operands(node, &op, &mut values);
        let value_ids: Vec<Value> = values
            .into_iter()
            .filter_map(|v| self.visit_expr(v, parent_id))
            .map(Value::Str)
            .collect();
        self.add_node(
            NodeKind::BoolOp,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("op", Value::from(op.as_str())), ("values", Value::List(value_ids))]),
        )
    }

    fn visit_unary(&mut self, node: Node<'a>, parent_id: &str, op: &str) -> String {
        let operand = node.child_by_field_name("argument").and_then(|o| self.visit_expr(o, parent_id));
        self.add_node(
            NodeKind::UnaryOp,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("op", Value::from(op)), ("operand", opt_value(&operand))]),
        )
    }

    fn visit_bin_op(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let left = node.child_by_field_name("left").and_then(|l| self.visit_expr(l, parent_id));
        let right = node.child_by_field_name("right").and_then(|r| self.visit_expr(r, parent_id));
        let op = node.child_by_field_name("operator").map(|o| self.text(o).to_string()).unwrap_or_default();
        self.add_node(
            NodeKind::BinOp,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("op", Value::from(op.as_str())), ("left", opt_value(&left)), ("right", opt_value(&right))]),
        )
    }

    fn visit_compare(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let operands = named_children(node);
        let left_id = operands.first().and_then(|l| self.visit_expr(*l, parent_id));
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !child.is_named() && is_comparison_operator_token(child.kind()) {
                ops.push(child.kind().to_string());
            }
        }
        let comparators: Vec<Value> = operands
            .iter()
            .skip(1)
            .filter_map(|c| self.visit_expr(*c, parent_id))
            .map(Value::Str)
            .collect();
        self.add_node(
            NodeKind::Compare,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("left", opt_value(&left_id)),
                ("ops", Value::List(ops.into_iter().map(Value::Str).collect())),
                ("comparators", Value::List(comparators)),
            ]),
        )
    }

    fn visit_call(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let callee_id = node.child_by_field_name("function").and_then(|f| self.visit_expr(f, parent_id));
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if let Some(arg_list) = node.child_by_field_name("arguments") {
            for arg in named_children(arg_list) {
                if arg.kind() == "keyword_argument" {
                    let name = arg.child_by_field_name("name").map(|n| self.text(n).to_string());
                    let value_id = arg.child_by_field_name("value").and_then(|v| self.visit_expr(v, parent_id));
                    keywords.push(Value::Map(attrs(&[
                        ("name", opt_value(&name)),
                        ("value_id", opt_value(&value_id)),
                    ])));
                } else {
                    if let Some(id) = self.visit_expr(arg, parent_id) {
                        args.push(Value::Str(id));
                    }
                }
            }
        }
        self.add_node(
            NodeKind::Call,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[
                ("callee_id", opt_value(&callee_id)),
                ("args", Value::List(args)),
                ("keywords", Value::List(keywords)),
            ]),
        )
    }

    fn visit_attribute(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let value_id = node.child_by_field_name("object").and_then(|v| self.visit_expr(v, parent_id));
        let attr = node.child_by_field_name("attribute").map(|a| self.text(a).to_string()).unwrap_or_default();
        self.add_node(
            NodeKind::Attribute,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("value_id", opt_value(&value_id)), ("attr", Value::from(attr.as_str()))]),
        )
    }

    fn visit_subscript(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let value_id = node.child_by_field_name("value").and_then(|v| self.visit_expr(v, parent_id));
        let slice_id = node.child_by_field_name("subscript").and_then(|s| self.visit_expr(s, parent_id));
        self.add_node(
            NodeKind::Subscript,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("value_id", opt_value(&value_id)), ("slice_id", opt_value(&slice_id))]),
        )
    }

    fn visit_await(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let value_id = node.named_child(0).and_then(|v| self.visit_expr(v, parent_id));
        self.add_node(
            NodeKind::Await,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("value_id", opt_value(&value_id))]),
        )
    }

    fn visit_yield(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let is_from = first_child_is_keyword(node, "from");
        let value_id = node.named_child(0).and_then(|v| self.visit_expr(v, parent_id));
        self.add_node(
            NodeKind::Yield,
            node,
            Some(parent_id.to_string()),
            self.current_scope(),
            attrs(&[("value_id", opt_value(&value_id)), ("is_from", Value::Bool(is_from))]),
        )
    }

    fn visit_unsupported(&mut self, node: Node<'a>, parent_id: &str) -> String {
        let mut map = attrs(&[
            ("value_type", Value::from("Unknown")),
            ("ast_type", Value::from(node.kind())),
            ("unsupported", Value::Bool(true)),
        ]);
        push_unique_tag(&mut map, "unscannable");
        self.add_node(NodeKind::Literal, node, Some(parent_id.to_string()), self.current_scope(), map)
    }
}

fn attrs(pairs: &[(&str, Value)]) -> std::collections::BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn opt_value(value: &Option<String>) -> Value {
    match value {
        Some(v) => Value::from(v.as_str()),
        None => Value::Null,
    }
}

fn opt_str_value(value: Option<String>) -> Value {
    match value {
        Some(v) => Value::Str(v),
        None => Value::Null,
    }
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn find_child_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn first_child_is_keyword(node: Node, keyword: &str) -> bool {
    node.child(0).map(|c| c.kind() == keyword).unwrap_or(false)
}

fn else_body(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    node.children_by_field_name("alternative", &mut cursor)
        .find(|c| c.kind() == "else_clause")
        .and_then(|c| c.child_by_field_name("body"))
}

fn param_names<'a>(params_node: Node<'a>, builder: &IrBuilder<'a>) -> Vec<String> {
    named_children(params_node)
        .into_iter()
        .filter_map(|p| match p.kind() {
            "identifier" => Some(builder.text(p).to_string()),
            "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
                p.child_by_field_name("name")
                    .or_else(|| p.named_child(0))
                    .map(|n| builder.text(n).to_string())
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => {
                p.named_child(0).map(|n| builder.text(n).to_string())
            }
            _ => None,
        })
        .collect()
}

/// Best-effort name for an assignment/loop/with target. For a bare
/// identifier this is exact; for a compound target (tuple unpacking,
/// attribute, subscript) it falls back to its source text, mirroring
/// `ast.unparse` on the non-`Name` branch of the original.
fn extract_target_name<'a>(node: Node<'a>, builder: &IrBuilder<'a>) -> Option<String> {
    Some(builder.text(node).to_string())
}

/// Truncates to at most `max_bytes` bytes, backing off to the nearest
/// preceding UTF-8 char boundary so the output never splits a multi-byte
/// character (`value.len()` is a byte count, so the truncation has to match).
fn truncate_to_byte_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// A bare string-literal expression statement, the only shape a Python
/// docstring takes.
fn is_docstring_statement(node: Node) -> bool {
    if node.kind() != "expression_statement" {
        return false;
    }
    node.named_child(0).map(|inner| inner.kind() == "string").unwrap_or(false)
}

fn strip_string_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    for prefix in ["rb", "br", "fr", "rf", "b", "r", "f", "u"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            if rest.starts_with('"') || rest.starts_with('\'') {
                return strip_quote_chars(rest);
            }
        }
    }
    strip_quote_chars(trimmed)
}

fn strip_quote_chars(value: &str) -> String {
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if value.starts_with(quote) && value.ends_with(quote) && value.len() >= quote.len() * 2 {
            return value[quote.len()..value.len() - quote.len()].to_string();
        }
    }
    value.to_string()
}

fn flatten_bool_operands<'a>(node: Node<'a>, op: &str, out: &mut Vec<Node<'a>>) {
    let left = node.child_by_field_name("left");
    let right = node.child_by_field_name("right");
    if let Some(left) = left {
        if left.kind() == "boolean_operator"
            && left.child_by_field_name("operator").map(|o| o.kind() == op).unwrap_or(false)
        {
            flatten_bool_operands(left, op, out);
        } else {
            out.push(left);
        }
    }
    if let Some(right) = right {
        out.push(right);
    }
}

fn is_comparison_operator_token(kind: &str) -> bool {
    matches!(
        kind,
        "<" | ">" | "<=" | ">=" | "==" | "!=" | "in" | "not" | "is" | "<>"
    )
}

fn collect_case_binds<'a>(case: Node<'a>, builder: &IrBuilder<'a>) -> Vec<String> {
    let mut names = Vec::new();
    let consequence = case.child_by_field_name("consequence");
    let guard = case.child_by_field_name("guard");
    let mut cursor = case.walk();
    for child in case.named_children(&mut cursor) {
        if Some(child) == consequence || Some(child) == guard {
            continue;
        }
        collect_identifiers(child, builder, &mut names);
    }
    names
}

fn collect_identifiers<'a>(node: Node<'a>, builder: &IrBuilder<'a>, out: &mut Vec<String>) {
    if node.kind() == "identifier" {
        out.push(builder.text(node).to_string());
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_identifiers(child, builder, out);
    }
}

