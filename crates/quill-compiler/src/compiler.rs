//! The AST-to-bytecode compiler itself.
//!
//! Layout mirrors `vitte-compiler`'s single-pass emitter: a `Compiler`
//! holds all mutable state for one compilation (the code buffer, the
//! constant pool, scope/local tracking, loop targets) and walks the tree
//! once, emitting bytes as it goes and patching jump offsets after the
//! fact rather than building an intermediate IR.

use std::collections::{HashMap, HashSet};

use quill_ast::{
    BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Program, ScriptType, Stmt, StmtKind, UnaryOp,
};
use quill_bytecode::{Chunk, FunctionEntry, Metadata, Op, Value};
use quill_core::SourceId;

use crate::error::CompileError;
use crate::resolver::IncludeResolver;

/// Everything a compile run produced: the chunk (meaningful only when
/// `errors` is empty) and every error found along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutcome {
    /// The compiled chunk. Still returned on error, built as far as
    /// compilation got, so tooling can inspect a partial result.
    pub chunk: Chunk,
    /// Every error recorded during compilation, in the order encountered.
    pub errors: Vec<CompileError>,
}

impl CompileOutcome {
    /// Whether any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Compiles a parsed program into a bytecode chunk.
///
/// `source` is used to re-lex and re-parse any files pulled in by `import`
/// statements, so their spans are attributed to the same source table as
/// the entry program. `metadata` and `source_hash` are stamped onto the
/// resulting chunk unchanged; signing happens later, when the chunk is
/// written to a container (see `quill_bytecode::write_container`).
#[must_use]
pub fn compile(
    program: Program,
    source: SourceId,
    resolver: &mut dyn IncludeResolver,
    metadata: Metadata,
    source_hash: String,
) -> CompileOutcome {
    let mut compiler = Compiler::new(source, resolver);
    let mut in_progress = Vec::new();
    let expanded = compiler.expand_program(program, &mut in_progress);

    compiler.register_functions(&expanded.functions);

    for stmt in &expanded.statements {
        compiler.compile_stmt(stmt);
    }
    compiler.emit_op(Op::Halt);

    for f in &expanded.functions {
        compiler.compile_function(f);
    }

    let chunk = Chunk {
        version: quill_bytecode::CHUNK_VERSION,
        metadata,
        signature: String::new(),
        code: compiler.code,
        constants: compiler.constants,
        functions: compiler.functions,
        line_map: compiler.line_map,
        source_hash,
    };

    CompileOutcome { chunk, errors: compiler.errors }
}

struct Local {
    name: String,
    depth: u32,
    initialized: bool,
}

struct LoopCtx {
    continue_target: u32,
    break_patches: Vec<usize>,
}

struct Compiler<'a> {
    source: SourceId,
    resolver: &'a mut dyn IncludeResolver,

    code: Vec<u8>,
    constants: Vec<Value>,
    line_map: Vec<u32>,
    current_line: u32,

    functions: Vec<FunctionEntry>,
    function_index: HashMap<String, usize>,

    scope_depth: u32,
    locals: Vec<Local>,
    in_function: bool,
    current_return_type: ScriptType,

    loop_stack: Vec<LoopCtx>,
    break_stack: Vec<Vec<usize>>,

    imported_files: HashSet<String>,

    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    fn new(source: SourceId, resolver: &'a mut dyn IncludeResolver) -> Self {
        Self {
            source,
            resolver,
            code: Vec::new(),
            constants: Vec::new(),
            line_map: Vec::new(),
            current_line: 0,
            functions: Vec::new(),
            function_index: HashMap::new(),
            scope_depth: 0,
            locals: Vec::new(),
            in_function: false,
            current_return_type: ScriptType::Void,
            loop_stack: Vec::new(),
            break_stack: Vec::new(),
            imported_files: HashSet::new(),
            errors: Vec::new(),
        }
    }

    // --- import expansion --------------------------------------------

    /// Textually splices every top-level `import` into the program it
    /// names, recursively, tracking both "fully resolved" paths (skipped
    /// silently on a later import, same as a C header guard) and
    /// "currently being resolved" paths (a repeat of one of those is a
    /// cycle). Imports nested inside a block or function body are not
    /// expanded here — they surface as `UnresolvedImport` when reached
    /// during statement compilation.
    fn expand_program(&mut self, program: Program, in_progress: &mut Vec<String>) -> Program {
        let mut functions = program.functions;
        let mut statements = Vec::with_capacity(program.statements.len());
        for stmt in program.statements {
            if let StmtKind::Import(path) = &stmt.kind {
                if let Some(sub) = self.expand_import(path, in_progress) {
                    functions.extend(sub.functions);
                    statements.extend(sub.statements);
                }
            } else {
                statements.push(stmt);
            }
        }
        Program { functions, statements }
    }

    fn expand_import(&mut self, path: &str, in_progress: &mut Vec<String>) -> Option<Program> {
        let normalized = normalize_path(path);
        if self.imported_files.contains(&normalized) {
            return Some(Program::new());
        }
        if in_progress.contains(&normalized) {
            self.errors.push(CompileError::CircularImport(path.to_string()));
            return None;
        }
        let Some(text) = self.resolver.resolve(path) else {
            self.errors.push(CompileError::UnresolvedImport(path.to_string()));
            return None;
        };

        in_progress.push(normalized.clone());
        let (tokens, _lex_errors) = quill_lexer::lex(&text);
        let outcome = quill_parser::parse(tokens, self.source);
        let expanded = self.expand_program(outcome.program, in_progress);
        in_progress.pop();
        self.imported_files.insert(normalized);
        Some(expanded)
    }

    // --- function table ------------------------------------------------

    fn register_functions(&mut self, functions: &[FunctionDecl]) {
        for f in functions {
            if self.function_index.contains_key(&f.name) {
                self.errors.push(CompileError::DuplicateFunction(f.name.clone()));
                continue;
            }
            let idx = self.functions.len();
            self.function_index.insert(f.name.clone(), idx);
            self.functions.push(FunctionEntry {
                name: f.name.clone(),
                address: 0,
                arity: f.params.len().min(255) as u8,
            });
        }
    }

    fn compile_function(&mut self, f: &FunctionDecl) {
        let Some(&idx) = self.function_index.get(&f.name) else {
            return; // duplicate; already recorded as an error
        };
        self.functions[idx].address = self.code.len() as u32;

        self.locals.clear();
        self.scope_depth = 0;
        self.in_function = true;
        self.current_return_type = f.return_type;
        for p in &f.params {
            self.locals.push(Local { name: p.name.clone(), depth: 0, initialized: true });
        }

        for stmt in &f.body {
            self.compile_stmt(stmt);
        }

        // Conservative: only the literal last statement is checked, not full
        // reachability (an `if`/`else` whose branches both return is still
        // "falls off the end" here and gets a dead NIL;RETURN appended).
        // That's harmless at run time and matches the spec's documented
        // policy of appending rather than rejecting.
        let falls_off_end = !matches!(f.body.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
        if falls_off_end {
            self.emit_op(Op::Nil);
            self.emit_op(Op::Return);
        }

        self.in_function = false;
    }

    // --- statements ------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) {
        self.current_line = stmt.span.start.line;
        match &stmt.kind {
            StmtKind::ExprStmt(e) => {
                self.compile_expr(e);
                self.emit_op(Op::Pop);
            }
            StmtKind::VarDecl { name, init, .. } => {
                match init {
                    Some(e) => self.compile_expr(e),
                    None => self.emit_op(Op::Nil),
                }
                self.compile_var_decl(name);
            }
            StmtKind::Block(stmts) => {
                self.begin_scope();
                for s in stmts {
                    self.compile_stmt(s);
                }
                self.end_scope();
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.compile_expr(cond);
                let then_jump = self.emit_jump(Op::JumpIfFalse);
                self.compile_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    let else_jump = self.emit_jump(Op::Jump);
                    self.patch_jump(then_jump);
                    self.compile_stmt(else_branch);
                    self.patch_jump(else_jump);
                } else {
                    self.patch_jump(then_jump);
                }
            }
            StmtKind::While { cond, body } => self.compile_while(cond, body),
            StmtKind::For { init, cond, update, body } => {
                self.compile_for(init.as_deref(), cond.as_ref(), update.as_ref(), body);
            }
            StmtKind::Switch { subject, cases, default } => {
                self.compile_switch(subject, cases, default.as_deref());
            }
            StmtKind::Return(value) => {
                let returns_void = matches!(self.current_return_type, ScriptType::Void);
                match value {
                    Some(e) => {
                        if returns_void {
                            self.errors.push(CompileError::InvalidReturnType(
                                "<current function>".into(),
                                "a value was returned from a void function".into(),
                            ));
                        }
                        self.compile_expr(e);
                    }
                    None => {
                        if !returns_void {
                            self.errors.push(CompileError::InvalidReturnType(
                                "<current function>".into(),
                                "missing return value in a non-void function".into(),
                            ));
                        }
                        self.emit_op(Op::Nil);
                    }
                }
                self.emit_op(Op::Return);
            }
            StmtKind::Break => {
                if let Some(patches) = self.break_stack.last_mut() {
                    let j = self.emit_jump(Op::Jump);
                    patches.push(j);
                } else {
                    self.errors.push(CompileError::BreakOutsideLoop);
                }
            }
            StmtKind::Continue => {
                if let Some(target) = self.loop_stack.last().map(|l| l.continue_target) {
                    self.emit_loop(target);
                } else {
                    self.errors.push(CompileError::ContinueOutsideLoop);
                }
            }
            StmtKind::Import(path) => {
                self.errors.push(CompileError::UnresolvedImport(format!(
                    "{path} (imports are only resolved at the top level of a file)"
                )));
            }
        }
    }

    fn compile_var_decl(&mut self, name: &str) {
        if !self.in_function && self.scope_depth == 0 {
            let idx = self.add_constant(Value::String(name.to_string()));
            self.emit_op(Op::DefineGlobal);
            self.emit_byte(idx);
        } else if self.locals.len() >= 256 {
            self.errors.push(CompileError::TooManyLocals);
        } else {
            self.locals.push(Local { name: name.to_string(), depth: self.scope_depth, initialized: true });
        }
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while let Some(local) = self.locals.last() {
            if local.depth > self.scope_depth {
                self.emit_op(Op::Pop);
                self.locals.pop();
            } else {
                break;
            }
        }
    }

    fn compile_while(&mut self, cond: &Expr, body: &Stmt) {
        let loop_start = self.code.len() as u32;
        self.compile_expr(cond);
        let exit_jump = self.emit_jump(Op::JumpIfFalse);

        self.loop_stack.push(LoopCtx { continue_target: loop_start, break_patches: Vec::new() });
        self.break_stack.push(Vec::new());
        self.compile_stmt(body);
        self.loop_stack.pop();
        let breaks = self.break_stack.pop().unwrap_or_default();

        self.emit_loop(loop_start);
        self.patch_jump(exit_jump);
        for p in breaks {
            self.patch_jump(p);
        }
    }

    fn compile_for(&mut self, init: Option<&Stmt>, cond: Option<&Expr>, update: Option<&Expr>, body: &Stmt) {
        self.begin_scope();
        if let Some(init) = init {
            self.compile_stmt(init);
        }

        let loop_start = self.code.len() as u32;
        let exit_jump = cond.map(|cond| {
            self.compile_expr(cond);
            self.emit_jump(Op::JumpIfFalse)
        });

        // Skip the update on the loop's first pass through.
        let body_jump = self.emit_jump(Op::Jump);

        let update_start = self.code.len() as u32;
        if let Some(update) = update {
            self.compile_expr(update);
            self.emit_op(Op::Pop);
        }
        self.emit_loop(loop_start);

        self.patch_jump(body_jump);
        self.loop_stack.push(LoopCtx { continue_target: update_start, break_patches: Vec::new() });
        self.break_stack.push(Vec::new());
        self.compile_stmt(body);
        self.loop_stack.pop();
        let breaks = self.break_stack.pop().unwrap_or_default();
        self.emit_loop(update_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
        }
        for p in breaks {
            self.patch_jump(p);
        }
        self.end_scope();
    }

    /// Lowers to a linear chain of duplicate-compare-jump triples (one per
    /// case) followed by every case body laid out back to back with no
    /// jump between them, so falling off the end of one body runs
    /// straight into the next — that contiguous layout *is* fallthrough.
    /// `default`, if present, always sits after every case body
    /// regardless of where it appeared lexically (the AST doesn't record
    /// its original position among the cases).
    fn compile_switch(&mut self, subject: &Expr, cases: &[(Expr, Vec<Stmt>)], default: Option<&[Stmt]>) {
        self.compile_expr(subject);
        self.break_stack.push(Vec::new());

        let mut body_jumps = Vec::with_capacity(cases.len());
        for (value, _) in cases {
            self.emit_op(Op::Duplicate);
            self.compile_expr(value);
            self.emit_op(Op::Equal);
            let fail_jump = self.emit_jump(Op::JumpIfFalse);
            self.emit_op(Op::Pop);
            body_jumps.push(self.emit_jump(Op::Jump));
            self.patch_jump(fail_jump);
        }
        self.emit_op(Op::Pop); // subject, unmatched by any case
        let no_match_jump = self.emit_jump(Op::Jump);

        for (i, (_, body)) in cases.iter().enumerate() {
            self.patch_jump(body_jumps[i]);
            for s in body {
                self.compile_stmt(s);
            }
        }

        self.patch_jump(no_match_jump);
        if let Some(default) = default {
            for s in default {
                self.compile_stmt(s);
            }
        }

        let breaks = self.break_stack.pop().unwrap_or_default();
        for p in breaks {
            self.patch_jump(p);
        }
    }

    // --- expressions ------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) {
        self.current_line = expr.span.start.line;
        match &expr.kind {
            ExprKind::Literal(lit) => self.compile_literal(lit),
            ExprKind::Identifier(name) => self.compile_identifier_read(name),
            ExprKind::ArrayLiteral(items) => {
                for item in items {
                    self.compile_expr(item);
                }
                self.emit_op(Op::CreateArray);
                self.emit_byte(items.len().min(255) as u8);
            }
            ExprKind::ArrayAccess { array, index } => {
                self.compile_expr(array);
                self.compile_expr(index);
                self.emit_op(Op::GetElement);
            }
            ExprKind::ArrayAssign { array, index, value } => {
                self.compile_expr(array);
                self.compile_expr(index);
                self.compile_expr(value);
                self.emit_op(Op::SetElement);
                self.write_back(array);
            }
            // Struct values have no dedicated runtime representation: a
            // struct literal builds an array of `[name, value]` pairs, and
            // field access/assignment is a linear scan over it by name.
            ExprKind::StructLiteral(fields) => {
                for (name, value) in fields {
                    let idx = self.add_constant(Value::String(name.clone()));
                    self.emit_op(Op::Constant);
                    self.emit_byte(idx);
                    self.compile_expr(value);
                    self.emit_op(Op::CreateArray);
                    self.emit_byte(2);
                }
                self.emit_op(Op::CreateArray);
                self.emit_byte(fields.len().min(255) as u8);
            }
            ExprKind::StructAccess { object, field } => {
                self.compile_expr(object);
                let idx = self.add_constant(Value::String(field.clone()));
                self.emit_op(Op::GetField);
                self.emit_u16(u16::from(idx));
            }
            ExprKind::StructAssign { object, field, value } => {
                self.compile_expr(object);
                self.compile_expr(value);
                let idx = self.add_constant(Value::String(field.clone()));
                self.emit_op(Op::SetField);
                self.emit_u16(u16::from(idx));
                self.write_back(object);
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.emit_op(binary_op(*op));
            }
            ExprKind::Unary { op, operand } => {
                self.compile_expr(operand);
                self.emit_op(unary_op(*op));
            }
            ExprKind::Assign { name, value } => {
                self.compile_expr(value);
                self.compile_identifier_write(name);
            }
            ExprKind::Call { callee, args } => self.compile_call(callee, args),
            ExprKind::TypeCast { target_type, expr } => {
                self.compile_expr(expr);
                self.compile_cast(*target_type);
            }
        }
    }

    fn compile_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Nil => self.emit_op(Op::Nil),
            Literal::Bool(true) => self.emit_op(Op::True),
            Literal::Bool(false) => self.emit_op(Op::False),
            Literal::Number(n) => {
                let idx = self.add_constant(Value::Number(*n));
                self.emit_op(Op::Constant);
                self.emit_byte(idx);
            }
            Literal::String(s) => {
                let idx = self.add_constant(Value::String(s.clone()));
                self.emit_op(Op::Constant);
                self.emit_byte(idx);
            }
        }
    }

    fn compile_identifier_read(&mut self, name: &str) {
        if let Some(slot) = self.resolve_local(name) {
            self.emit_op(Op::GetLocal);
            self.emit_byte(slot);
        } else {
            let idx = self.add_constant(Value::String(name.to_string()));
            self.emit_op(Op::GetGlobal);
            self.emit_byte(idx);
        }
    }

    fn compile_identifier_write(&mut self, name: &str) {
        if let Some(slot) = self.resolve_local(name) {
            self.emit_op(Op::SetLocal);
            self.emit_byte(slot);
        } else {
            let idx = self.add_constant(Value::String(name.to_string()));
            self.emit_op(Op::SetGlobal);
            self.emit_byte(idx);
        }
    }

    /// `SET_ELEMENT`/`SET_FIELD` leave the *mutated container* on top of the
    /// stack, but `Value` has copy semantics: the local/global slot the
    /// container came from still holds the pre-mutation value unless we
    /// write it back explicitly. Only plain identifier targets get this —
    /// `a[0][1] = x` mutates a temporary that nothing reads back from, which
    /// matches the container's documented assignment-is-an-expression
    /// semantics rather than deep lvalue chains.
    fn write_back(&mut self, target: &Expr) {
        if let ExprKind::Identifier(name) = &target.kind {
            self.compile_identifier_write(name);
        }
    }

    fn compile_call(&mut self, callee: &str, args: &[Expr]) {
        if callee == "print" {
            for a in args {
                self.compile_expr(a);
            }
            // print takes exactly one argument by grammar; anything else
            // reaching here is a parser bug, not something to patch over.
            self.emit_op(Op::Print);
            self.emit_op(Op::Nil);
            return;
        }
        if let Some(&idx) = self.function_index.get(callee) {
            for a in args {
                self.compile_expr(a);
            }
            self.emit_op(Op::Call);
            self.emit_byte(args.len().min(255) as u8);
            self.emit_u16(idx as u16);
            return;
        }
        // Not a known script function: left to the VM's native registry.
        for a in args {
            self.compile_expr(a);
        }
        let idx = self.add_constant(Value::String(callee.to_string()));
        self.emit_op(Op::CallNative);
        self.emit_byte(args.len().min(255) as u8);
        self.emit_u16(u16::from(idx));
    }

    fn compile_cast(&mut self, target: ScriptType) {
        match target {
            ScriptType::Int => self.emit_op(Op::CastInt),
            ScriptType::Float => self.emit_op(Op::CastFloat),
            ScriptType::StringType => self.emit_op(Op::CastString),
            // No dedicated opcode exists for casting to bool. Two logical
            // negations turn any value's truthiness into a canonical
            // `Bool`, using only opcodes the table already has.
            ScriptType::Bool => {
                self.emit_op(Op::Not);
                self.emit_op(Op::Not);
            }
            // Casts to `void` or to an array type have no defined runtime
            // behavior; the value is passed through unchanged.
            _ => {}
        }
    }

    fn resolve_local(&self, name: &str) -> Option<u8> {
        self.locals.iter().enumerate().rev().find(|(_, l)| l.name == name).map(|(i, _)| i as u8)
    }

    // --- constant pool ------------------------------------------------

    fn add_constant(&mut self, value: Value) -> u8 {
        for (i, existing) in self.constants.iter().enumerate() {
            if constants_match(existing, &value) {
                return i as u8;
            }
        }
        if self.constants.len() >= 256 {
            self.errors.push(CompileError::TooManyConstants);
            return 255;
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u8
    }

    // --- byte emission ------------------------------------------------

    fn emit_byte(&mut self, b: u8) {
        self.code.push(b);
        self.line_map.push(self.current_line);
    }

    fn emit_op(&mut self, op: Op) {
        self.emit_byte(op as u8);
    }

    fn emit_u16(&mut self, v: u16) {
        let bytes = v.to_le_bytes();
        self.emit_byte(bytes[0]);
        self.emit_byte(bytes[1]);
    }

    /// Emits `op` with a placeholder 2-byte forward offset, returning the
    /// offset of the placeholder to [`Self::patch_jump`] once the target
    /// is known.
    fn emit_jump(&mut self, op: Op) -> usize {
        self.emit_op(op);
        let operand = self.code.len();
        self.emit_byte(0);
        self.emit_byte(0);
        operand
    }

    fn patch_jump(&mut self, operand: usize) {
        let after = operand + 2;
        let delta = (self.code.len() - after) as u16;
        let bytes = delta.to_le_bytes();
        self.code[operand] = bytes[0];
        self.code[operand + 1] = bytes[1];
    }

    fn emit_loop(&mut self, target: u32) {
        self.emit_op(Op::Loop);
        let operand = self.code.len();
        self.emit_byte(0);
        self.emit_byte(0);
        let after = (operand + 2) as u32;
        let delta = (after - target) as u16;
        let bytes = delta.to_le_bytes();
        self.code[operand] = bytes[0];
        self.code[operand + 1] = bytes[1];
    }
}

fn constants_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            let scale = a.abs().max(b.abs()).max(1.0);
            (a - b).abs() <= 1e-9 * scale
        }
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

const fn binary_op(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Eq => Op::Equal,
        BinaryOp::NotEq => Op::NotEqual,
        BinaryOp::Less => Op::Less,
        BinaryOp::LessEq => Op::LessEqual,
        BinaryOp::Greater => Op::Greater,
        BinaryOp::GreaterEq => Op::GreaterEqual,
        BinaryOp::And => Op::And,
        BinaryOp::Or => Op::Or,
        BinaryOp::BitAnd => Op::BitAnd,
        BinaryOp::BitOr => Op::BitOr,
        BinaryOp::BitXor => Op::BitXor,
    }
}

const fn unary_op(op: UnaryOp) -> Op {
    match op {
        UnaryOp::Negate => Op::Negate,
        UnaryOp::Not => Op::Not,
        UnaryOp::BitNot => Op::BitNot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NullResolver;
    use quill_core::SourceId;

    fn compile_source(src: &str) -> CompileOutcome {
        let (tokens, _) = quill_lexer::lex(src);
        let outcome = quill_parser::parse(tokens, SourceId(0));
        assert!(!outcome.has_errors(), "parse errors: {:?}", outcome.errors);
        let mut resolver = NullResolver;
        compile(outcome.program, SourceId(0), &mut resolver, Metadata::default(), String::new())
    }

    #[test]
    fn compiles_a_trivial_program_ending_in_halt() {
        let out = compile_source("var x = 1 + 2;");
        assert!(!out.has_errors());
        assert_eq!(*out.chunk.code.last().unwrap(), Op::Halt as u8);
    }

    #[test]
    fn deduplicates_identical_number_and_string_constants() {
        let out = compile_source(r#"var a = 1; var b = 1; var c = "x"; var d = "x";"#);
        assert!(!out.has_errors());
        let numbers = out.chunk.constants.iter().filter(|v| **v == Value::Number(1.0)).count();
        let strings = out.chunk.constants.iter().filter(|v| **v == Value::String("x".into())).count();
        assert_eq!(numbers, 1);
        assert_eq!(strings, 1);
    }

    #[test]
    fn break_outside_a_loop_is_an_error() {
        let out = compile_source("break;");
        assert!(out.errors.contains(&CompileError::BreakOutsideLoop));
    }

    #[test]
    fn continue_outside_a_loop_is_an_error() {
        let out = compile_source("continue;");
        assert!(out.errors.contains(&CompileError::ContinueOutsideLoop));
    }

    #[test]
    fn duplicate_function_names_are_rejected() {
        let out = compile_source("void f() {} void f() {}");
        assert!(out.errors.iter().any(|e| matches!(e, CompileError::DuplicateFunction(n) if n == "f")));
    }

    #[test]
    fn function_falling_off_the_end_gets_an_implicit_nil_return() {
        let out = compile_source("void f() { var x = 1; }");
        assert!(!out.has_errors());
        let addr = out.chunk.functions[0].address as usize;
        let tail = &out.chunk.code[addr..];
        assert!(tail.windows(2).any(|w| w == [Op::Nil as u8, Op::Return as u8]));
    }

    #[test]
    fn while_loop_compiles_to_a_backward_loop_opcode() {
        let out = compile_source("while (true) { break; }");
        assert!(!out.has_errors());
        assert!(out.chunk.code.contains(&(Op::Loop as u8)));
    }

    #[test]
    fn switch_with_no_matching_case_and_no_default_runs_nothing() {
        let out = compile_source(
            r"
            int f() {
                var result = 0;
                switch (1) {
                    case 2:
                        result = 99;
                        break;
                }
                return result;
            }
            ",
        );
        assert!(!out.has_errors());
    }

    #[test]
    fn unknown_call_compiles_to_call_native() {
        let out = compile_source("sleep(10);");
        assert!(!out.has_errors());
        assert!(out.chunk.code.contains(&(Op::CallNative as u8)));
    }

    #[test]
    fn struct_literal_and_field_access_compile_without_a_struct_value_variant() {
        let out = compile_source(r#"var p = { x: 1, y: 2 }; var px = p.x;"#);
        assert!(!out.has_errors());
        assert!(out.chunk.code.contains(&(Op::GetField as u8)));
        assert!(out.chunk.code.contains(&(Op::CreateArray as u8)));
    }

    #[test]
    fn unresolved_import_is_reported() {
        let out = compile_source(r#"import "missing.quill";"#);
        assert!(out.errors.iter().any(|e| matches!(e, CompileError::UnresolvedImport(_))));
    }

    #[test]
    fn value_returned_from_void_function_is_flagged() {
        let out = compile_source("void f() { return 1; }");
        assert!(out.errors.iter().any(|e| matches!(e, CompileError::InvalidReturnType(..))));
    }
}
