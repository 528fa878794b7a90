//! quill-parser — recursive-descent parser with panic-mode error recovery.
//!
//! A syntax error never aborts the parse: the parser records the error,
//! enters panic mode, and synchronizes at the next statement boundary so it
//! can keep looking for further (unrelated) mistakes in the same pass.

#![deny(missing_docs)]

use quill_ast::{
    BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Param, Program, ScriptType, Stmt, StmtKind,
    UnaryOp,
};
use quill_core::{Pos, SourceId, Span};
use quill_lexer::{Keyword, Token, TokenKind};

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    /// A specific token was required but something else was found.
    #[error("expected {expected}, found {found}")]
    ExpectedToken {
        /// What the grammar required at this point.
        expected: String,
        /// A description of what was actually there.
        found: String,
    },
    /// A declaration (function, parameter list, type) was malformed.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    /// An expression was malformed (e.g. an invalid assignment target).
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}

/// A single parse error, located by line and column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{line}:{column}] {kind}")]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// The result of a parse: whatever tree could be built, plus every error
/// encountered along the way. A non-empty `errors` means the tree is not
/// safe to compile, but it is still returned so tooling (e.g. an editor)
/// can work with a partial result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParseOutcome {
    /// The parsed program (possibly incomplete, if errors occurred).
    pub program: Program,
    /// Every error recorded during the parse, in source order.
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    /// Whether any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parses a full token stream (as produced by `quill_lexer::lex`) into a
/// [`Program`]. `source` is only used to stamp resulting spans.
#[must_use]
pub fn parse(tokens: Vec<Token>, source: SourceId) -> ParseOutcome {
    let mut parser = Parser { tokens, pos: 0, source, errors: Vec::new(), panic_mode: false };
    let mut program = Program::new();

    while !parser.is_at_end() {
        if parser.looks_like_function_decl() {
            if let Some(f) = parser.parse_function_decl() {
                program.functions.push(f);
            }
        } else if let Some(s) = parser.parse_statement() {
            program.statements.push(s);
        }
        if parser.panic_mode {
            parser.synchronize();
        }
    }

    ParseOutcome { program, errors: parser.errors }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source: SourceId,
    errors: Vec<ParseError>,
    panic_mode: bool,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn current_span(&self) -> Span {
        let pos = Pos { line: self.peek().line, column: self.peek().column };
        Span::new(self.source, pos, pos)
    }

    fn previous_span(&self) -> Span {
        let pos = Pos { line: self.previous().line, column: self.previous().column };
        Span::new(self.source, pos, pos)
    }

    fn describe_current(&self) -> String {
        let t = self.peek();
        if matches!(t.kind, TokenKind::Eof) {
            "end of file".to_string()
        } else {
            format!("'{}'", t.lexeme)
        }
    }

    fn error_at_current(&mut self, kind: ParseErrorKind) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let t = self.peek();
        self.errors.push(ParseError { kind, line: t.line, column: t.column });
    }

    fn is_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek().kind, TokenKind::Keyword(k) if k == kw)
    }

    fn match_kw(&mut self, kw: Keyword) -> bool {
        if self.is_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check_punct(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn match_punct(&mut self, kind: TokenKind) -> bool {
        if self.check_punct(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_punct(&mut self, kind: TokenKind, expected: &str) -> Option<Token> {
        if self.check_punct(&kind) {
            Some(self.advance())
        } else {
            let found = self.describe_current();
            self.error_at_current(ParseErrorKind::ExpectedToken { expected: expected.into(), found });
            None
        }
    }

    fn consume_identifier(&mut self, what: &str) -> Option<String> {
        if let TokenKind::Identifier(name) = self.peek().kind.clone() {
            self.advance();
            Some(name)
        } else {
            let found = self.describe_current();
            self.error_at_current(ParseErrorKind::ExpectedToken { expected: what.into(), found });
            None
        }
    }

    fn consume_string(&mut self, what: &str) -> Option<String> {
        if let TokenKind::String(s) = self.peek().kind.clone() {
            self.advance();
            Some(s)
        } else {
            let found = self.describe_current();
            self.error_at_current(ParseErrorKind::ExpectedToken { expected: what.into(), found });
            None
        }
    }

    fn is_type_keyword(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Keyword(Keyword::Int | Keyword::Float | Keyword::StringType | Keyword::Bool)
        )
    }

    fn kind_at(&self, i: usize) -> Option<&TokenKind> {
        self.tokens.get(i).map(|t| &t.kind)
    }

    /// `funcDecl := type IDENT '(' ...` has no leading keyword of its own;
    /// the only way to tell it apart from `varDecl := type IDENT ('='|';')`
    /// at a declaration boundary is to look past the type (including any
    /// `[]` array suffix) and check whether an identifier is followed by
    /// `(`.
    fn looks_like_function_decl(&self) -> bool {
        if !matches!(
            self.peek().kind,
            TokenKind::Keyword(
                Keyword::Void | Keyword::Int | Keyword::Float | Keyword::StringType | Keyword::Bool
            )
        ) {
            return false;
        }
        let mut i = self.pos + 1;
        while self.kind_at(i) == Some(&TokenKind::LBracket) {
            if self.kind_at(i + 1) == Some(&TokenKind::RBracket) {
                i += 2;
            } else {
                break;
            }
        }
        matches!(self.kind_at(i), Some(TokenKind::Identifier(_)))
            && self.kind_at(i + 1) == Some(&TokenKind::LParen)
    }

    /// Parses a type: a base keyword, optionally followed by `[]`.
    fn parse_type(&mut self) -> Option<ScriptType> {
        let base = match self.peek().kind {
            TokenKind::Keyword(Keyword::Void) => ScriptType::Void,
            TokenKind::Keyword(Keyword::Int) => ScriptType::Int,
            TokenKind::Keyword(Keyword::Float) => ScriptType::Float,
            TokenKind::Keyword(Keyword::StringType) => ScriptType::StringType,
            TokenKind::Keyword(Keyword::Bool) => ScriptType::Bool,
            _ => {
                let found = self.describe_current();
                self.error_at_current(ParseErrorKind::InvalidDeclaration(format!(
                    "expected a type, found {found}"
                )));
                return None;
            }
        };
        self.advance();
        if self.match_punct(TokenKind::LBracket) {
            self.consume_punct(TokenKind::RBracket, "']'")?;
            return Some(match base {
                ScriptType::Int => ScriptType::IntArray,
                ScriptType::Float => ScriptType::FloatArray,
                ScriptType::StringType => ScriptType::StringArray,
                ScriptType::Bool => ScriptType::BoolArray,
                other => {
                    self.error_at_current(ParseErrorKind::InvalidDeclaration(
                        "arrays of 'void' are not allowed".into(),
                    ));
                    other
                }
            });
        }
        Some(base)
    }

    /// Parses a comma-separated list of items up to (but not consuming)
    /// `closing`. Empty lists are allowed.
    fn parse_list<T>(
        &mut self,
        closing: &TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> Option<T>,
    ) -> Option<Vec<T>> {
        let mut items = Vec::new();
        if !self.check_punct(closing) {
            loop {
                items.push(parse_item(self)?);
                if !self.match_punct(TokenKind::Comma) {
                    break;
                }
            }
        }
        Some(items)
    }

    fn at_sync_point(&self) -> bool {
        matches!(self.peek().kind, TokenKind::LBrace | TokenKind::RBrace)
            || matches!(
                self.peek().kind,
                TokenKind::Keyword(
                    Keyword::If
                        | Keyword::While
                        | Keyword::For
                        | Keyword::Return
                        | Keyword::Function
                        | Keyword::Var
                        | Keyword::Int
                        | Keyword::Float
                        | Keyword::StringType
                        | Keyword::Bool
                        | Keyword::Void
                )
            )
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.is_at_end() {
            if matches!(self.previous().kind, TokenKind::Semicolon) {
                return;
            }
            if self.at_sync_point() {
                return;
            }
            self.advance();
        }
    }

    /* ─────────────────────────── Declarations ─────────────────────────── */

    fn parse_function_decl(&mut self) -> Option<FunctionDecl> {
        let start = self.current_span();
        let return_type = self.parse_type()?;
        let name = self.consume_identifier("a function name")?;
        self.consume_punct(TokenKind::LParen, "'('")?;
        let params = self.parse_list(&TokenKind::RParen, |p| {
            let ty = p.parse_type()?;
            let name = p.consume_identifier("a parameter name")?;
            Some(Param { name, ty })
        })?;
        self.consume_punct(TokenKind::RParen, "')'")?;
        self.consume_punct(TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_stmts()?;
        Some(FunctionDecl { name, params, body, return_type, span: start })
    }

    /* ─────────────────────────── Statements ─────────────────────────── */

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek().kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Keyword(Keyword::Var) => self.parse_var_decl_auto(),
            _ if self.is_type_keyword() => self.parse_var_decl_typed(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => self.parse_break(),
            TokenKind::Keyword(Keyword::Continue) => self.parse_continue(),
            TokenKind::Keyword(Keyword::Import) => self.parse_import(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_block(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.consume_punct(TokenKind::LBrace, "'{'")?;
        let stmts = self.parse_block_stmts()?;
        Some(Stmt::new(StmtKind::Block(stmts), start))
    }

    fn parse_block_stmts(&mut self) -> Option<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check_punct(&TokenKind::RBrace) && !self.is_at_end() {
            if let Some(s) = self.parse_statement() {
                stmts.push(s);
            }
            if self.panic_mode {
                self.synchronize();
            }
        }
        self.consume_punct(TokenKind::RBrace, "'}'")?;
        Some(stmts)
    }

    fn parse_var_decl_auto(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'var'
        let name = self.consume_identifier("a variable name")?;
        let init =
            if self.match_punct(TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::VarDecl { name, ty: ScriptType::Auto, init }, start))
    }

    fn parse_var_decl_typed(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let ty = self.parse_type()?;
        let name = self.consume_identifier("a variable name")?;
        let init =
            if self.match_punct(TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::VarDecl { name, ty, init }, start))
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'if'
        self.consume_punct(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.consume_punct(TokenKind::RParen, "')'")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch =
            if self.match_kw(Keyword::Else) { Some(Box::new(self.parse_statement()?)) } else { None };
        Some(Stmt::new(StmtKind::If { cond, then_branch, else_branch }, start))
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'while'
        self.consume_punct(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.consume_punct(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Some(Stmt::new(StmtKind::While { cond, body }, start))
    }

    fn parse_for(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'for'
        self.consume_punct(TokenKind::LParen, "'('")?;

        let init: Option<Box<Stmt>> = if self.match_punct(TokenKind::Semicolon) {
            None
        } else if self.is_type_keyword() {
            Some(Box::new(self.parse_var_decl_typed()?))
        } else if self.is_kw(Keyword::Var) {
            Some(Box::new(self.parse_var_decl_auto()?))
        } else {
            let stmt_start = self.current_span();
            let e = self.parse_expr()?;
            self.consume_punct(TokenKind::Semicolon, "';'")?;
            Some(Box::new(Stmt::new(StmtKind::ExprStmt(e), stmt_start)))
        };

        let cond = if self.check_punct(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.consume_punct(TokenKind::Semicolon, "';'")?;

        let update = if self.check_punct(&TokenKind::RParen) { None } else { Some(self.parse_expr()?) };
        self.consume_punct(TokenKind::RParen, "')'")?;

        let body = Box::new(self.parse_statement()?);
        Some(Stmt::new(StmtKind::For { init, cond, update, body }, start))
    }

    fn parse_switch(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'switch'
        self.consume_punct(TokenKind::LParen, "'('")?;
        let subject = self.parse_expr()?;
        self.consume_punct(TokenKind::RParen, "')'")?;
        self.consume_punct(TokenKind::LBrace, "'{'")?;

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check_punct(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_kw(Keyword::Case) {
                let value = self.parse_expr()?;
                self.consume_punct(TokenKind::Colon, "':'")?;
                cases.push((value, self.parse_case_body()?));
            } else if self.match_kw(Keyword::Default) {
                self.consume_punct(TokenKind::Colon, "':'")?;
                default = Some(self.parse_case_body()?);
            } else {
                let found = self.describe_current();
                self.error_at_current(ParseErrorKind::InvalidDeclaration(format!(
                    "expected 'case' or 'default', found {found}"
                )));
                self.advance();
            }
        }
        self.consume_punct(TokenKind::RBrace, "'}'")?;
        Some(Stmt::new(StmtKind::Switch { subject, cases, default }, start))
    }

    fn parse_case_body(&mut self) -> Option<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.is_kw(Keyword::Case)
            && !self.is_kw(Keyword::Default)
            && !self.check_punct(&TokenKind::RBrace)
            && !self.is_at_end()
        {
            if let Some(s) = self.parse_statement() {
                body.push(s);
            }
            if self.panic_mode {
                self.synchronize();
            }
        }
        Some(body)
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'return'
        let value = if self.check_punct(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::Return(value), start))
    }

    fn parse_break(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance();
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::Break, start))
    }

    fn parse_continue(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance();
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::Continue, start))
    }

    fn parse_import(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // 'import'
        let path = self.consume_string("an import path string")?;
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::Import(path), start))
    }

    fn parse_expr_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        let e = self.parse_expr()?;
        self.consume_punct(TokenKind::Semicolon, "';'")?;
        Some(Stmt::new(StmtKind::ExprStmt(e), start))
    }

    /* ─────────────────────────── Expressions ─────────────────────────── */

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expr> {
        let target = self.parse_or()?;
        if self.match_punct(TokenKind::Assign) {
            let span = target.span;
            let value = Box::new(self.parse_assignment()?);
            return Some(match target.kind {
                ExprKind::Identifier(name) => Expr::new(ExprKind::Assign { name, value }, span),
                ExprKind::ArrayAccess { array, index } => {
                    Expr::new(ExprKind::ArrayAssign { array, index, value }, span)
                }
                ExprKind::StructAccess { object, field } => {
                    Expr::new(ExprKind::StructAssign { object, field, value }, span)
                }
                _ => {
                    self.error_at_current(ParseErrorKind::InvalidExpression(
                        "invalid assignment target".into(),
                    ));
                    Expr::new(ExprKind::Literal(Literal::Nil), span)
                }
            });
        }
        Some(target)
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_and()?;
        while self.match_punct(TokenKind::OrOr) {
            let right = self.parse_and()?;
            let span = left.span.join(right.span);
            left = Expr::new(
                ExprKind::Binary { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right) },
                span,
            );
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_bitor()?;
        while self.match_punct(TokenKind::AndAnd) {
            let right = self.parse_bitor()?;
            let span = left.span.join(right.span);
            left = Expr::new(
                ExprKind::Binary { op: BinaryOp::And, left: Box::new(left), right: Box::new(right) },
                span,
            );
        }
        Some(left)
    }

    fn parse_bitor(&mut self) -> Option<Expr> {
        let mut left = self.parse_bitxor()?;
        while self.match_punct(TokenKind::Pipe) {
            let right = self.parse_bitxor()?;
            let span = left.span.join(right.span);
            left = Expr::new(
                ExprKind::Binary { op: BinaryOp::BitOr, left: Box::new(left), right: Box::new(right) },
                span,
            );
        }
        Some(left)
    }

    fn parse_bitxor(&mut self) -> Option<Expr> {
        let mut left = self.parse_bitand()?;
        while self.match_punct(TokenKind::Caret) {
            let right = self.parse_bitand()?;
            let span = left.span.join(right.span);
            left = Expr::new(
                ExprKind::Binary { op: BinaryOp::BitXor, left: Box::new(left), right: Box::new(right) },
                span,
            );
        }
        Some(left)
    }

    fn parse_bitand(&mut self) -> Option<Expr> {
        let mut left = self.parse_equality()?;
        while self.match_punct(TokenKind::Amp) {
            let right = self.parse_equality()?;
            let span = left.span.join(right.span);
            left = Expr::new(
                ExprKind::Binary { op: BinaryOp::BitAnd, left: Box::new(left), right: Box::new(right) },
                span,
            );
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = if self.match_punct(TokenKind::EqualEqual) {
                BinaryOp::Eq
            } else if self.match_punct(TokenKind::BangEqual) {
                BinaryOp::NotEq
            } else {
                break;
            };
            let right = self.parse_comparison()?;
            let span = left.span.join(right.span);
            left = Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Some(left)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.match_punct(TokenKind::Less) {
                BinaryOp::Less
            } else if self.match_punct(TokenKind::LessEqual) {
                BinaryOp::LessEq
            } else if self.match_punct(TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.match_punct(TokenKind::GreaterEqual) {
                BinaryOp::GreaterEq
            } else {
                break;
            };
            let right = self.parse_term()?;
            let span = left.span.join(right.span);
            left = Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Some(left)
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = if self.match_punct(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_punct(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_factor()?;
            let span = left.span.join(right.span);
            left = Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Some(left)
    }

    fn parse_factor(&mut self) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.match_punct(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_punct(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_punct(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary()?;
            let span = left.span.join(right.span);
            left = Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek().kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Some(Expr::new(ExprKind::Unary { op, operand }, start));
        }
        self.parse_call()
    }

    fn parse_call(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen if matches!(expr.kind, ExprKind::Identifier(_)) => {
                    let call_start = expr.span;
                    self.advance();
                    let callee = match expr.kind {
                        ExprKind::Identifier(name) => name,
                        _ => unreachable!("guarded above"),
                    };
                    let args = self.parse_list(&TokenKind::RParen, |p| p.parse_expr())?;
                    let end = self.current_span();
                    self.consume_punct(TokenKind::RParen, "')'")?;
                    expr = Expr::new(ExprKind::Call { callee, args }, call_start.join(end));
                }
                TokenKind::LBracket => {
                    self.advance();
                    let array = Box::new(expr);
                    let start = array.span;
                    let index = Box::new(self.parse_expr()?);
                    let end = self.current_span();
                    self.consume_punct(TokenKind::RBracket, "']'")?;
                    expr = Expr::new(ExprKind::ArrayAccess { array, index }, start.join(end));
                }
                TokenKind::Dot => {
                    self.advance();
                    let object = Box::new(expr);
                    let start = object.span;
                    let field = self.consume_identifier("a field name")?;
                    let end = self.previous_span();
                    expr = Expr::new(ExprKind::StructAccess { object, field }, start.join(end));
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn is_cast_ahead(&self) -> bool {
        let mut i = self.pos + 1;
        let Some(tok) = self.tokens.get(i) else { return false };
        let is_type = matches!(
            tok.kind,
            TokenKind::Keyword(Keyword::Int | Keyword::Float | Keyword::StringType | Keyword::Bool | Keyword::Void)
        );
        if !is_type {
            return false;
        }
        i += 1;
        if matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::LBracket)) {
            i += 1;
            if !matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::RBracket)) {
                return false;
            }
            i += 1;
        }
        matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::RParen))
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        match self.peek().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Some(Expr::new(ExprKind::Literal(Literal::Number(n)), start))
            }
            TokenKind::String(s) => {
                self.advance();
                Some(Expr::new(ExprKind::Literal(Literal::String(s)), start))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Some(Expr::new(ExprKind::Literal(Literal::Bool(true)), start))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Some(Expr::new(ExprKind::Literal(Literal::Bool(false)), start))
            }
            TokenKind::Keyword(Keyword::Nil) => {
                self.advance();
                Some(Expr::new(ExprKind::Literal(Literal::Nil), start))
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.advance();
                self.consume_punct(TokenKind::LParen, "'('")?;
                let args = self.parse_list(&TokenKind::RParen, |p| p.parse_expr())?;
                let end = self.current_span();
                self.consume_punct(TokenKind::RParen, "')'")?;
                Some(Expr::new(ExprKind::Call { callee: "print".to_string(), args }, start.join(end)))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Some(Expr::new(ExprKind::Identifier(name), start))
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_list(&TokenKind::RBracket, |p| p.parse_expr())?;
                let end = self.current_span();
                self.consume_punct(TokenKind::RBracket, "']'")?;
                Some(Expr::new(ExprKind::ArrayLiteral(elements), start.join(end)))
            }
            TokenKind::LBrace => {
                self.advance();
                let fields = self.parse_list(&TokenKind::RBrace, |p| {
                    let name = p.consume_identifier("a field name")?;
                    p.consume_punct(TokenKind::Colon, "':'")?;
                    let value = p.parse_expr()?;
                    Some((name, value))
                })?;
                let end = self.current_span();
                self.consume_punct(TokenKind::RBrace, "'}'")?;
                Some(Expr::new(ExprKind::StructLiteral(fields), start.join(end)))
            }
            TokenKind::LParen if self.is_cast_ahead() => {
                self.advance(); // '('
                let target_type = self.parse_type()?;
                self.consume_punct(TokenKind::RParen, "')'")?;
                let expr = Box::new(self.parse_unary()?);
                Some(Expr::new(ExprKind::TypeCast { target_type, expr }, start))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.consume_punct(TokenKind::RParen, "')'")?;
                Some(inner)
            }
            _ => {
                let found = self.describe_current();
                self.error_at_current(ParseErrorKind::InvalidExpression(format!(
                    "unexpected token {found}"
                )));
                self.advance();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_lexer::lex;

    fn parse_src(src: &str) -> ParseOutcome {
        let (tokens, lex_errors) = lex(src);
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        parse(tokens, SourceId(0))
    }

    #[test]
    fn parses_a_function_with_arithmetic() {
        let out = parse_src("int add(int a, int b) { return a + b; }");
        assert!(!out.has_errors(), "{:?}", out.errors);
        assert_eq!(out.program.functions.len(), 1);
        let f = &out.program.functions[0];
        assert_eq!(f.name, "add");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.return_type, ScriptType::Int);
    }

    #[test]
    fn a_plain_typed_var_decl_is_not_mistaken_for_a_function() {
        let out = parse_src("int x = 1;");
        assert!(!out.has_errors(), "{:?}", out.errors);
        assert!(out.program.functions.is_empty());
        assert_eq!(out.program.statements.len(), 1);
    }

    #[test]
    fn a_void_function_with_no_params_parses() {
        let out = parse_src("void Main() { print(1); }");
        assert!(!out.has_errors(), "{:?}", out.errors);
        assert_eq!(out.program.functions.len(), 1);
        assert_eq!(out.program.functions[0].return_type, ScriptType::Void);
    }

    #[test]
    fn parses_var_decl_and_assignment() {
        let out = parse_src("var x = 5; x = x + 1;");
        assert!(!out.has_errors(), "{:?}", out.errors);
        assert_eq!(out.program.statements.len(), 2);
    }

    #[test]
    fn parses_array_literal_and_index() {
        let out = parse_src("var xs = [1, 2, 3]; var y = xs[0];");
        assert!(!out.has_errors(), "{:?}", out.errors);
    }

    #[test]
    fn parses_cast_expression() {
        let out = parse_src("var s = (string) 5;");
        assert!(!out.has_errors(), "{:?}", out.errors);
        let StmtKind::VarDecl { init: Some(e), .. } = &out.program.statements[0].kind else {
            panic!("expected var decl with init")
        };
        assert!(matches!(e.kind, ExprKind::TypeCast { target_type: ScriptType::StringType, .. }));
    }

    #[test]
    fn recovers_after_a_syntax_error_and_keeps_parsing() {
        let out = parse_src("var x = ; var y = 2;");
        assert!(out.has_errors());
        // The second declaration should still have been recovered and parsed.
        assert!(out.program.statements.iter().any(|s| matches!(
            &s.kind,
            StmtKind::VarDecl { name, .. } if name == "y"
        )));
    }

    #[test]
    fn switch_with_fallthrough_and_default() {
        let out = parse_src(
            "switch (1) { case 1: var a = 1; case 2: var b = 2; default: var c = 3; }",
        );
        assert!(!out.has_errors(), "{:?}", out.errors);
        let StmtKind::Switch { cases, default, .. } = &out.program.statements[0].kind else {
            panic!("expected switch")
        };
        assert_eq!(cases.len(), 2);
        assert!(default.is_some());
    }
}
