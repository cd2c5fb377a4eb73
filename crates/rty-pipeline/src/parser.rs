//! Recursive descent parser producing the AST.
//!
//! The grammar is the class-based scripting subset the checker understands:
//! class/module definitions with ancestors, method definitions with the
//! full argument-wrapper zoo, chained sends with parenthesized arguments
//! and brace blocks, assignments, control flow, and literals. Recovery is
//! per statement: a syntax error skips to the next terminator and parsing
//! continues, so one bad line does not hide the rest of the file.

use rty_ast::{
    helpers, Array, ArraySplat, Assign, Block, BlockArg, Break, ClassDef, ClassDefKind,
    Expression, Hash, HashSplat, If, InsSeq, KeywordArg, Literal, LiteralValue, MethodDef, Next,
    OptionalArg, Rescue, RescueCase, RestArg, Retry, Return, Self_, Send, UnresolvedIdent,
    VarKind, While, Yield, ZSuperArgs,
};
use rty_core::{errors, FileRef, Loc, QueuedError, SymbolRef};
use rty_intern::Name;
use thiserror::Error;

use crate::lexer::{Lexer, Token, TokenKind};

/// A recoverable parse failure.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The parser saw a token it has no rule for.
    #[error("unexpected {found}, expected {expected}")]
    Unexpected {
        /// Description of what was found.
        found: String,
        /// Description of what was expected.
        expected: String,
        /// Where.
        loc: Loc,
    },
    /// Input ended mid-construct.
    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof {
        /// Description of what was expected.
        expected: String,
        /// End-of-file location.
        loc: Loc,
    },
}

impl ParseError {
    fn loc(&self) -> Loc {
        match self {
            ParseError::Unexpected { loc, .. } | ParseError::UnexpectedEof { loc, .. } => *loc,
        }
    }

    /// Convert to a queued diagnostic.
    #[must_use]
    pub fn to_queued(&self) -> QueuedError {
        QueuedError::new(self.loc(), errors::parser::SYNTAX_ERROR, self.to_string())
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parse a file into a tree plus its syntax diagnostics.
#[must_use]
pub fn parse(src: &str, file: FileRef) -> (Expression, Vec<QueuedError>) {
    let mut parser = Parser::new(src, file);
    let tree = parser.parse_program();
    let diagnostics = parser.diagnostics;
    (tree, diagnostics)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: FileRef,
    end_pos: u32,
    diagnostics: Vec<QueuedError>,
}

impl Parser {
    fn new(src: &str, file: FileRef) -> Self {
        Self {
            tokens: Lexer::new(src).tokenize(),
            pos: 0,
            file,
            end_pos: src.len() as u32,
            diagnostics: Vec::new(),
        }
    }

    // --- cursor ---

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current_loc(&self) -> Loc {
        match self.current() {
            Some(t) => Loc::new(self.file, t.begin, t.end),
            None => Loc::new(self.file, self.end_pos, self.end_pos),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance().expect("checked"))
        } else {
            Err(self.unexpected(kind.description()))
        }
    }

    fn unexpected(&self, expected: String) -> ParseError {
        match self.current() {
            Some(t) => ParseError::Unexpected {
                found: t.kind.description(),
                expected,
                loc: Loc::new(self.file, t.begin, t.end),
            },
            None => ParseError::UnexpectedEof {
                expected,
                loc: Loc::new(self.file, self.end_pos, self.end_pos),
            },
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(Name, Loc)> {
        match self.current_kind() {
            Some(TokenKind::Ident(name)) => {
                let name = *name;
                let loc = self.current_loc();
                self.advance();
                Ok((name, loc))
            }
            _ => Err(self.unexpected("identifier".to_owned())),
        }
    }

    fn span(&self, begin: Loc, end: Loc) -> Loc {
        Loc::new(self.file, begin.begin_pos, end.end_pos)
    }

    // --- statement layer ---

    fn skip_terminators(&mut self) {
        while matches!(
            self.current_kind(),
            Some(TokenKind::Newline | TokenKind::Semi)
        ) {
            self.advance();
        }
    }

    fn expect_terminator(&mut self) -> ParseResult<()> {
        match self.current_kind() {
            Some(TokenKind::Newline | TokenKind::Semi) => {
                self.skip_terminators();
                Ok(())
            }
            // `end` directly after a header is tolerated: empty body.
            Some(TokenKind::End) | None => Ok(()),
            _ => Err(self.unexpected("newline".to_owned())),
        }
    }

    fn report(&mut self, err: &ParseError) {
        self.diagnostics.push(err.to_queued());
    }

    /// Skip ahead to the next plausible statement boundary.
    fn recover(&mut self) {
        while let Some(kind) = self.current_kind() {
            match kind {
                TokenKind::Newline | TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::End | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_program(&mut self) -> Expression {
        let stats = self.parse_stmts(&[]);
        let loc = Loc::new(self.file, 0, self.end_pos);
        Expression::InsSeq(InsSeq {
            loc,
            stats,
            expr: Box::new(helpers::empty_tree(loc)),
        })
    }

    fn parse_stmts(&mut self, stop: &[TokenKind]) -> Vec<Expression> {
        let mut stats = Vec::new();
        loop {
            self.skip_terminators();
            if self.at_eof() {
                break;
            }
            if stop.iter().any(|k| self.check(k)) {
                break;
            }
            let before = self.pos;
            match self.parse_stmt() {
                Ok(stat) => stats.push(stat),
                Err(err) => {
                    self.report(&err);
                    self.recover();
                    // Recovery stops short of `end`/`}` so enclosing
                    // constructs still close; if the offending token was
                    // one of those, step over it to guarantee progress.
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }
        stats
    }

    /// Fold a statement list into a single expression.
    fn into_seq(&self, loc: Loc, mut stats: Vec<Expression>) -> Expression {
        match stats.len() {
            0 => helpers::empty_tree(loc),
            1 => stats.pop().expect("length checked"),
            _ => {
                let expr = Box::new(stats.pop().expect("length checked"));
                Expression::InsSeq(InsSeq { loc, stats, expr })
            }
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Expression> {
        match self.current_kind() {
            Some(TokenKind::Class) => self.parse_class(ClassDefKind::Class),
            Some(TokenKind::Module) => self.parse_class(ClassDefKind::Module),
            Some(TokenKind::Def) => self.parse_method(),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::Begin) => self.parse_begin(),
            Some(TokenKind::Return) => {
                let kw = self.advance().expect("checked");
                let (loc, expr) = self.parse_jump_value(&kw)?;
                Ok(Expression::Return(Return {
                    loc,
                    expr: Box::new(expr),
                }))
            }
            Some(TokenKind::Yield) => {
                let kw = self.advance().expect("checked");
                let (loc, expr) = self.parse_jump_value(&kw)?;
                Ok(Expression::Yield(Yield {
                    loc,
                    expr: Box::new(expr),
                }))
            }
            Some(TokenKind::Break) => {
                let kw = self.advance().expect("checked");
                let (loc, expr) = self.parse_jump_value(&kw)?;
                Ok(Expression::Break(Break {
                    loc,
                    expr: Box::new(expr),
                }))
            }
            Some(TokenKind::Next) => {
                let kw = self.advance().expect("checked");
                let (loc, expr) = self.parse_jump_value(&kw)?;
                Ok(Expression::Next(Next {
                    loc,
                    expr: Box::new(expr),
                }))
            }
            Some(TokenKind::Retry) => {
                let kw = self.advance().expect("checked");
                Ok(Expression::Retry(Retry {
                    loc: Loc::new(self.file, kw.begin, kw.end),
                }))
            }
            _ => self.parse_expr_stmt(),
        }
    }

    /// The optional value after `return`/`yield`/`break`/`next`.
    fn parse_jump_value(&mut self, kw: &Token) -> ParseResult<(Loc, Expression)> {
        let kw_loc = Loc::new(self.file, kw.begin, kw.end);
        match self.current_kind() {
            None
            | Some(TokenKind::Newline | TokenKind::Semi | TokenKind::End | TokenKind::RBrace) => {
                Ok((kw_loc, helpers::empty_tree(kw_loc)))
            }
            _ => {
                let value = self.parse_expr()?;
                Ok((self.span(kw_loc, value.loc()), value))
            }
        }
    }

    fn parse_expr_stmt(&mut self) -> ParseResult<Expression> {
        let lhs = self.parse_expr()?;
        if self.eat(&TokenKind::Eq) {
            let rhs = self.parse_expr()?;
            let loc = self.span(lhs.loc(), rhs.loc());
            return Ok(Expression::Assign(Assign {
                loc,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }));
        }
        Ok(lhs)
    }

    // --- definitions ---

    fn parse_class(&mut self, kind: ClassDefKind) -> ParseResult<Expression> {
        let kw = self.advance().expect("checked");
        let kw_loc = Loc::new(self.file, kw.begin, kw.end);
        let name = self.parse_cpath()?;

        let mut ancestors = Vec::new();
        if kind == ClassDefKind::Class && self.eat(&TokenKind::Lt) {
            ancestors.push(self.parse_expr()?);
        }
        self.expect_terminator()?;

        let rhs = self.parse_stmts(&[TokenKind::End]);
        let end = self.expect(&TokenKind::End)?;

        Ok(Expression::ClassDef(ClassDef {
            loc: Loc::new(self.file, kw_loc.begin_pos, end.end),
            symbol: SymbolRef::NONE,
            name: Box::new(name),
            ancestors,
            rhs,
            kind,
        }))
    }

    fn parse_method(&mut self) -> ParseResult<Expression> {
        let kw = self.advance().expect("checked");

        let is_self = if self.check(&TokenKind::SelfKw) && self.kind_at(1) == Some(&TokenKind::Dot)
        {
            self.advance();
            self.advance();
            true
        } else {
            false
        };

        let (name, _) = self.expect_ident()?;

        let args = if self.eat(&TokenKind::LParen) {
            self.parse_method_args()?
        } else {
            Vec::new()
        };
        self.expect_terminator()?;

        let body_start = self.current_loc();
        let stats = self.parse_stmts(&[TokenKind::End]);
        let end = self.expect(&TokenKind::End)?;
        let body_loc = Loc::new(self.file, body_start.begin_pos, end.begin);
        let rhs = self.into_seq(body_loc, stats);

        Ok(Expression::MethodDef(MethodDef {
            loc: Loc::new(self.file, kw.begin, end.end),
            symbol: SymbolRef::NONE,
            name,
            args,
            rhs: Box::new(rhs),
            is_self,
        }))
    }

    fn parse_method_args(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();
        loop {
            self.skip_terminators();
            if self.check(&TokenKind::RParen) {
                break;
            }
            args.push(self.parse_method_arg()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.skip_terminators();
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_method_arg(&mut self) -> ParseResult<Expression> {
        match self.current_kind() {
            Some(TokenKind::Star) => {
                let star = self.advance().expect("checked");
                let (name, loc) = self.expect_ident()?;
                Ok(Expression::RestArg(RestArg {
                    loc: Loc::new(self.file, star.begin, loc.end_pos),
                    expr: Box::new(local_ref(loc, name)),
                }))
            }
            Some(TokenKind::StarStar) => {
                let star = self.advance().expect("checked");
                let (name, loc) = self.expect_ident()?;
                let full = Loc::new(self.file, star.begin, loc.end_pos);
                Ok(Expression::RestArg(RestArg {
                    loc: full,
                    expr: Box::new(Expression::KeywordArg(KeywordArg {
                        loc: full,
                        expr: Box::new(local_ref(loc, name)),
                    })),
                }))
            }
            Some(TokenKind::Amp) => {
                let amp = self.advance().expect("checked");
                let (name, loc) = self.expect_ident()?;
                Ok(Expression::BlockArg(BlockArg {
                    loc: Loc::new(self.file, amp.begin, loc.end_pos),
                    expr: Box::new(local_ref(loc, name)),
                }))
            }
            Some(TokenKind::Ident(_)) => {
                let (name, loc) = self.expect_ident()?;
                if self.eat(&TokenKind::Colon) {
                    let inner = Expression::KeywordArg(KeywordArg {
                        loc,
                        expr: Box::new(local_ref(loc, name)),
                    });
                    if matches!(
                        self.current_kind(),
                        Some(TokenKind::Comma | TokenKind::RParen) | None
                    ) {
                        return Ok(inner);
                    }
                    let default = self.parse_expr()?;
                    let full = self.span(loc, default.loc());
                    return Ok(Expression::OptionalArg(OptionalArg {
                        loc: full,
                        expr: Box::new(inner),
                        default: Box::new(default),
                    }));
                }
                if self.eat(&TokenKind::Eq) {
                    let default = self.parse_expr()?;
                    let full = self.span(loc, default.loc());
                    return Ok(Expression::OptionalArg(OptionalArg {
                        loc: full,
                        expr: Box::new(local_ref(loc, name)),
                        default: Box::new(default),
                    }));
                }
                Ok(local_ref(loc, name))
            }
            _ => Err(self.unexpected("method argument".to_owned())),
        }
    }

    // --- control flow ---

    fn parse_if(&mut self) -> ParseResult<Expression> {
        let kw = self.advance().expect("checked");
        let cond = self.parse_expr()?;
        if !self.eat(&TokenKind::Then) {
            self.expect_terminator()?;
        }

        let then_start = self.current_loc();
        let then_stats = self.parse_stmts(&[TokenKind::Else, TokenKind::End]);
        let thenp = self.into_seq(then_start, then_stats);

        let elsep = if self.eat(&TokenKind::Else) {
            let else_start = self.current_loc();
            let else_stats = self.parse_stmts(&[TokenKind::End]);
            self.into_seq(else_start, else_stats)
        } else {
            helpers::empty_tree(self.current_loc())
        };

        let end = self.expect(&TokenKind::End)?;
        Ok(Expression::If(If {
            loc: Loc::new(self.file, kw.begin, end.end),
            cond: Box::new(cond),
            thenp: Box::new(thenp),
            elsep: Box::new(elsep),
        }))
    }

    fn parse_while(&mut self) -> ParseResult<Expression> {
        let kw = self.advance().expect("checked");
        let cond = self.parse_expr()?;
        if !self.eat(&TokenKind::Do) {
            self.expect_terminator()?;
        }

        let body_start = self.current_loc();
        let stats = self.parse_stmts(&[TokenKind::End]);
        let body = self.into_seq(body_start, stats);

        let end = self.expect(&TokenKind::End)?;
        Ok(Expression::While(While {
            loc: Loc::new(self.file, kw.begin, end.end),
            cond: Box::new(cond),
            body: Box::new(body),
        }))
    }

    fn parse_begin(&mut self) -> ParseResult<Expression> {
        const BODY_STOPS: &[TokenKind] = &[
            TokenKind::Rescue,
            TokenKind::Else,
            TokenKind::Ensure,
            TokenKind::End,
        ];

        let kw = self.advance().expect("checked");
        self.expect_terminator()?;

        let body_start = self.current_loc();
        let body_stats = self.parse_stmts(BODY_STOPS);
        let body = self.into_seq(body_start, body_stats);

        let mut rescue_cases = Vec::new();
        while self.check(&TokenKind::Rescue) {
            let r_kw = self.advance().expect("checked");

            let mut exceptions = Vec::new();
            while matches!(self.current_kind(), Some(TokenKind::Const(_))) {
                exceptions.push(self.parse_cpath()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }

            let var = if self.eat(&TokenKind::FatArrow) {
                let (name, loc) = self.expect_ident()?;
                local_ref(loc, name)
            } else {
                helpers::empty_tree(self.current_loc())
            };
            self.expect_terminator()?;

            let case_start = self.current_loc();
            let case_stats = self.parse_stmts(BODY_STOPS);
            let case_body = self.into_seq(case_start, case_stats);

            rescue_cases.push(Expression::RescueCase(RescueCase {
                loc: Loc::new(self.file, r_kw.begin, case_body.loc().end_pos.max(r_kw.end)),
                exceptions,
                var: Box::new(var),
                body: Box::new(case_body),
            }));
        }

        let else_ = if self.eat(&TokenKind::Else) {
            let start = self.current_loc();
            let stats = self.parse_stmts(&[TokenKind::Ensure, TokenKind::End]);
            self.into_seq(start, stats)
        } else {
            helpers::empty_tree(self.current_loc())
        };

        let ensure = if self.eat(&TokenKind::Ensure) {
            let start = self.current_loc();
            let stats = self.parse_stmts(&[TokenKind::End]);
            self.into_seq(start, stats)
        } else {
            helpers::empty_tree(self.current_loc())
        };

        let end = self.expect(&TokenKind::End)?;
        Ok(Expression::Rescue(Rescue {
            loc: Loc::new(self.file, kw.begin, end.end),
            body: Box::new(body),
            rescue_cases,
            else_: Box::new(else_),
            ensure: Box::new(ensure),
        }))
    }

    // --- expressions ---

    fn parse_expr(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        while self.eat(&TokenKind::Dot) {
            let (fun, fun_loc) = self.expect_ident()?;
            let args = if self.check(&TokenKind::LParen) {
                self.parse_call_args()?
            } else {
                Vec::new()
            };
            let block = self.maybe_brace_block()?;
            let end_loc = match &block {
                Some(b) => b.loc(),
                None => args.last().map_or(fun_loc, Expression::loc),
            };
            let loc = self.span(expr.loc(), end_loc);
            expr = Expression::Send(Send {
                loc,
                recv: Box::new(expr),
                fun,
                args,
                block: block.map(Box::new),
            });
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let loc = self.current_loc();
        match self.current_kind() {
            Some(TokenKind::Integer(v)) => {
                let value = LiteralValue::Integer(*v);
                self.advance();
                Ok(Expression::Literal(Literal { loc, value }))
            }
            Some(TokenKind::Float(v)) => {
                let value = LiteralValue::Float(*v);
                self.advance();
                Ok(Expression::Literal(Literal { loc, value }))
            }
            Some(TokenKind::StringLit(v)) => {
                let value = LiteralValue::String(*v);
                self.advance();
                Ok(Expression::Literal(Literal { loc, value }))
            }
            Some(TokenKind::SymbolLit(v)) => {
                let value = LiteralValue::Symbol(*v);
                self.advance();
                Ok(Expression::Literal(Literal { loc, value }))
            }
            Some(TokenKind::Nil) => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    loc,
                    value: LiteralValue::Nil,
                }))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    loc,
                    value: LiteralValue::Boolean(true),
                }))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    loc,
                    value: LiteralValue::Boolean(false),
                }))
            }
            Some(TokenKind::SelfKw) => {
                self.advance();
                Ok(Expression::Self_(Self_ {
                    loc,
                    claz: SymbolRef::NONE,
                }))
            }
            Some(TokenKind::IVar(name)) => {
                let name = *name;
                self.advance();
                Ok(Expression::UnresolvedIdent(UnresolvedIdent {
                    loc,
                    kind: VarKind::Instance,
                    name,
                }))
            }
            Some(TokenKind::CVar(name)) => {
                let name = *name;
                self.advance();
                Ok(Expression::UnresolvedIdent(UnresolvedIdent {
                    loc,
                    kind: VarKind::Class,
                    name,
                }))
            }
            Some(TokenKind::GVar(name)) => {
                let name = *name;
                self.advance();
                Ok(Expression::UnresolvedIdent(UnresolvedIdent {
                    loc,
                    kind: VarKind::Global,
                    name,
                }))
            }
            Some(TokenKind::Const(_)) => self.parse_cpath(),
            Some(TokenKind::Super) => {
                self.advance();
                Ok(Expression::Send(Send {
                    loc,
                    recv: Box::new(helpers::empty_tree(loc)),
                    fun: Name::intern("super"),
                    args: vec![Expression::ZSuperArgs(ZSuperArgs { loc })],
                    block: None,
                }))
            }
            Some(TokenKind::Ident(name)) => {
                let name = *name;
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    let block = self.maybe_brace_block()?;
                    let end_loc = match &block {
                        Some(b) => b.loc(),
                        None => args.last().map_or(loc, Expression::loc),
                    };
                    return Ok(Expression::Send(Send {
                        loc: self.span(loc, end_loc),
                        recv: Box::new(helpers::empty_tree(loc)),
                        fun: name,
                        args,
                        block: block.map(Box::new),
                    }));
                }
                if self.check(&TokenKind::LBrace) {
                    let block = self.maybe_brace_block()?.expect("checked");
                    return Ok(Expression::Send(Send {
                        loc: self.span(loc, block.loc()),
                        recv: Box::new(helpers::empty_tree(loc)),
                        fun: name,
                        args: Vec::new(),
                        block: Some(Box::new(block)),
                    }));
                }
                Ok(local_ref(loc, name))
            }
            Some(TokenKind::LBracket) => self.parse_array(),
            Some(TokenKind::LBrace) => self.parse_hash(),
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression".to_owned())),
        }
    }

    /// A `Foo::Bar::Baz` constant chain.
    fn parse_cpath(&mut self) -> ParseResult<Expression> {
        let loc = self.current_loc();
        let Some(TokenKind::Const(name)) = self.current_kind() else {
            return Err(self.unexpected("constant".to_owned()));
        };
        let name = *name;
        self.advance();
        let mut path = helpers::constant(loc, helpers::empty_tree(loc), name);

        while self.check(&TokenKind::ColonColon)
            && matches!(self.kind_at(1), Some(TokenKind::Const(_)))
        {
            self.advance();
            let seg_loc = self.current_loc();
            let Some(TokenKind::Const(seg)) = self.current_kind() else {
                unreachable!("peeked");
            };
            let seg = *seg;
            self.advance();
            path = helpers::constant(self.span(loc, seg_loc), path, seg);
        }
        Ok(path)
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(&TokenKind::LParen)?;

        let mut args = Vec::new();
        let mut kw_keys = Vec::new();
        let mut kw_values = Vec::new();

        loop {
            self.skip_terminators();
            if self.check(&TokenKind::RParen) {
                break;
            }
            if matches!(self.current_kind(), Some(TokenKind::Ident(_)))
                && self.kind_at(1) == Some(&TokenKind::Colon)
            {
                let (key, key_loc) = self.expect_ident()?;
                self.advance(); // the colon
                let value = self.parse_expr()?;
                kw_keys.push(Expression::Literal(Literal {
                    loc: key_loc,
                    value: LiteralValue::Symbol(key),
                }));
                kw_values.push(value);
            } else if self.check(&TokenKind::Star) {
                let star = self.advance().expect("checked");
                let arg = self.parse_expr()?;
                let loc = Loc::new(self.file, star.begin, arg.loc().end_pos);
                args.push(Expression::ArraySplat(ArraySplat {
                    loc,
                    arg: Box::new(arg),
                }));
            } else if self.check(&TokenKind::StarStar) {
                let star = self.advance().expect("checked");
                let arg = self.parse_expr()?;
                let loc = Loc::new(self.file, star.begin, arg.loc().end_pos);
                args.push(Expression::HashSplat(HashSplat {
                    loc,
                    arg: Box::new(arg),
                }));
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.skip_terminators();
        let rparen = self.expect(&TokenKind::RParen)?;

        if !kw_keys.is_empty() {
            let loc = Loc::new(
                self.file,
                kw_keys[0].loc().begin_pos,
                rparen.begin,
            );
            args.push(Expression::Hash(Hash {
                loc,
                keys: kw_keys,
                values: kw_values,
            }));
        }
        Ok(args)
    }

    fn maybe_brace_block(&mut self) -> ParseResult<Option<Expression>> {
        if !self.check(&TokenKind::LBrace) {
            return Ok(None);
        }
        let open = self.advance().expect("checked");

        let mut args = Vec::new();
        if self.eat(&TokenKind::Pipe) {
            loop {
                let (name, loc) = self.expect_ident()?;
                args.push(local_ref(loc, name));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Pipe)?;
        }

        let body_start = self.current_loc();
        let stats = self.parse_stmts(&[TokenKind::RBrace]);
        let close = self.expect(&TokenKind::RBrace)?;
        let body = self.into_seq(body_start, stats);

        Ok(Some(Expression::Block(Block {
            loc: Loc::new(self.file, open.begin, close.end),
            args,
            body: Box::new(body),
            symbol: SymbolRef::NONE,
        })))
    }

    fn parse_array(&mut self) -> ParseResult<Expression> {
        let open = self.advance().expect("checked");
        let mut elems = Vec::new();
        loop {
            self.skip_terminators();
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elems.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.skip_terminators();
        let close = self.expect(&TokenKind::RBracket)?;
        Ok(Expression::Array(Array {
            loc: Loc::new(self.file, open.begin, close.end),
            elems,
        }))
    }

    fn parse_hash(&mut self) -> ParseResult<Expression> {
        let open = self.advance().expect("checked");
        let mut keys = Vec::new();
        let mut values = Vec::new();
        loop {
            self.skip_terminators();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if matches!(self.current_kind(), Some(TokenKind::Ident(_)))
                && self.kind_at(1) == Some(&TokenKind::Colon)
            {
                let (key, key_loc) = self.expect_ident()?;
                self.advance(); // the colon
                keys.push(Expression::Literal(Literal {
                    loc: key_loc,
                    value: LiteralValue::Symbol(key),
                }));
            } else {
                keys.push(self.parse_expr()?);
                self.expect(&TokenKind::FatArrow)?;
            }
            values.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.skip_terminators();
        let close = self.expect(&TokenKind::RBrace)?;
        Ok(Expression::Hash(Hash {
            loc: Loc::new(self.file, open.begin, close.end),
            keys,
            values,
        }))
    }
}

/// An as-yet-unresolved local reference.
fn local_ref(loc: Loc, name: Name) -> Expression {
    Expression::UnresolvedIdent(UnresolvedIdent {
        loc,
        kind: VarKind::Local,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rty_core::names;

    fn parse_ok(src: &str) -> Expression {
        let (tree, diags) = parse(src, FileRef::new(1));
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        tree
    }

    fn program_stats(tree: &Expression) -> &[Expression] {
        let Expression::InsSeq(seq) = tree else {
            panic!("programs parse to a sequence");
        };
        &seq.stats
    }

    #[test]
    fn parses_a_command_class_skeleton() {
        let tree = parse_ok(
            "class Foo < Opus::Command\n  sig.params(x: Integer).returns(Integer)\n  def call(x)\n    x\n  end\nend\n",
        );
        let stats = program_stats(&tree);
        assert_eq!(stats.len(), 1);

        let Expression::ClassDef(klass) = &stats[0] else {
            panic!("expected a class");
        };
        assert_eq!(klass.kind, ClassDefKind::Class);
        assert_eq!(klass.ancestors.len(), 1);

        let ancestor = klass.ancestors[0].as_constant_lit().expect("constant");
        assert_eq!(ancestor.cnst, names::command());
        let scope = ancestor.scope.as_constant_lit().expect("scoped");
        assert_eq!(scope.cnst, names::opus());
        assert!(scope.scope.is_empty_tree());

        // Body: the sig chain, then the method.
        assert_eq!(klass.rhs.len(), 2);
        let sig = klass.rhs[0].as_send().expect("sig chain");
        assert!(sig.recv.as_send().is_some());
        let Expression::MethodDef(mdef) = &klass.rhs[1] else {
            panic!("expected the method");
        };
        assert_eq!(mdef.name, names::call());
        assert_eq!(mdef.args.len(), 1);
        assert!(!mdef.is_self);
    }

    #[test]
    fn parses_singleton_methods() {
        let tree = parse_ok("def self.run(a, b = 1, *rest, key: 2, &blk)\nend\n");
        let stats = program_stats(&tree);
        let Expression::MethodDef(mdef) = &stats[0] else {
            panic!("expected a method");
        };
        assert!(mdef.is_self);
        assert_eq!(mdef.args.len(), 5);
        assert!(matches!(mdef.args[0], Expression::UnresolvedIdent(_)));
        assert!(matches!(mdef.args[1], Expression::OptionalArg(_)));
        assert!(matches!(mdef.args[2], Expression::RestArg(_)));
        assert!(matches!(mdef.args[3], Expression::OptionalArg(_)));
        assert!(matches!(mdef.args[4], Expression::BlockArg(_)));
    }

    #[test]
    fn parses_brace_blocks() {
        let tree = parse_ok("items.each { |item| use(item) }\n");
        let stats = program_stats(&tree);
        let send = stats[0].as_send().expect("send");
        assert_eq!(send.fun.as_str(), "each");
        let Some(block) = &send.block else {
            panic!("expected a block");
        };
        let Expression::Block(block) = block.as_ref() else {
            panic!("expected a block node");
        };
        assert_eq!(block.args.len(), 1);
    }

    #[test]
    fn keyword_call_arguments_collect_into_a_hash() {
        let tree = parse_ok("params(x: Integer, y: String)\n");
        let stats = program_stats(&tree);
        let send = stats[0].as_send().expect("send");
        assert_eq!(send.args.len(), 1);
        let Expression::Hash(hash) = &send.args[0] else {
            panic!("expected a hash");
        };
        assert_eq!(hash.keys.len(), hash.values.len());
        assert_eq!(hash.keys.len(), 2);
    }

    #[test]
    fn parses_control_flow() {
        let tree = parse_ok(
            "begin\n  risky\nrescue Error => e\n  retry\nelse\n  ok\nensure\n  cleanup\nend\n",
        );
        let stats = program_stats(&tree);
        let Expression::Rescue(rescue) = &stats[0] else {
            panic!("expected a rescue");
        };
        assert_eq!(rescue.rescue_cases.len(), 1);
        let Expression::RescueCase(case) = &rescue.rescue_cases[0] else {
            panic!("expected a rescue case");
        };
        assert_eq!(case.exceptions.len(), 1);
        assert!(!case.var.is_empty_tree());
        assert!(!rescue.else_.is_empty_tree());
        assert!(!rescue.ensure.is_empty_tree());
    }

    #[test]
    fn syntax_errors_are_reported_and_recovered() {
        let (tree, diags) = parse("def 123\nx = 1\n", FileRef::new(1));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].class, errors::parser::SYNTAX_ERROR);
        // The assignment after the bad line still parses.
        let stats = program_stats(&tree);
        assert!(stats.iter().any(|s| matches!(s, Expression::Assign(_))));
    }

    #[test]
    fn stray_end_does_not_wedge_the_parser() {
        let (tree, diags) = parse("end\nx = 1\n", FileRef::new(1));
        assert_eq!(diags.len(), 1);
        let stats = program_stats(&tree);
        assert!(stats.iter().any(|s| matches!(s, Expression::Assign(_))));
    }

    #[test]
    fn unterminated_class_reports_eof() {
        let (_, diags) = parse("class Foo\n  def call\n  end\n", FileRef::new(1));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].formatted.contains("end of file"));
    }

    #[test]
    fn assignment_to_constants_parses_as_assign() {
        let tree = parse_ok("MAX = 10\n");
        let stats = program_stats(&tree);
        let Expression::Assign(assign) = &stats[0] else {
            panic!("expected an assignment");
        };
        assert!(assign.lhs.as_constant_lit().is_some());
    }

    #[test]
    fn super_forwards_arguments_implicitly() {
        let tree = parse_ok("super\n");
        let stats = program_stats(&tree);
        let send = stats[0].as_send().expect("send");
        assert!(matches!(send.args[0], Expression::ZSuperArgs(_)));
    }
}
