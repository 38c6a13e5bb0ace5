use super::ast::{
    BinaryOp, Expr, ExprKind, GlobalKey, IfArm, LogicalOp, Position, Program, Stmt, StmtKind,
    Target, UnaryOp,
};
use super::lexer::{Keyword, Lexer, Punct, Token, TokenKind};
use super::{CompileError, ParseError, Result};

/// Parse script source text into a [`Program`].
pub fn parse_program(source: &str) -> Result<Program> {
    let mut parser = Parser::new(source)?;
    let mut statements = Vec::new();
    parser.skip_separators()?;
    while !parser.at(&TokenKind::Eof) {
        statements.push(parser.parse_stmt()?);
        parser.expect_stmt_end()?;
        parser.skip_separators()?;
    }
    Ok(Program { statements })
}

/// Deepest nesting of blocks, parenthesized or unary expressions accepted.
const MAX_NESTING: usize = 128;

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    loop_depth: usize,
    nesting: usize,
}

type ParseResult<T> = std::result::Result<T, CompileError>;

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(src);
        let current = next_token(&mut lexer)?;
        Ok(Self {
            lexer,
            current,
            loop_depth: 0,
            nesting: 0,
        })
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn at_punct(&self, punct: Punct) -> bool {
        self.current.kind == TokenKind::Punct(punct)
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current.kind == TokenKind::Keyword(keyword)
    }

    /// Consume the current token and scan the next one.
    fn bump(&mut self) -> ParseResult<Token> {
        if self.current.kind == TokenKind::Eof {
            return Ok(self.current.clone());
        }
        let next = next_token(&mut self.lexer)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn eat_punct(&mut self, punct: Punct) -> ParseResult<bool> {
        if self.at_punct(punct) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, punct: Punct) -> ParseResult<Token> {
        if self.at_punct(punct) {
            self.bump()
        } else {
            Err(self.unexpected(&format!("`{}`", punct.as_str())))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Token> {
        if self.at_keyword(keyword) {
            self.bump()
        } else {
            Err(self.unexpected(&format!("`{}`", keyword.as_str())))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match &self.current.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump()?;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        self.error_at(self.current.pos, expected, self.current.kind.to_string())
    }

    fn error_at(&self, pos: Position, expected: &str, found: String) -> CompileError {
        CompileError::Parse(ParseError {
            pos,
            expected: expected.to_string(),
            found,
        })
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error_at(
                self.current.pos,
                &format!("at most {} nested levels", MAX_NESTING),
                "nesting too deep".to_string(),
            ));
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn skip_separators(&mut self) -> ParseResult<()> {
        while self.at(&TokenKind::Newline) || self.at_punct(Punct::Semicolon) {
            self.bump()?;
        }
        Ok(())
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Punct(Punct::Semicolon)
                | TokenKind::Punct(Punct::RBrace)
        )
    }

    fn expect_stmt_end(&self) -> ParseResult<()> {
        if self.at_stmt_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_punct(Punct::LBrace)?;
        let mut body = Vec::new();
        self.skip_separators()?;
        while !self.at_punct(Punct::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.parse_stmt()?);
            self.expect_stmt_end()?;
            self.skip_separators()?;
        }
        self.bump()?;
        Ok(body)
    }

    fn parse_loop_body(&mut self) -> ParseResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let pos = self.current.pos;
        let kind = match &self.current.kind {
            TokenKind::Keyword(Keyword::Let) => {
                self.bump()?;
                let name = self.expect_ident()?;
                self.expect_punct(Punct::Assign)?;
                let value = self.parse_expr()?;
                StmtKind::Let { name, value }
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::While) => {
                self.bump()?;
                let condition = self.parse_expr()?;
                let body = self.parse_loop_body()?;
                StmtKind::While { condition, body }
            }
            TokenKind::Keyword(Keyword::For) => {
                self.bump()?;
                let binding = self.expect_ident()?;
                self.expect_keyword(Keyword::In)?;
                let first = self.parse_expr()?;
                if self.eat_punct(Punct::DotDot)? {
                    let end = self.parse_expr()?;
                    let body = self.parse_loop_body()?;
                    StmtKind::ForRange {
                        binding,
                        start: first,
                        end,
                        body,
                    }
                } else {
                    let body = self.parse_loop_body()?;
                    StmtKind::ForIn {
                        binding,
                        iterable: first,
                        body,
                    }
                }
            }
            TokenKind::Keyword(kw @ (Keyword::Break | Keyword::Continue)) => {
                let kw = *kw;
                if self.loop_depth == 0 {
                    return Err(self.error_at(
                        pos,
                        "statement",
                        format!("`{}` outside of a loop", kw.as_str()),
                    ));
                }
                self.bump()?;
                if kw == Keyword::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Keyword(Keyword::Cooldown) => {
                self.bump()?;
                let seconds = self.parse_expr()?;
                StmtKind::Cooldown { seconds }
            }
            TokenKind::Executor(name) => {
                let name = name.clone();
                self.bump()?;
                let args = if self.at_stmt_end() {
                    Vec::new()
                } else if self.eat_punct(Punct::LParen)? {
                    self.parse_args(Punct::RParen)?
                } else {
                    self.parse_bare_args()?
                };
                StmtKind::Executor { name, args }
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.at_punct(Punct::Assign) {
                    let target = match expr.kind {
                        ExprKind::Ident { name } => Target::Local(name),
                        ExprKind::Global { key } => Target::Global(key),
                        _ => return Err(self.unexpected("end of statement")),
                    };
                    self.bump()?;
                    let value = self.parse_expr()?;
                    StmtKind::Assign { target, value }
                } else {
                    StmtKind::Expr { expr }
                }
            }
        };
        Ok(Stmt { kind, pos })
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::If)?;
        let mut arms = Vec::new();
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        arms.push(IfArm { condition, body });

        let mut otherwise = None;
        while self.at_keyword(Keyword::Else) {
            self.bump()?;
            if self.at_keyword(Keyword::If) {
                self.bump()?;
                let condition = self.parse_expr()?;
                let body = self.parse_block()?;
                arms.push(IfArm { condition, body });
            } else {
                otherwise = Some(self.parse_block()?);
                break;
            }
        }
        Ok(StmtKind::If { arms, otherwise })
    }

    /// Comma-separated arguments up to the closing delimiter (already inside it).
    fn parse_args(&mut self, close: Punct) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat_punct(close)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat_punct(Punct::Comma)? {
                continue;
            }
            self.expect_punct(close)?;
            return Ok(args);
        }
    }

    /// Unparenthesized statement arguments: `#Name a, b`.
    fn parse_bare_args(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = vec![self.parse_expr()?];
        while self.eat_punct(Punct::Comma)? {
            args.push(self.parse_expr()?);
        }
        Ok(args)
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.nested(Self::parse_or)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at_punct(Punct::OrOr) {
            let pos = self.bump()?.pos;
            let rhs = self.parse_and()?;
            lhs = logical(LogicalOp::Or, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.at_punct(Punct::AndAnd) {
            let pos = self.bump()?.pos;
            let rhs = self.parse_equality()?;
            lhs = logical(LogicalOp::And, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_compare()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Punct(Punct::EqEq) => BinaryOp::Eq,
                TokenKind::Punct(Punct::NotEq) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            let pos = self.bump()?.pos;
            let rhs = self.parse_compare()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn parse_compare(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Punct(Punct::Lt) => BinaryOp::Lt,
                TokenKind::Punct(Punct::Le) => BinaryOp::Le,
                TokenKind::Punct(Punct::Gt) => BinaryOp::Gt,
                TokenKind::Punct(Punct::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            let pos = self.bump()?.pos;
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Punct(Punct::Plus) => BinaryOp::Add,
                TokenKind::Punct(Punct::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let pos = self.bump()?.pos;
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Punct(Punct::Star) => BinaryOp::Mul,
                TokenKind::Punct(Punct::Slash) => BinaryOp::Div,
                TokenKind::Punct(Punct::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            let pos = self.bump()?.pos;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.current.kind {
            TokenKind::Punct(Punct::Minus) => UnaryOp::Neg,
            TokenKind::Punct(Punct::Bang) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let pos = self.bump()?.pos;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.at_punct(Punct::Dot) {
                let pos = self.bump()?.pos;
                let field = self.expect_ident()?;
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        field,
                    },
                    pos,
                };
            } else if self.at_punct(Punct::LBracket) {
                let pos = self.bump()?.pos;
                let index = self.parse_expr()?;
                self.expect_punct(Punct::RBracket)?;
                expr = Expr {
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    pos,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let pos = self.current.pos;
        let kind = match &self.current.kind {
            TokenKind::Int(value) => {
                let value = *value;
                self.bump()?;
                ExprKind::Int { value }
            }
            TokenKind::Float(value) => {
                let value = *value;
                self.bump()?;
                ExprKind::Float { value }
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                self.bump()?;
                ExprKind::Str { value }
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump()?;
                ExprKind::Bool { value: true }
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump()?;
                ExprKind::Bool { value: false }
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump()?;
                ExprKind::Null
            }
            TokenKind::Keyword(Keyword::Global) => {
                self.bump()?;
                if self.eat_punct(Punct::Dot)? {
                    ExprKind::Global {
                        key: GlobalKey::Static(self.expect_ident()?),
                    }
                } else if self.eat_punct(Punct::LBracket)? {
                    let key = self.parse_expr()?;
                    self.expect_punct(Punct::RBracket)?;
                    ExprKind::Global {
                        key: GlobalKey::Dynamic(Box::new(key)),
                    }
                } else {
                    return Err(self.unexpected("`.` or `[` after `global`"));
                }
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump()?;
                ExprKind::Ident { name }
            }
            TokenKind::Executor(name) => {
                let name = name.clone();
                self.bump()?;
                self.expect_punct(Punct::LParen)?;
                let args = self.parse_args(Punct::RParen)?;
                ExprKind::Executor { name, args }
            }
            TokenKind::Condition(name) => {
                let name = name.clone();
                self.bump()?;
                let args = if self.eat_punct(Punct::LParen)? {
                    self.parse_args(Punct::RParen)?
                } else {
                    Vec::new()
                };
                ExprKind::Condition { name, args }
            }
            TokenKind::Punct(Punct::LBracket) => {
                self.bump()?;
                let items = self.parse_args(Punct::RBracket)?;
                ExprKind::List { items }
            }
            TokenKind::Punct(Punct::LParen) => {
                self.bump()?;
                let inner = self.parse_expr()?;
                self.expect_punct(Punct::RParen)?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr { kind, pos })
    }
}

fn next_token(lexer: &mut Lexer<'_>) -> ParseResult<Token> {
    match lexer.next() {
        Some(token) => Ok(token?),
        // The lexer only runs dry after handing out `Eof`, which the parser never bumps past.
        None => Ok(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            pos: Position::default(),
        }),
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, pos: Position) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        pos,
    }
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr, pos: Position) -> Expr {
    Expr {
        kind: ExprKind::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        pos,
    }
}
