use std::rc::Rc;

use tracing::debug;

use crate::{
    ast::{
        AssignOp, BinaryOp, Block, BlockItem, CaseLabel, DeclarationKind, ErrorList, Expr,
        ExprKind, FunctionDecl, ParseError, Program, SpecialValue, Stmt, StmtKind, UnaryOp,
    },
    diagnostics::{Diagnostic, SourceSpan},
    interner::{Interner, Name},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Lexes and parses `source`. A lexer failure is returned as `Err`; parse errors are
/// embedded in the returned program and must be checked with `Program::is_error`.
pub fn parse_program(source: &str, interner: &mut Interner) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens, interner).parse_program();
    if program.is_error() {
        debug!(errors = program.errors.len(), "program has parse errors");
    }
    Ok(program)
}

type StatementProduction<'i> = fn(&mut Parser<'i>) -> Option<Stmt>;

/// Backtracking recursive-descent parser. Productions that do not apply return `None`
/// (or an error node) and the caller rewinds the cursor with `set_offset` before trying
/// the next alternative.
pub struct Parser<'i> {
    tokens: Vec<Token>,
    current: usize,
    interner: &'i mut Interner,
}

impl<'i> Parser<'i> {
    pub fn new(tokens: Vec<Token>, interner: &'i mut Interner) -> Self {
        Self {
            tokens,
            current: 0,
            interner,
        }
    }

    pub fn offset(&self) -> usize {
        self.current
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.current = offset.min(self.tokens.len().saturating_sub(1));
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        loop {
            while self.matches(TokenKind::Semicolon) {}
            if self.is_eof() {
                break;
            }
            let statement = self.parse_statement();
            if statement.is_error() {
                program.errors.extend(statement.errors().iter().cloned());
                program.statements.push(statement);
                break;
            }
            let requires_semicolon = statement.requires_semicolon();
            program.statements.push(statement);
            if requires_semicolon && !self.matches(TokenKind::Semicolon) && !self.is_eof() {
                program
                    .errors
                    .push(self.error_here("Expected ';' after statement"));
                break;
            }
        }
        program
    }

    pub fn parse_statement(&mut self) -> Stmt {
        let start = self.offset();
        let productions: [StatementProduction<'i>; 12] = [
            Self::parse_block_statement,
            Self::parse_if_statement,
            Self::parse_while_statement,
            Self::parse_for_statement,
            Self::parse_switch_statement,
            Self::parse_try_statement,
            Self::parse_throw_statement,
            Self::parse_return_statement,
            Self::parse_break_continue_statement,
            Self::parse_declaration,
            Self::parse_function_declaration,
            Self::parse_expression_statement,
        ];
        for production in productions {
            if let Some(statement) = production(self) {
                return statement;
            }
            self.set_offset(start);
        }
        Stmt::error(self.location(), "Expected statement")
    }

    fn parse_block_statement(&mut self) -> Option<Stmt> {
        if !self.check(TokenKind::LBrace) {
            return None;
        }
        let start = self.location();
        Some(match self.parse_block(false) {
            Ok(block) => Stmt {
                kind: StmtKind::Block(block),
                span: self.span_from(start),
            },
            Err(errors) => Stmt::with_errors(start, &errors),
        })
    }

    /// Parses `{ ... }`. With `labels` set each entry may carry a `case`/`default` label.
    fn parse_block(&mut self, labels: bool) -> Result<Block, ErrorList> {
        self.consume(TokenKind::LBrace, "Expected '{'")?;
        let mut block = Block::default();
        loop {
            while self.matches(TokenKind::Semicolon) {}
            if self.matches(TokenKind::RBrace) {
                return Ok(block);
            }
            if self.is_eof() {
                return Err(vec![self.error_here("Unclosed block statement")]);
            }
            let label = if labels {
                self.parse_case_label()?
            } else {
                None
            };
            let statement = self.parse_statement();
            if statement.is_error() {
                return Err(statement.errors().to_vec());
            }
            block.needs_scope |= statement.declares();
            let requires_semicolon = statement.requires_semicolon();
            block.items.push(BlockItem { label, statement });
            if requires_semicolon && !self.matches(TokenKind::Semicolon) {
                if self.matches(TokenKind::RBrace) {
                    return Ok(block);
                }
                return Err(vec![self.error_here("Expected ';' after statement")]);
            }
        }
    }

    fn parse_case_label(&mut self) -> Result<Option<CaseLabel>, ErrorList> {
        if self.matches_keyword(Keyword::Default) {
            self.consume(TokenKind::Colon, "Expected ':' after 'default'")?;
            return Ok(Some(CaseLabel::Default));
        }
        if !self.matches_keyword(Keyword::Case) {
            return Ok(None);
        }
        let negative = self.matches(TokenKind::Minus);
        if !self.check(TokenKind::Number) {
            return Err(vec![
                self.error_here("Expected integer literal in 'case' label")
            ]);
        }
        let token = self.advance();
        let value = parse_integer(&token.lexeme)
            .ok_or_else(|| vec![ParseError::new(token.span, "Invalid integer literal")])?;
        self.consume(TokenKind::Colon, "Expected ':' after 'case' label")?;
        Ok(Some(CaseLabel::Case(if negative { -value } else { value })))
    }

    fn parse_if_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::If) {
            return None;
        }
        Some(self.parse_if_rest(start).unwrap_or_else(|errors| Stmt::with_errors(start, &errors)))
    }

    fn parse_if_rest(&mut self, start: SourceSpan) -> Result<Stmt, ErrorList> {
        self.consume(TokenKind::LParen, "Expected '(' after 'if'")?;
        let condition = self.parse_expression_checked()?;
        self.consume(TokenKind::RParen, "Expected ')' after 'if' condition")?;
        let then_branch = self.parse_statement_checked()?;

        let checkpoint = self.offset();
        if then_branch.requires_semicolon() {
            self.matches(TokenKind::Semicolon);
        }
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement_checked()?))
        } else {
            self.set_offset(checkpoint);
            None
        };

        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span: self.span_from(start),
        })
    }

    fn parse_while_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::While) {
            return None;
        }
        Some(self.parse_while_rest(start).unwrap_or_else(|errors| Stmt::with_errors(start, &errors)))
    }

    fn parse_while_rest(&mut self, start: SourceSpan) -> Result<Stmt, ErrorList> {
        self.consume(TokenKind::LParen, "Expected '(' after 'while'")?;
        let condition = self.parse_expression_checked()?;
        self.consume(TokenKind::RParen, "Expected ')' after 'while' condition")?;
        let body = self.parse_statement_checked()?;
        Ok(Stmt {
            kind: StmtKind::While {
                condition,
                body: Box::new(body),
            },
            span: self.span_from(start),
        })
    }

    fn parse_for_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::For) {
            return None;
        }
        Some(self.parse_for_rest(start).unwrap_or_else(|errors| Stmt::with_errors(start, &errors)))
    }

    fn parse_for_rest(&mut self, start: SourceSpan) -> Result<Stmt, ErrorList> {
        self.consume(TokenKind::LParen, "Expected '(' after 'for'")?;

        let init = if self.matches(TokenKind::Semicolon) {
            None
        } else {
            let checkpoint = self.offset();
            let statement = match self.parse_declaration() {
                Some(declaration) => declaration,
                None => {
                    self.set_offset(checkpoint);
                    self.parse_expression_statement()
                        .unwrap_or_else(|| Stmt::error(self.location(), "Expected statement"))
                }
            };
            if statement.is_error() {
                return Err(statement.errors().to_vec());
            }
            self.consume(TokenKind::Semicolon, "Expected ';' after 'for' initializer")?;
            Some(Box::new(statement))
        };

        let condition = if self.matches(TokenKind::Semicolon) {
            None
        } else {
            let condition = self.parse_expression_checked()?;
            self.consume(TokenKind::Semicolon, "Expected ';' after 'for' condition")?;
            Some(condition)
        };

        let update = if self.matches(TokenKind::RParen) {
            None
        } else {
            let update = self.parse_expression_checked()?;
            self.consume(TokenKind::RParen, "Expected ')' after 'for' clauses")?;
            Some(update)
        };

        let body = self.parse_statement_checked()?;
        Ok(Stmt {
            kind: StmtKind::For {
                init,
                condition,
                update,
                body: Box::new(body),
            },
            span: self.span_from(start),
        })
    }

    fn parse_switch_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::Switch) {
            return None;
        }
        Some(self.parse_switch_rest(start).unwrap_or_else(|errors| Stmt::with_errors(start, &errors)))
    }

    fn parse_switch_rest(&mut self, start: SourceSpan) -> Result<Stmt, ErrorList> {
        self.consume(TokenKind::LParen, "Expected '(' after 'switch'")?;
        let subject = self.parse_expression_checked()?;
        self.consume(TokenKind::RParen, "Expected ')' after 'switch' value")?;
        if !self.check(TokenKind::LBrace) {
            return Err(vec![self.error_here("Expected '{' after 'switch' value")]);
        }
        let body = self.parse_block(true)?;
        Ok(Stmt {
            kind: StmtKind::Switch { subject, body },
            span: self.span_from(start),
        })
    }

    fn parse_try_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::Try) {
            return None;
        }
        Some(self.parse_try_rest(start).unwrap_or_else(|errors| Stmt::with_errors(start, &errors)))
    }

    fn parse_try_rest(&mut self, start: SourceSpan) -> Result<Stmt, ErrorList> {
        let body = self.parse_statement_checked()?;
        if body.requires_semicolon() {
            self.matches(TokenKind::Semicolon);
        }
        if !self.matches_keyword(Keyword::Catch) {
            return Err(vec![self.error_here("Expected 'catch' after 'try' body")]);
        }
        self.consume(TokenKind::LParen, "Expected '(' after 'catch'")?;
        let binding = self.consume_identifier("Expected variable name in 'catch'")?;
        self.consume(TokenKind::RParen, "Expected ')' after 'catch' variable")?;
        let handler = self.parse_statement_checked()?;
        Ok(Stmt {
            kind: StmtKind::Try {
                body: Box::new(body),
                binding,
                handler: Box::new(handler),
            },
            span: self.span_from(start),
        })
    }

    fn parse_throw_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::Throw) {
            return None;
        }
        let value = self.parse_expression();
        if value.is_error() {
            return Some(Stmt::with_errors(start, value.errors()));
        }
        Some(Stmt {
            kind: StmtKind::Throw(value),
            span: self.span_from(start),
        })
    }

    fn parse_return_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::Return) {
            return None;
        }
        if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) || self.is_eof() {
            return Some(Stmt {
                kind: StmtKind::Return(None),
                span: start,
            });
        }
        let value = self.parse_expression();
        if value.is_error() {
            return Some(Stmt::with_errors(start, value.errors()));
        }
        Some(Stmt {
            kind: StmtKind::Return(Some(value)),
            span: self.span_from(start),
        })
    }

    fn parse_break_continue_statement(&mut self) -> Option<Stmt> {
        let span = self.location();
        let kind = if self.matches_keyword(Keyword::Break) {
            StmtKind::Break
        } else if self.matches_keyword(Keyword::Continue) {
            StmtKind::Continue
        } else {
            return None;
        };
        Some(Stmt { kind, span })
    }

    fn parse_declaration(&mut self) -> Option<Stmt> {
        let start = self.location();
        let kind = if self.matches_keyword(Keyword::Let) {
            DeclarationKind::Let
        } else if self.matches_keyword(Keyword::Const) {
            DeclarationKind::Const
        } else {
            return None;
        };
        Some(
            self.parse_declaration_rest(kind, start)
                .unwrap_or_else(|errors| Stmt::with_errors(start, &errors)),
        )
    }

    fn parse_declaration_rest(
        &mut self,
        kind: DeclarationKind,
        start: SourceSpan,
    ) -> Result<Stmt, ErrorList> {
        let name = self.consume_identifier("Expected variable name")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression_checked()?)
        } else if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) || self.is_eof()
        {
            None
        } else {
            return Err(vec![
                self.error_here("Invalid operator for initializer, expected '='")
            ]);
        };
        if kind == DeclarationKind::Const && initializer.is_none() {
            return Err(vec![
                self.error_here("Expected initializer for 'const' declaration")
            ]);
        }
        Ok(Stmt {
            kind: StmtKind::Declaration {
                kind,
                name,
                initializer,
            },
            span: self.span_from(start),
        })
    }

    /// Only named functions are declarations; `function (...)` falls through to the
    /// expression statement production.
    fn parse_function_declaration(&mut self) -> Option<Stmt> {
        let start = self.location();
        if !self.matches_keyword(Keyword::Function) || !self.check(TokenKind::Identifier) {
            return None;
        }
        let name = self.advance();
        let name = self.interner.intern(&name.lexeme);
        Some(match self.parse_function_rest(Some(name), start) {
            Ok(function) => Stmt {
                kind: StmtKind::Function(Rc::new(function)),
                span: self.span_from(start),
            },
            Err(errors) => Stmt::with_errors(start, &errors),
        })
    }

    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let start = self.location();
        let expr = self.parse_expression();
        if expr.is_error() {
            return Some(Stmt::with_errors(start, expr.errors()));
        }
        Some(Stmt {
            span: expr.span,
            kind: StmtKind::Expression(expr),
        })
    }

    fn parse_function_rest(
        &mut self,
        name: Option<Name>,
        start: SourceSpan,
    ) -> Result<FunctionDecl, ErrorList> {
        self.consume(TokenKind::LParen, "Expected '('")?;
        let mut params = Vec::new();
        if !self.matches(TokenKind::RParen) {
            loop {
                params.push(self.consume_identifier("Expected argument name")?);
                if self.matches(TokenKind::Comma) {
                    continue;
                }
                self.consume(TokenKind::RParen, "Expected ',' or ')' in argument list")?;
                break;
            }
        }
        if !self.check(TokenKind::LBrace) {
            return Err(vec![self.error_here("Expected function body")]);
        }
        let body = self.parse_block(false)?;
        Ok(FunctionDecl {
            name,
            params,
            body,
            span: self.span_from(start),
        })
    }

    pub fn parse_expression(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let target = self.parse_logical_or();
        if target.is_error() {
            return target;
        }
        let op = match self.peek().kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Subtract,
            TokenKind::StarAssign => AssignOp::Multiply,
            TokenKind::SlashAssign => AssignOp::Divide,
            TokenKind::PercentAssign => AssignOp::Modulo,
            _ => return target,
        };
        self.advance();
        let value = self.parse_assignment();
        if value.is_error() {
            return value;
        }
        Expr {
            span: target.span.to(value.span),
            kind: ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
        }
    }

    fn parse_logical_or(&mut self) -> Expr {
        self.parse_binary_level(Self::parse_logical_and, |kind| match kind {
            TokenKind::DoublePipe => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_logical_and(&mut self) -> Expr {
        self.parse_binary_level(Self::parse_comparison, |kind| match kind {
            TokenKind::DoubleAmpersand => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Expr {
        self.parse_binary_level(Self::parse_additive, |kind| match kind {
            TokenKind::EqualEqual => Some(BinaryOp::Equal),
            TokenKind::BangEqual => Some(BinaryOp::NotEqual),
            TokenKind::Less => Some(BinaryOp::Less),
            TokenKind::LessEqual => Some(BinaryOp::LessEqual),
            TokenKind::Greater => Some(BinaryOp::Greater),
            TokenKind::GreaterEqual => Some(BinaryOp::GreaterEqual),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Expr {
        self.parse_binary_level(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Expr {
        self.parse_binary_level(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Multiply),
            TokenKind::Slash => Some(BinaryOp::Divide),
            TokenKind::Percent => Some(BinaryOp::Modulo),
            _ => None,
        })
    }

    /// One left-associative precedence level.
    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Self) -> Expr,
        operator: fn(TokenKind) -> Option<BinaryOp>,
    ) -> Expr {
        let mut left = operand(self);
        if left.is_error() {
            return left;
        }
        while let Some(op) = operator(self.peek().kind) {
            self.advance();
            let right = operand(self);
            if right.is_error() {
                return right;
            }
            left = Expr {
                span: left.span.to(right.span),
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.location();
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitwiseNot,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::PlusPlus => UnaryOp::PreIncrement,
            TokenKind::MinusMinus => UnaryOp::PreDecrement,
            TokenKind::Keyword(Keyword::New) => return self.parse_new(),
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary();
        if operand.is_error() {
            return operand;
        }
        Expr {
            span: start.to(operand.span),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        }
    }

    /// `new` binds to a primary with an optional `.member` chain; the argument list is
    /// mandatory and further postfix operators apply to the constructed object.
    fn parse_new(&mut self) -> Expr {
        let start = self.location();
        self.advance();
        let mut callee = self.parse_primary();
        if callee.is_error() {
            return callee;
        }
        while self.matches(TokenKind::Dot) {
            callee = match self.parse_member(callee) {
                Ok(member) => member,
                Err(error) => return error,
            };
        }
        if !self.matches(TokenKind::LParen) {
            return Expr::error(self.location(), "Expected '(' after 'new' expression");
        }
        let args = match self.parse_arguments() {
            Ok(args) => args,
            Err(errors) => {
                return Expr {
                    kind: ExprKind::Error(errors),
                    span: start,
                }
            }
        };
        let expr = Expr {
            kind: ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            span: self.span_from(start),
        };
        self.parse_postfix_operators(expr)
    }

    fn parse_postfix(&mut self) -> Expr {
        let primary = self.parse_primary();
        if primary.is_error() {
            return primary;
        }
        self.parse_postfix_operators(primary)
    }

    fn parse_postfix_operators(&mut self, mut expr: Expr) -> Expr {
        let start = expr.span;
        loop {
            if self.matches(TokenKind::Dot) {
                expr = match self.parse_member(expr) {
                    Ok(member) => member,
                    Err(error) => return error,
                };
            } else if self.matches(TokenKind::LParen) {
                let args = match self.parse_arguments() {
                    Ok(args) => args,
                    Err(errors) => {
                        return Expr {
                            kind: ExprKind::Error(errors),
                            span: start,
                        }
                    }
                };
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span: self.span_from(start),
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression();
                if index.is_error() {
                    return index;
                }
                if !self.matches(TokenKind::RBracket) {
                    return Expr::error(self.location(), "Expected ']' after subscript");
                }
                expr = Expr {
                    kind: ExprKind::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span: self.span_from(start),
                };
            } else if self.check(TokenKind::PlusPlus) || self.check(TokenKind::MinusMinus) {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    UnaryOp::PostIncrement
                } else {
                    UnaryOp::PostDecrement
                };
                expr = Expr {
                    kind: ExprKind::Unary {
                        op,
                        operand: Box::new(expr),
                    },
                    span: self.span_from(start),
                };
            } else {
                return expr;
            }
        }
    }

    /// Called after the `.`; member names may be keywords.
    fn parse_member(&mut self, object: Expr) -> Result<Expr, Expr> {
        let token = self.peek().clone();
        if !matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword(_)) {
            return Err(Expr::error(token.span, "Expected name in member expression"));
        }
        self.advance();
        let member = self.interner.intern(&token.lexeme);
        Ok(Expr {
            span: object.span.to(token.span),
            kind: ExprKind::Member {
                object: Box::new(object),
                member,
            },
        })
    }

    /// Called after the `(`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ErrorList> {
        let mut args = Vec::new();
        if self.matches(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression_checked()?);
            if self.matches(TokenKind::Comma) {
                continue;
            }
            self.consume(TokenKind::RParen, "Expected ',' or ')' in argument list")?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let token = self.peek().clone();
        let span = token.span;
        let kind = match token.kind {
            TokenKind::Number => match parse_integer(&token.lexeme) {
                Some(value) => ExprKind::Integer(value),
                None => return Expr::error(span, "Invalid integer literal"),
            },
            TokenKind::String => ExprKind::String(token.lexeme.clone()),
            TokenKind::Identifier => ExprKind::Identifier(self.interner.intern(&token.lexeme)),
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::This => ExprKind::Special(SpecialValue::This),
                Keyword::Global => ExprKind::Special(SpecialValue::Global),
                Keyword::Null => ExprKind::Special(SpecialValue::Null),
                Keyword::True => ExprKind::Special(SpecialValue::True),
                Keyword::False => ExprKind::Special(SpecialValue::False),
                Keyword::Undefined => ExprKind::Special(SpecialValue::Undefined),
                Keyword::Function => return self.parse_function_expression(),
                _ => return Expr::error(span, "Expected primary expression"),
            },
            TokenKind::LParen => return self.parse_parenthesized(),
            TokenKind::Invalid => {
                return Expr::error(span, format!("Unexpected character '{}'", token.lexeme))
            }
            _ => return Expr::error(span, "Expected primary expression"),
        };
        self.advance();
        Expr { kind, span }
    }

    fn parse_parenthesized(&mut self) -> Expr {
        let start = self.location();
        self.advance();
        let mut inner = self.parse_expression();
        if inner.is_error() {
            return inner;
        }
        if !self.matches(TokenKind::RParen) {
            return Expr::error(self.location(), "Unmatched '('");
        }
        inner.span = self.span_from(start);
        inner
    }

    fn parse_function_expression(&mut self) -> Expr {
        let start = self.location();
        self.advance();
        let name = if self.check(TokenKind::Identifier) {
            let token = self.advance();
            Some(self.interner.intern(&token.lexeme))
        } else {
            None
        };
        match self.parse_function_rest(name, start) {
            Ok(function) => Expr {
                kind: ExprKind::Function(Rc::new(function)),
                span: self.span_from(start),
            },
            Err(errors) => Expr {
                kind: ExprKind::Error(errors),
                span: start,
            },
        }
    }

    fn parse_expression_checked(&mut self) -> Result<Expr, ErrorList> {
        let expr = self.parse_expression();
        if expr.is_error() {
            return Err(expr.errors().to_vec());
        }
        Ok(expr)
    }

    fn parse_statement_checked(&mut self) -> Result<Stmt, ErrorList> {
        let statement = self.parse_statement();
        if statement.is_error() {
            return Err(statement.errors().to_vec());
        }
        Ok(statement)
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_eof() {
            self.current += 1;
        }
        token
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn is_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, ErrorList> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(vec![self.error_here(message)])
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Name, ErrorList> {
        let token = self.consume(TokenKind::Identifier, message)?;
        Ok(self.interner.intern(&token.lexeme))
    }

    /// Span of the current token, or the end of input.
    fn location(&self) -> SourceSpan {
        self.peek().span
    }

    fn span_from(&self, start: SourceSpan) -> SourceSpan {
        start.to(self.previous().span)
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError::new(self.location(), message)
    }
}

fn parse_integer(lexeme: &str) -> Option<i64> {
    match lexeme
        .strip_prefix("0x")
        .or_else(|| lexeme.strip_prefix("0X"))
    {
        Some(digits) => i64::from_str_radix(digits, 16).ok(),
        None => lexeme.parse().ok(),
    }
}
