use std::{fmt, rc::Rc};

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    interner::Name,
};

/// A positional parse failure embedded in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: SourceSpan,
    pub message: String,
}

impl ParseError {
    pub fn new(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, self.message.clone()).with_span(self.span)
    }
}

pub type ErrorList = Vec<ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialValue {
    This,
    Global,
    Null,
    True,
    False,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitwiseNot,
    Minus,
    Plus,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Integer(i64),
    String(String),
    Identifier(Name),
    Special(SpecialValue),
    Member {
        object: Box<Expr>,
        member: Name,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Subscript {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Function(Rc<FunctionDecl>),
    Error(ErrorList),
}

/// Shared between the tree and every function object created from it.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Option<Name>,
    pub params: Vec<Name>,
    pub body: Block,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseLabel {
    Case(i64),
    Default,
}

#[derive(Debug, Clone)]
pub struct BlockItem {
    pub label: Option<CaseLabel>,
    pub statement: Stmt,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub items: Vec<BlockItem>,
    /// Set when the block declares something and therefore needs its own scope.
    pub needs_scope: bool,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expression(Expr),
    Block(Block),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        subject: Expr,
        body: Block,
    },
    Try {
        body: Box<Stmt>,
        binding: Name,
        handler: Box<Stmt>,
    },
    Throw(Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    Declaration {
        kind: DeclarationKind,
        name: Name,
        initializer: Option<Expr>,
    },
    Function(Rc<FunctionDecl>),
    Error(ErrorList),
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub errors: ErrorList,
}

impl Expr {
    pub fn error(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            kind: ExprKind::Error(vec![ParseError::new(span, message)]),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error(_))
    }

    pub fn errors(&self) -> &[ParseError] {
        match &self.kind {
            ExprKind::Error(errors) => errors,
            _ => &[],
        }
    }
}

impl Stmt {
    pub fn error(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            kind: StmtKind::Error(vec![ParseError::new(span, message)]),
            span,
        }
    }

    pub fn with_errors(span: SourceSpan, errors: &[ParseError]) -> Self {
        Self {
            kind: StmtKind::Error(errors.to_vec()),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, StmtKind::Error(_))
    }

    pub fn errors(&self) -> &[ParseError] {
        match &self.kind {
            StmtKind::Error(errors) => errors,
            _ => &[],
        }
    }

    /// Block-shaped statements end with `}` and need no terminator; compound
    /// statements defer to the statement they end with.
    pub fn requires_semicolon(&self) -> bool {
        match &self.kind {
            StmtKind::Block(_)
            | StmtKind::Switch { .. }
            | StmtKind::Function(_)
            | StmtKind::Error(_) => false,
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => else_branch
                .as_ref()
                .unwrap_or(then_branch)
                .requires_semicolon(),
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => body.requires_semicolon(),
            StmtKind::Try { handler, .. } => handler.requires_semicolon(),
            _ => true,
        }
    }

    pub fn declares(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Declaration { .. } | StmtKind::Function(_)
        )
    }
}

impl Program {
    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors.iter().map(ParseError::to_diagnostic).collect()
    }
}

impl fmt::Display for SpecialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecialValue::This => "this",
            SpecialValue::Global => "global",
            SpecialValue::Null => "null",
            SpecialValue::True => "true",
            SpecialValue::False => "false",
            SpecialValue::Undefined => "undefined",
        })
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "!",
            UnaryOp::BitwiseNot => "~",
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        })
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Subtract => "-=",
            AssignOp::Multiply => "*=",
            AssignOp::Divide => "/=",
            AssignOp::Modulo => "%=",
        })
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Integer(value) => write!(f, "{value}"),
            ExprKind::String(value) => write!(f, "\"{value}\""),
            ExprKind::Identifier(name) => write!(f, "{name}"),
            ExprKind::Special(value) => write!(f, "{value}"),
            ExprKind::Member { object, member } => write!(f, "{object}.{member}"),
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Subscript { object, index } => write!(f, "{object}[{index}]"),
            ExprKind::New { callee, args } => {
                write!(f, "new {callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::PostIncrement | UnaryOp::PostDecrement => write!(f, "({operand}{op})"),
                _ => write!(f, "({op}{operand})"),
            },
            ExprKind::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprKind::Assign { op, target, value } => write!(f, "({target} {op} {value})"),
            ExprKind::Function(function) => write!(f, "{function}"),
            ExprKind::Error(_) => write!(f, "<error>"),
        }
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function")?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ") {}", self.body)
    }
}

impl fmt::Display for CaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseLabel::Case(value) => write!(f, "case {value}:"),
            CaseLabel::Default => write!(f, "default:"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for item in &self.items {
            write!(f, " ")?;
            if let Some(label) = &item.label {
                write!(f, "{label} ")?;
            }
            write!(f, "{}", item.statement)?;
            if item.statement.requires_semicolon() {
                write!(f, ";")?;
            }
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Expression(expr) => write!(f, "{expr}"),
            StmtKind::Block(block) => write!(f, "{block}"),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ({condition}) {then_branch}")?;
                if let Some(branch) = else_branch {
                    if then_branch.requires_semicolon() {
                        write!(f, ";")?;
                    }
                    write!(f, " else {branch}")?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => write!(f, "while ({condition}) {body}"),
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                write!(f, "for (")?;
                if let Some(init) = init {
                    write!(f, "{init}")?;
                }
                write!(f, ";")?;
                if let Some(condition) = condition {
                    write!(f, " {condition}")?;
                }
                write!(f, ";")?;
                if let Some(update) = update {
                    write!(f, " {update}")?;
                }
                write!(f, ") {body}")
            }
            StmtKind::Switch { subject, body } => write!(f, "switch ({subject}) {body}"),
            StmtKind::Try {
                body,
                binding,
                handler,
            } => {
                write!(f, "try {body}")?;
                if body.requires_semicolon() {
                    write!(f, ";")?;
                }
                write!(f, " catch ({binding}) {handler}")
            }
            StmtKind::Throw(expr) => write!(f, "throw {expr}"),
            StmtKind::Return(Some(expr)) => write!(f, "return {expr}"),
            StmtKind::Return(None) => write!(f, "return"),
            StmtKind::Break => write!(f, "break"),
            StmtKind::Continue => write!(f, "continue"),
            StmtKind::Declaration {
                kind,
                name,
                initializer,
            } => {
                let keyword = match kind {
                    DeclarationKind::Let => "let",
                    DeclarationKind::Const => "const",
                };
                write!(f, "{keyword} {name}")?;
                if let Some(init) = initializer {
                    write!(f, " = {init}")?;
                }
                Ok(())
            }
            StmtKind::Function(function) => write!(f, "{function}"),
            StmtKind::Error(_) => write!(f, "<error>"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, statement) in self.statements.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{statement}")?;
            if statement.requires_semicolon() {
                write!(f, ";")?;
            }
        }
        Ok(())
    }
}
