use tracing::trace;

use crate::{
    ast::{
        AssignOp, BinaryOp, Block, CaseLabel, DeclarationKind, Expr, ExprKind, Program,
        SpecialValue, Stmt, StmtKind, UnaryOp,
    },
    exception::EvalResult,
    function::ArgumentList,
    operations::{self, CompareResult},
    runtime::Runtime,
    value::{Reference, Value},
};

/// How a statement finished. Anything but `Normal` is an abrupt completion and
/// stops the enclosing block.
#[derive(Debug, Clone)]
pub enum Completion {
    Normal(Value),
    Return(Value),
    Break,
    Continue,
}

impl Runtime {
    /// Runs every statement in the current execution context and yields the value
    /// of the last one.
    pub fn run_program(&mut self, program: &Program) -> EvalResult<Value> {
        let mut last = Value::Undefined;
        for statement in &program.statements {
            match self.execute_statement(statement)? {
                Completion::Normal(value) => last = value,
                Completion::Return(_) => {
                    return Err(self.throw_exception("Cannot 'return' in global scope"))
                }
                Completion::Break => {
                    return Err(self.throw_exception("Cannot 'break' in global scope"))
                }
                Completion::Continue => {
                    return Err(self.throw_exception("Cannot 'continue' in global scope"))
                }
            }
        }
        Ok(last)
    }

    pub fn execute_statement(&mut self, statement: &Stmt) -> EvalResult<Completion> {
        match &statement.kind {
            StmtKind::Expression(expr) => Ok(Completion::Normal(self.evaluate(expr)?)),
            StmtKind::Block(block) => self.execute_block(block),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.to_bool() {
                    self.execute_statement(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_statement(branch)
                } else {
                    Ok(Completion::Normal(Value::Undefined))
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.to_bool() {
                    match self.execute_statement(body)? {
                        Completion::Normal(_) | Completion::Continue => {}
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let mut scope = self.push_scope();
                if let Some(init) = init {
                    scope.execute_statement(init)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !scope.evaluate(condition)?.to_bool() {
                            break;
                        }
                    }
                    match scope.execute_statement(body)? {
                        Completion::Normal(_) | Completion::Continue => {}
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                    }
                    if let Some(update) = update {
                        scope.evaluate(update)?;
                    }
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            StmtKind::Switch { subject, body } => {
                let subject = self.evaluate(subject)?.dereferenced();
                if body.needs_scope {
                    let mut scope = self.push_scope();
                    scope.execute_switch(&subject, body)
                } else {
                    self.execute_switch(&subject, body)
                }
            }
            StmtKind::Try {
                body,
                binding,
                handler,
            } => match self.execute_statement(body) {
                Ok(completion) => Ok(completion),
                Err(exception) => {
                    trace!(exception = %exception, "caught exception");
                    let mut scope = self.push_scope();
                    scope
                        .current_scope()
                        .allocate(binding.clone(), exception.into_value(), false);
                    scope.execute_statement(handler)
                }
            },
            StmtKind::Throw(expr) => {
                let value = self.evaluate(expr)?.dereferenced();
                Err(self.throw_value(value))
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?.dereferenced(),
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            StmtKind::Break => Ok(Completion::Break),
            StmtKind::Continue => Ok(Completion::Continue),
            StmtKind::Declaration {
                kind,
                name,
                initializer,
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?.dereferenced(),
                    None => Value::Undefined,
                };
                self.current_scope()
                    .allocate(name.clone(), value, *kind == DeclarationKind::Const);
                Ok(Completion::Normal(Value::Undefined))
            }
            StmtKind::Function(decl) => {
                let function = self.new_script_function(decl.clone());
                if let Some(name) = &decl.name {
                    self.current_scope()
                        .allocate(name.clone(), Value::Object(function), false);
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            StmtKind::Error(_) => Err(self.throw_exception("Cannot execute invalid statement")),
        }
    }

    /// Runs a block, in its own scope when it declares anything.
    pub fn execute_block(&mut self, block: &Block) -> EvalResult<Completion> {
        if block.needs_scope {
            let mut scope = self.push_scope();
            scope.execute_block_items(block)
        } else {
            self.execute_block_items(block)
        }
    }

    /// Runs the items of `block` in the current scope.
    pub fn execute_block_items(&mut self, block: &Block) -> EvalResult<Completion> {
        let mut last = Value::Undefined;
        for item in &block.items {
            match self.execute_statement(&item.statement)? {
                Completion::Normal(value) => last = value,
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    /// Starts at the first matching `case` (else `default`) and runs until the next
    /// label or a `break`.
    fn execute_switch(&mut self, subject: &Value, body: &Block) -> EvalResult<Completion> {
        let mut start = None;
        let mut default = None;
        for (index, item) in body.items.iter().enumerate() {
            match item.label {
                Some(CaseLabel::Case(label)) => {
                    if operations::compare(self, subject, &Value::Int(label))?
                        == CompareResult::Equal
                    {
                        start = Some(index);
                        break;
                    }
                }
                Some(CaseLabel::Default) => {
                    default.get_or_insert(index);
                }
                None => {}
            }
        }
        let Some(start) = start.or(default) else {
            return Ok(Completion::Normal(Value::Undefined));
        };

        let mut last = Value::Undefined;
        for (offset, item) in body.items[start..].iter().enumerate() {
            if offset > 0 && item.label.is_some() {
                break;
            }
            match self.execute_statement(&item.statement)? {
                Completion::Normal(value) => last = value,
                Completion::Break => break,
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    pub fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Integer(value) => Ok(Value::Int(*value)),
            ExprKind::String(text) => Ok(self.new_string(text.clone())),
            ExprKind::Identifier(name) => Ok(Value::Reference(self.resolve_identifier(name))),
            ExprKind::Special(special) => Ok(match special {
                SpecialValue::This => Value::Object(self.this_object()),
                SpecialValue::Global => Value::Object(self.global().clone()),
                SpecialValue::Null => Value::Null,
                SpecialValue::True => Value::Bool(true),
                SpecialValue::False => Value::Bool(false),
                SpecialValue::Undefined => Value::Undefined,
            }),
            ExprKind::Member { object, member } => {
                let object = self.evaluate(object)?.to_object(self)?;
                Ok(Value::Reference(object.get(member)))
            }
            ExprKind::Call { callee, args } => {
                let callee = self.evaluate(callee)?;
                let args = self.evaluate_arguments(args)?;
                callee.call(self, args)
            }
            ExprKind::Subscript { object, index } => {
                let object = self.evaluate(object)?.to_object(self)?;
                let index = self.evaluate(index)?.dereferenced();
                object.operator_subscript(self, &index)
            }
            ExprKind::New { callee, args } => {
                let wrapper = self.evaluate(callee)?.to_object(self)?;
                let Some(slot) = wrapper.get_without_side_effects("__construct") else {
                    return Err(self.throw_exception(format!(
                        "{} is not instantiable",
                        wrapper.type_name()
                    )));
                };
                let args = self.evaluate_arguments(args)?;
                let name = self.intern("__construct");
                Value::Reference(Reference::new(slot, Some(wrapper), Some(name))).call(self, args)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.evaluate(operand)?;
                match op {
                    UnaryOp::Not => Ok(operations::not(&operand)),
                    UnaryOp::BitwiseNot => operations::bitwise_not(self, &operand),
                    UnaryOp::Minus => operations::minus(self, &operand),
                    UnaryOp::Plus => operations::plus(self, &operand),
                    UnaryOp::PreIncrement => operations::prefix_increment(self, &operand),
                    UnaryOp::PreDecrement => operations::prefix_decrement(self, &operand),
                    UnaryOp::PostIncrement => operations::postfix_increment(self, &operand),
                    UnaryOp::PostDecrement => operations::postfix_decrement(self, &operand),
                }
            }
            ExprKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right),
            ExprKind::Assign { op, target, value } => {
                let target = self.evaluate(target)?;
                let reference = target.to_writable_reference(self)?;
                let rhs = self.evaluate(value)?;
                let new_value = match op {
                    AssignOp::Assign => rhs,
                    AssignOp::Add => operations::add(self, &target, &rhs)?,
                    AssignOp::Subtract => operations::subtract(self, &target, &rhs)?,
                    AssignOp::Multiply => operations::multiply(self, &target, &rhs)?,
                    AssignOp::Divide => operations::divide(self, &target, &rhs)?,
                    AssignOp::Modulo => operations::modulo(self, &target, &rhs)?,
                };
                let mut target = Value::Reference(reference);
                target.assign(self, &new_value)?;
                Ok(target)
            }
            ExprKind::Function(decl) => Ok(Value::Object(self.new_script_function(decl.clone()))),
            ExprKind::Error(_) => Err(self.throw_exception("Cannot evaluate invalid expression")),
        }
    }

    /// Arguments are passed by value.
    fn evaluate_arguments(&mut self, args: &[Expr]) -> EvalResult<ArgumentList> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg)?.dereferenced());
        }
        Ok(ArgumentList::new(values))
    }

    fn evaluate_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> EvalResult<Value> {
        match op {
            BinaryOp::And => {
                if !self.evaluate(left)?.to_bool() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.evaluate(right)?.to_bool()));
            }
            BinaryOp::Or => {
                if self.evaluate(left)?.to_bool() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.evaluate(right)?.to_bool()));
            }
            _ => {}
        }

        let lhs = self.evaluate(left)?;
        let rhs = self.evaluate(right)?;
        match op {
            BinaryOp::Add => operations::add(self, &lhs, &rhs),
            BinaryOp::Subtract => operations::subtract(self, &lhs, &rhs),
            BinaryOp::Multiply => operations::multiply(self, &lhs, &rhs),
            BinaryOp::Divide => operations::divide(self, &lhs, &rhs),
            BinaryOp::Modulo => operations::modulo(self, &lhs, &rhs),
            BinaryOp::Equal => {
                let result = operations::compare(self, &lhs, &rhs)?;
                Ok(Value::Bool(result == CompareResult::Equal))
            }
            BinaryOp::NotEqual => {
                let result = operations::compare(self, &lhs, &rhs)?;
                Ok(Value::Bool(result != CompareResult::Equal))
            }
            BinaryOp::Less => {
                let result = operations::compare(self, &lhs, &rhs)?;
                Ok(Value::Bool(result == CompareResult::Less))
            }
            BinaryOp::Greater => {
                let result = operations::compare(self, &lhs, &rhs)?;
                Ok(Value::Bool(result == CompareResult::Greater))
            }
            BinaryOp::LessEqual => {
                let result = operations::compare(self, &lhs, &rhs)?;
                Ok(Value::Bool(matches!(
                    result,
                    CompareResult::Less | CompareResult::Equal
                )))
            }
            BinaryOp::GreaterEqual => {
                let result = operations::compare(self, &lhs, &rhs)?;
                Ok(Value::Bool(matches!(
                    result,
                    CompareResult::Greater | CompareResult::Equal
                )))
            }
            BinaryOp::And | BinaryOp::Or => Ok(Value::Undefined),
        }
    }
}
