use crate::interpreter::Script;
use crate::interpreter::ast::{
    BinaryOp, Expr, ExprKind, GlobalKey, LogicalOp, NodeRef, Position, Stmt, StmtKind, Target,
    UnaryOp,
};
use crate::interpreter::value::Value;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Failure reported by a host when resolving an executor or condition.
#[derive(Debug)]
pub enum HostError {
    /// No operation is registered under the requested name.
    Undefined,
    /// The operation ran and failed.
    Failed(anyhow::Error),
}

/// Host trait implemented by runtimes that execute scripts.
pub trait InterpreterHost {
    /// Invoke the executor registered under `name`.
    fn invoke_executor(&mut self, name: &str, args: &[Value]) -> Result<Value, HostError>;
    /// Evaluate the condition registered under `name`.
    fn evaluate_condition(&mut self, name: &str, args: &[Value]) -> Result<bool, HostError>;
    /// Read a global variable.
    fn read_global(&self, name: &str) -> Option<Value>;
    /// Write a global variable.
    fn write_global(&mut self, name: &str, value: Value);
    /// Current wall-clock time, used by `cooldown`.
    fn now(&self) -> DateTime<Utc>;
}

/// Signal returned by an [`Interrupter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Keep interpreting.
    Continue,
    /// Stop now and treat the run as finished.
    Abort,
}

impl Interrupt {
    /// Map a boolean "abort?" answer onto the signal.
    pub fn from_abort(abort: bool) -> Self {
        if abort {
            Interrupt::Abort
        } else {
            Interrupt::Continue
        }
    }
}

/// Observer invoked before every statement and expression node.
pub trait Interrupter {
    /// Inspect the node about to be evaluated and the run state so far.
    fn on_node(&mut self, node: NodeRef<'_>, state: &RunState) -> Interrupt;
}

impl<F> Interrupter for F
where
    F: FnMut(NodeRef<'_>, &RunState) -> Interrupt,
{
    fn on_node(&mut self, node: NodeRef<'_>, state: &RunState) -> Interrupt {
        self(node, state)
    }
}

/// Interrupter that never aborts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverInterrupt;

impl Interrupter for NeverInterrupt {
    fn on_node(&mut self, _node: NodeRef<'_>, _state: &RunState) -> Interrupt {
        Interrupt::Continue
    }
}

/// Resource ceilings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of node visits.
    pub max_steps: u64,
    /// Maximum nesting of statement/expression evaluation.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_depth: 256,
        }
    }
}

/// Progress of a run, visible to the interrupter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    cooldown_end: Option<DateTime<Utc>>,
    steps: u64,
    depth: usize,
}

impl RunState {
    /// Cooldown end recorded by the most recent `cooldown` statement.
    pub fn cooldown_end(&self) -> Option<DateTime<Utc>> {
        self.cooldown_end
    }

    /// Whether a `cooldown` statement has executed in this run.
    pub fn is_cooldown(&self) -> bool {
        self.cooldown_end.is_some()
    }

    /// Nodes visited so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current evaluation depth.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Lifecycle of an [`Interpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Not started yet.
    Idle,
    /// Walking the tree.
    Running,
    /// Ran to the end of the script.
    Completed,
    /// Stopped by the interrupter.
    Aborted,
    /// Stopped by a runtime error.
    Failed,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every statement ran.
    Completed,
    /// The interrupter asked to stop.
    Aborted,
}

/// Runtime failure categories.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    /// Call to an executor that is not registered.
    #[error("undefined executor `#{0}`")]
    UndefinedExecutor(String),

    /// Call to a condition that is not registered.
    #[error("undefined condition `?{0}`")]
    UndefinedCondition(String),

    /// Read of a local that was never assigned.
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    /// Operand of the wrong dynamic type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// List or string index outside the valid range.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: i64,
        /// Length of the indexed value.
        len: usize,
    },

    /// Step or depth ceiling reached.
    #[error("implementation limit exceeded: {0}")]
    ImplementationLimitExceeded(String),

    /// An executor or condition returned an error.
    #[error("`{name}` failed: {message}")]
    Host {
        /// Executor or condition name.
        name: String,
        /// Host error text, including its cause chain.
        message: String,
    },

    /// `run` was called on an interpreter that already ran.
    #[error("interpreter has already run")]
    AlreadyRun,
}

/// Errors surfaced while executing a script.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {pos}")]
pub struct RuntimeError {
    /// What went wrong.
    pub kind: RuntimeErrorKind,
    /// Position of the failing node.
    pub pos: Position,
}

impl RuntimeError {
    fn new(kind: RuntimeErrorKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

enum Halt {
    Abort,
    Error(RuntimeError),
}

impl From<RuntimeError> for Halt {
    fn from(err: RuntimeError) -> Self {
        Halt::Error(err)
    }
}

type Exec<T> = std::result::Result<T, Halt>;

enum Flow {
    Normal,
    Break,
    Continue,
}

/// Single-use tree-walking interpreter bound to one compiled script.
pub struct Interpreter<H> {
    script: Arc<Script>,
    host: H,
    locals: HashMap<String, Value>,
    limits: Limits,
    state: RunState,
    status: RunStatus,
}

impl<H: InterpreterHost> Interpreter<H> {
    /// Create a new interpreter for the provided script and host.
    pub fn new(script: Arc<Script>, host: H, limits: Limits) -> Self {
        Self {
            script,
            host,
            locals: HashMap::new(),
            limits,
            state: RunState::default(),
            status: RunStatus::Idle,
        }
    }

    /// Seed a local binding before the run starts.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Seed several local bindings.
    pub fn bind_all(&mut self, vars: impl IntoIterator<Item = (String, Value)>) {
        self.locals.extend(vars);
    }

    /// Current value of a local.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Access the host (useful for inspection in tests).
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run state (cooldown, counters).
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Lifecycle status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Whether a `cooldown` statement has executed.
    pub fn is_cooldown(&self) -> bool {
        self.state.is_cooldown()
    }

    /// Cooldown end recorded by this run, if any.
    pub fn cooldown_end(&self) -> Option<DateTime<Utc>> {
        self.state.cooldown_end
    }

    /// Walk the whole script once.
    pub fn run(&mut self, interrupter: &mut dyn Interrupter) -> Result<Outcome, RuntimeError> {
        if self.status != RunStatus::Idle {
            return Err(RuntimeError::new(
                RuntimeErrorKind::AlreadyRun,
                Position::default(),
            ));
        }
        self.status = RunStatus::Running;

        let script = Arc::clone(&self.script);
        match self.exec_block(&script.program().statements, interrupter) {
            Ok(_) => {
                self.status = RunStatus::Completed;
                Ok(Outcome::Completed)
            }
            Err(Halt::Abort) => {
                debug!(target: "interpreter", steps = self.state.steps, "run aborted by interrupter");
                self.status = RunStatus::Aborted;
                Ok(Outcome::Aborted)
            }
            Err(Halt::Error(err)) => {
                trace!(target: "interpreter", error = %err, steps = self.state.steps, "run failed");
                self.status = RunStatus::Failed;
                Err(err)
            }
        }
    }

    fn visit(&mut self, node: NodeRef<'_>, interrupter: &mut dyn Interrupter) -> Exec<()> {
        self.state.steps += 1;
        if self.state.steps > self.limits.max_steps {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ImplementationLimitExceeded(format!(
                    "more than {} steps",
                    self.limits.max_steps
                )),
                node.pos(),
            )
            .into());
        }
        match interrupter.on_node(node, &self.state) {
            Interrupt::Continue => Ok(()),
            Interrupt::Abort => Err(Halt::Abort),
        }
    }

    fn enter(&mut self, pos: Position) -> Exec<()> {
        if self.state.depth >= self.limits.max_depth {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ImplementationLimitExceeded(format!(
                    "nesting deeper than {}",
                    self.limits.max_depth
                )),
                pos,
            )
            .into());
        }
        self.state.depth += 1;
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], interrupter: &mut dyn Interrupter) -> Exec<Flow> {
        for stmt in stmts {
            match self.exec(stmt, interrupter)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, interrupter: &mut dyn Interrupter) -> Exec<Flow> {
        self.visit(NodeRef::Stmt(stmt), interrupter)?;
        self.enter(stmt.pos)?;
        let flow = self.exec_inner(stmt, interrupter);
        self.state.depth -= 1;
        flow
    }

    fn exec_inner(&mut self, stmt: &Stmt, interrupter: &mut dyn Interrupter) -> Exec<Flow> {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let value = self.eval(value, interrupter)?;
                self.locals.insert(name.clone(), value);
            }
            StmtKind::Assign { target, value } => match target {
                Target::Local(name) => {
                    let value = self.eval(value, interrupter)?;
                    self.locals.insert(name.clone(), value);
                }
                Target::Global(key) => {
                    let key = self.global_key(key, stmt.pos, interrupter)?;
                    let value = self.eval(value, interrupter)?;
                    self.host.write_global(&key, value);
                }
            },
            StmtKind::Expr { expr } => {
                self.eval(expr, interrupter)?;
            }
            StmtKind::Executor { name, args } => {
                self.call_executor(name, args, stmt.pos, interrupter)?;
            }
            StmtKind::If { arms, otherwise } => {
                for arm in arms {
                    if self.eval_bool(&arm.condition, "if condition", interrupter)? {
                        return self.exec_block(&arm.body, interrupter);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body, interrupter);
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval_bool(condition, "while condition", interrupter)? {
                    if let Flow::Break = self.exec_block(body, interrupter)? {
                        break;
                    }
                }
            }
            StmtKind::ForIn {
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable, interrupter)? {
                    Value::List(items) => items,
                    Value::Str(text) => text.chars().map(|ch| Value::Str(ch.to_string())).collect(),
                    other => {
                        return Err(type_mismatch(
                            format!("cannot iterate over {}", other.type_name()),
                            iterable.pos,
                        ));
                    }
                };
                for item in items {
                    self.locals.insert(binding.clone(), item);
                    if let Flow::Break = self.exec_block(body, interrupter)? {
                        break;
                    }
                }
            }
            StmtKind::ForRange {
                binding,
                start,
                end,
                body,
            } => {
                let start = self.eval_int(start, "range start", interrupter)?;
                let end = self.eval_int(end, "range end", interrupter)?;
                for i in start..end {
                    self.locals.insert(binding.clone(), Value::Int(i));
                    if let Flow::Break = self.exec_block(body, interrupter)? {
                        break;
                    }
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Cooldown { seconds } => {
                let value = self.eval(seconds, interrupter)?;
                let secs = match value.as_f64() {
                    Some(secs) if secs.is_finite() && secs >= 0.0 => secs,
                    _ => {
                        return Err(type_mismatch(
                            format!(
                                "cooldown expects a non-negative number of seconds, found {}",
                                value
                            ),
                            seconds.pos,
                        ));
                    }
                };
                let millis = (secs * 1000.0).round();
                let end = (millis < i64::MAX as f64)
                    .then(|| Duration::try_milliseconds(millis as i64))
                    .flatten()
                    .and_then(|duration| self.host.now().checked_add_signed(duration));
                let Some(end) = end else {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ImplementationLimitExceeded(format!(
                            "cooldown of {} seconds is out of range",
                            value
                        )),
                        seconds.pos,
                    )
                    .into());
                };
                self.state.cooldown_end = Some(end);
            }
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr, interrupter: &mut dyn Interrupter) -> Exec<Value> {
        self.visit(NodeRef::Expr(expr), interrupter)?;
        self.enter(expr.pos)?;
        let value = self.eval_inner(expr, interrupter);
        self.state.depth -= 1;
        value
    }

    fn eval_inner(&mut self, expr: &Expr, interrupter: &mut dyn Interrupter) -> Exec<Value> {
        let pos = expr.pos;
        let value = match &expr.kind {
            ExprKind::Null => Value::Null,
            ExprKind::Bool { value } => Value::Bool(*value),
            ExprKind::Int { value } => Value::Int(*value),
            ExprKind::Float { value } => Value::Float(*value),
            ExprKind::Str { value } => Value::Str(value.clone()),
            ExprKind::List { items } => Value::List(self.eval_args(items, interrupter)?),
            ExprKind::Ident { name } => match self.locals.get(name) {
                Some(value) => value.clone(),
                None => {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::UndefinedVariable(name.clone()),
                        pos,
                    )
                    .into());
                }
            },
            ExprKind::Global { key } => {
                let key = self.global_key(key, pos, interrupter)?;
                self.host.read_global(&key).unwrap_or(Value::Null)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand, interrupter)?;
                unary_op(*op, operand).map_err(|kind| RuntimeError::new(kind, pos))?
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, interrupter)?;
                let rhs = self.eval(rhs, interrupter)?;
                binary_op(*op, lhs, rhs).map_err(|kind| RuntimeError::new(kind, pos))?
            }
            ExprKind::Logical { op, lhs, rhs } => {
                let lhs = self.eval_bool(lhs, "logical operand", interrupter)?;
                let result = match op {
                    LogicalOp::And if !lhs => false,
                    LogicalOp::Or if lhs => true,
                    _ => self.eval_bool(rhs, "logical operand", interrupter)?,
                };
                Value::Bool(result)
            }
            ExprKind::Member { object, field } => {
                let object = self.eval(object, interrupter)?;
                member(&object, field).map_err(|kind| RuntimeError::new(kind, pos))?
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object, interrupter)?;
                let index = self.eval(index, interrupter)?;
                index_value(&object, &index).map_err(|kind| RuntimeError::new(kind, pos))?
            }
            ExprKind::Executor { name, args } => {
                self.call_executor(name, args, pos, interrupter)?
            }
            ExprKind::Condition { name, args } => {
                let args = self.eval_args(args, interrupter)?;
                match self.host.evaluate_condition(name, &args) {
                    Ok(flag) => Value::Bool(flag),
                    Err(HostError::Undefined) => {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::UndefinedCondition(name.clone()),
                            pos,
                        )
                        .into());
                    }
                    Err(HostError::Failed(err)) => return Err(host_failure(name, err, pos)),
                }
            }
        };
        Ok(value)
    }

    fn eval_args(&mut self, args: &[Expr], interrupter: &mut dyn Interrupter) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, interrupter)?);
        }
        Ok(values)
    }

    fn eval_bool(
        &mut self,
        expr: &Expr,
        context: &str,
        interrupter: &mut dyn Interrupter,
    ) -> Exec<bool> {
        match self.eval(expr, interrupter)? {
            Value::Bool(flag) => Ok(flag),
            other => Err(type_mismatch(
                format!("{} must be a boolean, found {}", context, other.type_name()),
                expr.pos,
            )),
        }
    }

    fn eval_int(
        &mut self,
        expr: &Expr,
        context: &str,
        interrupter: &mut dyn Interrupter,
    ) -> Exec<i64> {
        match self.eval(expr, interrupter)? {
            Value::Int(num) => Ok(num),
            other => Err(type_mismatch(
                format!("{} must be an integer, found {}", context, other.type_name()),
                expr.pos,
            )),
        }
    }

    fn global_key(
        &mut self,
        key: &GlobalKey,
        pos: Position,
        interrupter: &mut dyn Interrupter,
    ) -> Exec<String> {
        match key {
            GlobalKey::Static(name) => Ok(name.clone()),
            GlobalKey::Dynamic(expr) => match self.eval(expr, interrupter)? {
                Value::Str(name) => Ok(name),
                other => Err(type_mismatch(
                    format!("global key must be a string, found {}", other.type_name()),
                    pos,
                )),
            },
        }
    }

    fn call_executor(
        &mut self,
        name: &str,
        args: &[Expr],
        pos: Position,
        interrupter: &mut dyn Interrupter,
    ) -> Exec<Value> {
        let args = self.eval_args(args, interrupter)?;
        match self.host.invoke_executor(name, &args) {
            Ok(value) => Ok(value),
            Err(HostError::Undefined) => Err(RuntimeError::new(
                RuntimeErrorKind::UndefinedExecutor(name.to_string()),
                pos,
            )
            .into()),
            Err(HostError::Failed(err)) => Err(host_failure(name, err, pos)),
        }
    }
}

fn type_mismatch(message: String, pos: Position) -> Halt {
    RuntimeError::new(RuntimeErrorKind::TypeMismatch(message), pos).into()
}

fn host_failure(name: &str, err: anyhow::Error, pos: Position) -> Halt {
    RuntimeError::new(
        RuntimeErrorKind::Host {
            name: name.to_string(),
            message: format!("{:#}", err),
        },
        pos,
    )
    .into()
}

fn unary_op(op: UnaryOp, operand: Value) -> Result<Value, RuntimeErrorKind> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Int(num)) => num
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::ArithmeticOverflow),
        (UnaryOp::Neg, Value::Float(num)) => Ok(Value::Float(-num)),
        (UnaryOp::Not, Value::Bool(flag)) => Ok(Value::Bool(!flag)),
        (UnaryOp::Neg, other) => Err(RuntimeErrorKind::TypeMismatch(format!(
            "cannot negate {}",
            other.type_name()
        ))),
        (UnaryOp::Not, other) => Err(RuntimeErrorKind::TypeMismatch(format!(
            "`!` expects a boolean, found {}",
            other.type_name()
        ))),
    }
}

fn binary_op(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeErrorKind> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => return Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            return compare(op, &lhs, &rhs);
        }
        _ => {}
    }

    match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Str(a), b) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, a, Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (op, Value::Int(a), Value::Int(b)) => int_op(op, a, b),
        (op, a @ (Value::Int(_) | Value::Float(_)), b @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            float_op(op, a, b)
        }
        (op, a, b) => Err(RuntimeErrorKind::TypeMismatch(format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeErrorKind> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(RuntimeErrorKind::DivisionByZero),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        _ => unreachable!("comparison operators are handled before arithmetic"),
    };
    result.map(Value::Int).ok_or(RuntimeErrorKind::ArithmeticOverflow)
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, RuntimeErrorKind> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(RuntimeErrorKind::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => unreachable!("comparison operators are handled before arithmetic"),
    };
    Ok(Value::Float(result))
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeErrorKind> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            lhs.as_f64().partial_cmp(&rhs.as_f64())
        }
        _ => {
            return Err(RuntimeErrorKind::TypeMismatch(format!(
                "cannot compare {} with {}",
                lhs.type_name(),
                rhs.type_name()
            )));
        }
    };
    // NaN compares false against everything.
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!("only ordering operators reach compare"),
    };
    Ok(Value::Bool(result))
}

fn member(object: &Value, field: &str) -> Result<Value, RuntimeErrorKind> {
    match (object, field) {
        (Value::Object(object), _) => Ok(object.field(field).unwrap_or(Value::Null)),
        (Value::List(items), "length") => Ok(Value::Int(items.len() as i64)),
        (Value::Str(text), "length") => Ok(Value::Int(text.chars().count() as i64)),
        (other, _) => Err(RuntimeErrorKind::TypeMismatch(format!(
            "{} has no field `{}`",
            other.type_name(),
            field
        ))),
    }
}

fn index_value(object: &Value, index: &Value) -> Result<Value, RuntimeErrorKind> {
    let Value::Int(idx) = index else {
        return Err(RuntimeErrorKind::TypeMismatch(format!(
            "index must be an integer, found {}",
            index.type_name()
        )));
    };
    let idx = *idx;
    match object {
        Value::List(items) => usize::try_from(idx)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or(RuntimeErrorKind::IndexOutOfBounds {
                index: idx,
                len: items.len(),
            }),
        Value::Str(text) => usize::try_from(idx)
            .ok()
            .and_then(|i| text.chars().nth(i))
            .map(|ch| Value::Str(ch.to_string()))
            .ok_or(RuntimeErrorKind::IndexOutOfBounds {
                index: idx,
                len: text.chars().count(),
            }),
        other => Err(RuntimeErrorKind::TypeMismatch(format!(
            "cannot index into {}",
            other.type_name()
        ))),
    }
}
