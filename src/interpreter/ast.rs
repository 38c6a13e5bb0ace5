use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based source location of a token or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number in characters, starting at 1.
    pub column: usize,
}

impl Position {
    /// Construct a position from line/column.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Compiled script: the ordered top-level statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements in source order.
    pub statements: Vec<Stmt>,
}

/// Statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Statement form.
    pub kind: StmtKind,
    /// Position of the first token of the statement.
    pub pos: Position,
}

/// Statement forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StmtKind {
    /// `let name = value`
    Let {
        /// Local being declared.
        name: String,
        /// Initial value.
        value: Expr,
    },
    /// `target = value`
    Assign {
        /// Where the value is written.
        target: Target,
        /// Value to write.
        value: Expr,
    },
    /// Expression evaluated for its side effects.
    Expr {
        /// The expression.
        expr: Expr,
    },
    /// `#Name a, b` executor call in statement position.
    Executor {
        /// Executor name as written after the sigil.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// `if` / `else if` / `else` chain.
    If {
        /// Condition/body pairs tried in order.
        arms: Vec<IfArm>,
        /// Body run when no arm matched.
        otherwise: Option<Vec<Stmt>>,
    },
    /// Pre-test loop.
    While {
        /// Loop condition.
        condition: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `for name in list { ... }`
    ForIn {
        /// Loop variable bound to each element.
        binding: String,
        /// Expression producing the list.
        iterable: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `for name in start..end { ... }` over a half-open integer range.
    ForRange {
        /// Loop variable bound to each integer.
        binding: String,
        /// Inclusive lower bound.
        start: Expr,
        /// Exclusive upper bound.
        end: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// Leave the innermost loop.
    Break,
    /// Skip to the next iteration of the innermost loop.
    Continue,
    /// `cooldown seconds`: records the cooldown end for this run.
    Cooldown {
        /// Duration in seconds.
        seconds: Expr,
    },
}

/// One `if`/`else if` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfArm {
    /// Boolean condition.
    pub condition: Expr,
    /// Statements run when the condition holds.
    pub body: Vec<Stmt>,
}

/// Assignable locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Target {
    /// Local variable.
    Local(String),
    /// Global variable in the shared store.
    Global(GlobalKey),
}

/// Key of a global variable access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum GlobalKey {
    /// `global.name`
    Static(String),
    /// `global[expr]`, the expression must evaluate to a string.
    Dynamic(Box<Expr>),
}

/// Expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Expression form.
    pub kind: ExprKind,
    /// Position of the expression's first (or operator) token.
    pub pos: Position,
}

/// Expression forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExprKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool {
        /// Literal value.
        value: bool,
    },
    /// Integer literal.
    Int {
        /// Literal value.
        value: i64,
    },
    /// Floating-point literal.
    Float {
        /// Literal value.
        value: f64,
    },
    /// String literal (escapes already decoded).
    Str {
        /// Literal value.
        value: String,
    },
    /// `[a, b, c]`
    List {
        /// Element expressions.
        items: Vec<Expr>,
    },
    /// Local variable reference.
    Ident {
        /// Variable name.
        name: String,
    },
    /// Global variable read.
    Global {
        /// Key being read.
        key: GlobalKey,
    },
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Strict binary operator.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Short-circuiting `&&` / `||`.
    Logical {
        /// Operator.
        op: LogicalOp,
        /// Left operand, always evaluated.
        lhs: Box<Expr>,
        /// Right operand, evaluated only when needed.
        rhs: Box<Expr>,
    },
    /// `object.field`
    Member {
        /// Object expression.
        object: Box<Expr>,
        /// Field name.
        field: String,
    },
    /// `value[index]`
    Index {
        /// Indexed expression.
        object: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// `#Name(args)` executor call whose result is used as a value.
    Executor {
        /// Executor name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// `?name(args)` condition evaluation.
    Condition {
        /// Condition name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

/// Strict binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinaryOp {
    /// Surface symbol, used in error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Borrowed view of the node the interpreter is about to evaluate.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    /// A statement.
    Stmt(&'a Stmt),
    /// An expression.
    Expr(&'a Expr),
}

impl NodeRef<'_> {
    /// Source position of the node.
    pub fn pos(&self) -> Position {
        match self {
            NodeRef::Stmt(stmt) => stmt.pos,
            NodeRef::Expr(expr) => expr.pos,
        }
    }

    /// Whether this node is a `cooldown` statement.
    pub fn is_cooldown(&self) -> bool {
        matches!(
            self,
            NodeRef::Stmt(Stmt {
                kind: StmtKind::Cooldown { .. },
                ..
            })
        )
    }
}
