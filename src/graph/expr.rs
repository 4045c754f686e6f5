use std::fmt;
use std::ops;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{Function, ObjectId};
use crate::error::GraphError;

/// Operation performed by an expression node.
#[derive(Clone, Debug)]
pub enum Op {
    /// Free variable, bound when the owning function is called.
    Symbol(String),
    /// Literal value.
    Constant(f64),
    /// `-x`
    Neg,
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
    /// `tan(x)`
    Tan,
    /// `exp(x)`
    Exp,
    /// Natural logarithm.
    Log,
    /// `sqrt(x)`
    Sqrt,
    /// `tanh(x)`
    Tanh,
    /// `x + y`
    Add,
    /// `x - y`
    Sub,
    /// `x * y`
    Mul,
    /// `x / y`
    Div,
    /// `x ^ y`
    Pow,
    /// Four-quadrant arctangent of `y / x`, operands ordered `(y, x)`.
    Atan2,
    /// One output nonzero of a call to another function graph. Operands are the
    /// callee's input nonzeros, concatenated over its input ports.
    Call {
        /// Callee.
        function: Function,
        /// Index into the callee's concatenated output nonzeros.
        output: usize,
    },
}

impl Op {
    /// Number of operands a node with this operation takes.
    pub fn arity(&self) -> usize {
        match self {
            Op::Symbol(_) | Op::Constant(_) => 0,
            Op::Neg | Op::Sin | Op::Cos | Op::Tan | Op::Exp | Op::Log | Op::Sqrt | Op::Tanh => 1,
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow | Op::Atan2 => 2,
            Op::Call { function, .. } => function.nnz_in(),
        }
    }

    /// Short lowercase name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Symbol(_) => "symbol",
            Op::Constant(_) => "constant",
            Op::Neg => "neg",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Tan => "tan",
            Op::Exp => "exp",
            Op::Log => "log",
            Op::Sqrt => "sqrt",
            Op::Tanh => "tanh",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Pow => "pow",
            Op::Atan2 => "atan2",
            Op::Call { .. } => "call",
        }
    }
}

/// Shared scalar expression node.
///
/// Cloning an `Expr` clones the handle, not the node: both handles keep the
/// same [`ObjectId`] and compare equal under [`Expr::ptr_eq`].
#[derive(Clone)]
pub struct Expr(Rc<ExprNode>);

struct ExprNode {
    id: ObjectId,
    op: Op,
    operands: SmallVec<[Expr; 2]>,
}

impl Expr {
    /// New symbolic variable.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::build(Op::Symbol(name.into()), SmallVec::new())
    }

    /// New literal.
    pub fn constant(value: f64) -> Self {
        Self::build(Op::Constant(value), SmallVec::new())
    }

    /// Builds a node from an operation and its operands, checking the arity.
    pub fn from_parts(
        op: Op,
        operands: impl IntoIterator<Item = Expr>,
    ) -> Result<Self, GraphError> {
        let operands: SmallVec<[Expr; 2]> = operands.into_iter().collect();
        if operands.len() != op.arity() {
            return Err(GraphError::ArityMismatch {
                what: op.name(),
                expected: op.arity(),
                found: operands.len(),
            });
        }
        if let Op::Call { function, output } = &op {
            if *output >= function.nnz_out() {
                return Err(GraphError::InvalidArgument(format!(
                    "output {output} out of range for '{}' with {} output nonzeros",
                    function.name(),
                    function.nnz_out()
                )));
            }
        }
        Ok(Self::build(op, operands))
    }

    /// Node selecting output nonzero `output` of `function` applied to `args`.
    pub fn call(function: &Function, args: &[Expr], output: usize) -> Result<Self, GraphError> {
        Self::from_parts(
            Op::Call {
                function: function.clone(),
                output,
            },
            args.iter().cloned(),
        )
    }

    fn build(op: Op, operands: SmallVec<[Expr; 2]>) -> Self {
        Expr(Rc::new(ExprNode {
            id: ObjectId::next(),
            op,
            operands,
        }))
    }

    fn unary(op: Op, x: Expr) -> Self {
        let mut operands = SmallVec::new();
        operands.push(x);
        Self::build(op, operands)
    }

    fn binary(op: Op, x: Expr, y: Expr) -> Self {
        let mut operands = SmallVec::new();
        operands.push(x);
        operands.push(y);
        Self::build(op, operands)
    }

    /// Identity of the node.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Operation of the node.
    pub fn op(&self) -> &Op {
        &self.0.op
    }

    /// Operands, in evaluation order.
    pub fn operands(&self) -> &[Expr] {
        &self.0.operands
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the node is a symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self.0.op, Op::Symbol(_))
    }

    /// `sin(self)`
    pub fn sin(&self) -> Expr {
        Self::unary(Op::Sin, self.clone())
    }

    /// `cos(self)`
    pub fn cos(&self) -> Expr {
        Self::unary(Op::Cos, self.clone())
    }

    /// `tan(self)`
    pub fn tan(&self) -> Expr {
        Self::unary(Op::Tan, self.clone())
    }

    /// `exp(self)`
    pub fn exp(&self) -> Expr {
        Self::unary(Op::Exp, self.clone())
    }

    /// `ln(self)`
    pub fn ln(&self) -> Expr {
        Self::unary(Op::Log, self.clone())
    }

    /// `sqrt(self)`
    pub fn sqrt(&self) -> Expr {
        Self::unary(Op::Sqrt, self.clone())
    }

    /// `tanh(self)`
    pub fn tanh(&self) -> Expr {
        Self::unary(Op::Tanh, self.clone())
    }

    /// `self ^ exponent`
    pub fn pow(&self, exponent: &Expr) -> Expr {
        Self::binary(Op::Pow, self.clone(), exponent.clone())
    }

    /// `atan2(self, x)`, with `self` as the y coordinate.
    pub fn atan2(&self, x: &Expr) -> Expr {
        Self::binary(Op::Atan2, self.clone(), x.clone())
    }
}

impl fmt::Debug for Expr {
    // Shallow on purpose: operands are shown by id so shared or deep graphs
    // print in constant space.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.op {
            Op::Symbol(name) => write!(f, "Expr{}(symbol {name:?})", self.0.id),
            Op::Constant(v) => write!(f, "Expr{}(constant {v:?})", self.0.id),
            op => {
                write!(f, "Expr{}({}", self.0.id, op.name())?;
                for operand in self.0.operands.iter() {
                    write!(f, " {}", operand.0.id)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Drop for ExprNode {
    // Unlinks uniquely owned operands iteratively so long chains do not
    // exhaust the stack.
    fn drop(&mut self) {
        let mut pending: Vec<Expr> = self.operands.drain(..).collect();
        while let Some(expr) = pending.pop() {
            if let Ok(mut node) = Rc::try_unwrap(expr.0) {
                pending.extend(node.operands.drain(..));
            }
        }
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl ops::$trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self.clone(), rhs.clone())
            }
        }

        impl ops::$trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, Expr::constant(rhs))
            }
        }

        impl ops::$trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self.clone(), Expr::constant(rhs))
            }
        }

        impl ops::$trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, Expr::constant(self), rhs)
            }
        }
    };
}

binary_operator!(Add, add, Op::Add);
binary_operator!(Sub, sub, Op::Sub);
binary_operator!(Mul, mul, Op::Mul);
binary_operator!(Div, div, Op::Div);

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(Op::Neg, self)
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(Op::Neg, self.clone())
    }
}
