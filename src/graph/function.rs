use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Expr, ObjectId, Op, Sparsity};
use crate::error::GraphError;

/// Named input or output of a [`Function`].
#[derive(Clone, Debug)]
pub struct Port {
    name: String,
    sparsity: Sparsity,
    nonzeros: Vec<Expr>,
}

impl Port {
    /// Port whose nonzeros follow `sparsity` in column-major order.
    pub fn new(
        name: impl Into<String>,
        sparsity: Sparsity,
        nonzeros: Vec<Expr>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        if nonzeros.len() != sparsity.nnz() {
            return Err(GraphError::ArityMismatch {
                what: "port nonzeros",
                expected: sparsity.nnz(),
                found: nonzeros.len(),
            });
        }
        Ok(Self {
            name,
            sparsity,
            nonzeros,
        })
    }

    /// Dense scalar port.
    pub fn scalar(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            sparsity: Sparsity::scalar(),
            nonzeros: vec![expr],
        }
    }

    /// Dense column port.
    pub fn column(name: impl Into<String>, exprs: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            sparsity: Sparsity::column(exprs.len()),
            nonzeros: exprs,
        }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port sparsity pattern.
    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    /// Port nonzeros.
    pub fn nonzeros(&self) -> &[Expr] {
        &self.nonzeros
    }

    /// Number of nonzeros.
    pub fn nnz(&self) -> usize {
        self.nonzeros.len()
    }
}

/// Named function graph: ordered input and output ports over a shared
/// expression DAG, with a fixed topological instruction order.
#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

struct FunctionInner {
    id: ObjectId,
    name: String,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    instructions: Vec<Expr>,
}

impl Function {
    /// Builds a function graph.
    ///
    /// Input nonzeros must be distinct symbols and every symbol reachable from
    /// an output must be one of them.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GraphError::InvalidArgument(
                "function name must be non-empty".into(),
            ));
        }
        let mut bound = FxHashSet::default();
        for port in &inputs {
            for nz in port.nonzeros() {
                if !nz.is_symbol() {
                    return Err(GraphError::InvalidArgument(format!(
                        "input '{}' of '{name}' has a non-symbolic nonzero",
                        port.name()
                    )));
                }
                if !bound.insert(nz.id()) {
                    return Err(GraphError::InvalidArgument(format!(
                        "symbol {nz:?} bound twice in '{name}'"
                    )));
                }
            }
        }
        let roots = inputs
            .iter()
            .chain(outputs.iter())
            .flat_map(|port| port.nonzeros().iter());
        let instructions = topological_order(roots);
        for node in &instructions {
            if let Op::Symbol(sym) = node.op() {
                if !bound.contains(&node.id()) {
                    return Err(GraphError::FreeSymbol(sym.clone()));
                }
            }
        }
        Ok(Function(Rc::new(FunctionInner {
            id: ObjectId::next(),
            name,
            inputs,
            outputs,
            instructions,
        })))
    }

    /// Identity of the graph.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Input ports.
    pub fn inputs(&self) -> &[Port] {
        &self.0.inputs
    }

    /// Output ports.
    pub fn outputs(&self) -> &[Port] {
        &self.0.outputs
    }

    /// Number of input ports.
    pub fn n_in(&self) -> usize {
        self.0.inputs.len()
    }

    /// Number of output ports.
    pub fn n_out(&self) -> usize {
        self.0.outputs.len()
    }

    /// Total number of input nonzeros.
    pub fn nnz_in(&self) -> usize {
        self.0.inputs.iter().map(Port::nnz).sum()
    }

    /// Total number of output nonzeros.
    pub fn nnz_out(&self) -> usize {
        self.0.outputs.iter().map(Port::nnz).sum()
    }

    /// Every node reachable from the ports, operands before their users.
    pub fn instructions(&self) -> &[Expr] {
        &self.0.instructions
    }

    /// Whether both handles point at the same graph.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Builds one call node per output nonzero of this function applied to `args`.
    pub fn apply(&self, args: &[Expr]) -> Result<Vec<Expr>, GraphError> {
        (0..self.nnz_out())
            .map(|k| Expr::call(self, args, k))
            .collect()
    }

    /// Evaluates the graph numerically. `args[i]` holds the nonzeros of input `i`.
    pub fn call(&self, args: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, GraphError> {
        if args.len() != self.n_in() {
            return Err(GraphError::ArityMismatch {
                what: "input ports",
                expected: self.n_in(),
                found: args.len(),
            });
        }
        let mut values: FxHashMap<ObjectId, f64> =
            FxHashMap::with_capacity_and_hasher(self.0.instructions.len(), Default::default());
        for (port, arg) in self.0.inputs.iter().zip(args) {
            if arg.len() != port.nnz() {
                return Err(GraphError::ArityMismatch {
                    what: "input nonzeros",
                    expected: port.nnz(),
                    found: arg.len(),
                });
            }
            for (sym, v) in port.nonzeros().iter().zip(arg) {
                values.insert(sym.id(), *v);
            }
        }
        for node in &self.0.instructions {
            let x = |i: usize| operand_value(&values, node, i);
            let value = match node.op() {
                Op::Symbol(_) => continue,
                Op::Constant(v) => *v,
                Op::Neg => -x(0)?,
                Op::Sin => x(0)?.sin(),
                Op::Cos => x(0)?.cos(),
                Op::Tan => x(0)?.tan(),
                Op::Exp => x(0)?.exp(),
                Op::Log => x(0)?.ln(),
                Op::Sqrt => x(0)?.sqrt(),
                Op::Tanh => x(0)?.tanh(),
                Op::Add => x(0)? + x(1)?,
                Op::Sub => x(0)? - x(1)?,
                Op::Mul => x(0)? * x(1)?,
                Op::Div => x(0)? / x(1)?,
                Op::Pow => x(0)?.powf(x(1)?),
                Op::Atan2 => x(0)?.atan2(x(1)?),
                Op::Call { function, output } => {
                    let flat = (0..node.operands().len())
                        .map(x)
                        .collect::<Result<Vec<_>, _>>()?;
                    let results = function.call(&function.split_inputs(&flat))?;
                    results
                        .into_iter()
                        .flatten()
                        .nth(*output)
                        .ok_or(GraphError::Unbound(node.id()))?
                }
            };
            values.insert(node.id(), value);
        }
        self.0
            .outputs
            .iter()
            .map(|port| {
                port.nonzeros()
                    .iter()
                    .map(|nz| {
                        values
                            .get(&nz.id())
                            .copied()
                            .ok_or(GraphError::Unbound(nz.id()))
                    })
                    .collect()
            })
            .collect()
    }

    fn split_inputs(&self, flat: &[f64]) -> Vec<Vec<f64>> {
        let mut offset = 0;
        self.0
            .inputs
            .iter()
            .map(|port| {
                let end = (offset + port.nnz()).min(flat.len());
                let part = flat[offset.min(end)..end].to_vec();
                offset = end;
                part
            })
            .collect()
    }
}

fn operand_value(
    values: &FxHashMap<ObjectId, f64>,
    node: &Expr,
    index: usize,
) -> Result<f64, GraphError> {
    let operand = node
        .operands()
        .get(index)
        .ok_or(GraphError::Unbound(node.id()))?;
    values
        .get(&operand.id())
        .copied()
        .ok_or(GraphError::Unbound(operand.id()))
}

/// Iterative post-order walk from `roots`, each reachable node listed once.
fn topological_order<'a>(roots: impl Iterator<Item = &'a Expr>) -> Vec<Expr> {
    let mut order = Vec::new();
    let mut visited = FxHashSet::default();
    let mut stack: Vec<(Expr, usize)> = Vec::new();
    for root in roots {
        if !visited.insert(root.id()) {
            continue;
        }
        stack.push((root.clone(), 0));
        while let Some((node, cursor)) = stack.last_mut() {
            match node.operands().get(*cursor).cloned() {
                Some(child) => {
                    *cursor += 1;
                    if visited.insert(child.id()) {
                        stack.push((child, 0));
                    }
                }
                None => {
                    if let Some((done, _)) = stack.pop() {
                        order.push(done);
                    }
                }
            }
        }
    }
    order
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("n_in", &self.n_in())
            .field("n_out", &self.n_out())
            .field("instructions", &self.0.instructions.len())
            .finish()
    }
}
