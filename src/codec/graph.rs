//! Codec for the graph types: sparsity patterns, expression nodes, and
//! function graphs.
//!
//! ## Wire format
//!
//! ```text
//! sparsity := 'S' sequence<i64>                   (empty = null pattern)
//! expr     := 'X' ( 'R' i64(slot) | 'D' opcode op-data expr*arity )
//! function := 'F' ( 'R' i64(slot) | 'D' body )
//! body     := name  input-names  input-patterns  output-names  output-patterns
//!             i64(count) expr*count  sequence<expr>(inputs)  sequence<expr>(outputs)
//! ```
//!
//! A definition takes its slot once its payload is complete, on both sides, so
//! slot ids line up with the order in which the decoder finishes objects.
//! Expression records nest through operands; both directions walk them with
//! an explicit stack bounded by `SessionOptions::max_depth`.

use std::io::{Read, Write};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::{pack_len, unpack_len, Pack, Unpack};
use crate::error::{CodecError, Result};
use crate::graph::{Expr, Function, Op, Port, Sparsity};
use crate::session::{Deserializer, Serializer};
use super::stream::{Decoder, Encoder};
use crate::wire::{WireKind, DEFINITION, REFERENCE};

const OP_SYMBOL: u8 = 0x01;
const OP_CONSTANT: u8 = 0x02;
const OP_NEG: u8 = 0x10;
const OP_SIN: u8 = 0x11;
const OP_COS: u8 = 0x12;
const OP_TAN: u8 = 0x13;
const OP_EXP: u8 = 0x14;
const OP_LOG: u8 = 0x15;
const OP_SQRT: u8 = 0x16;
const OP_TANH: u8 = 0x17;
const OP_ADD: u8 = 0x20;
const OP_SUB: u8 = 0x21;
const OP_MUL: u8 = 0x22;
const OP_DIV: u8 = 0x23;
const OP_POW: u8 = 0x24;
const OP_ATAN2: u8 = 0x25;
const OP_CALL: u8 = 0x30;

/// Operand capacity reserved up front for a decoded node.
const MAX_OPERAND_PREALLOC: usize = 64;

fn opcode(op: &Op) -> u8 {
    match op {
        Op::Symbol(_) => OP_SYMBOL,
        Op::Constant(_) => OP_CONSTANT,
        Op::Neg => OP_NEG,
        Op::Sin => OP_SIN,
        Op::Cos => OP_COS,
        Op::Tan => OP_TAN,
        Op::Exp => OP_EXP,
        Op::Log => OP_LOG,
        Op::Sqrt => OP_SQRT,
        Op::Tanh => OP_TANH,
        Op::Add => OP_ADD,
        Op::Sub => OP_SUB,
        Op::Mul => OP_MUL,
        Op::Div => OP_DIV,
        Op::Pow => OP_POW,
        Op::Atan2 => OP_ATAN2,
        Op::Call { .. } => OP_CALL,
    }
}

fn pack_op<W: Write>(s: &mut Encoder<W>, op: &Op) -> Result<()> {
    s.sink().put_u8(opcode(op))?;
    match op {
        Op::Symbol(name) => name.pack(s),
        Op::Constant(value) => value.pack(s),
        Op::Call { function, output } => {
            function.pack(s)?;
            pack_len(s, *output, "call output")
        }
        _ => Ok(()),
    }
}

fn unpack_op<R: Read>(d: &mut Decoder<R>) -> Result<Op> {
    let code = d.source().take_u8("opcode")?;
    let op = match code {
        OP_SYMBOL => Op::Symbol(String::unpack(d)?),
        OP_CONSTANT => Op::Constant(f64::unpack(d)?),
        OP_NEG => Op::Neg,
        OP_SIN => Op::Sin,
        OP_COS => Op::Cos,
        OP_TAN => Op::Tan,
        OP_EXP => Op::Exp,
        OP_LOG => Op::Log,
        OP_SQRT => Op::Sqrt,
        OP_TANH => Op::Tanh,
        OP_ADD => Op::Add,
        OP_SUB => Op::Sub,
        OP_MUL => Op::Mul,
        OP_DIV => Op::Div,
        OP_POW => Op::Pow,
        OP_ATAN2 => Op::Atan2,
        OP_CALL => {
            let function = Function::unpack(d)?;
            let output = unpack_len(d, "call output")?;
            Op::Call { function, output }
        }
        other => {
            return Err(CodecError::corruption(format!(
                "unknown opcode 0x{other:02X}"
            )))
        }
    };
    Ok(op)
}

fn pack_reference<W: Write>(s: &mut Encoder<W>, slot: u64) -> Result<()> {
    let slot = i64::try_from(slot)
        .map_err(|_| CodecError::unsupported(format!("slot {slot} exceeds i64::MAX")))?;
    s.sink().put_u8(REFERENCE)?;
    slot.pack(s)
}

impl Pack for Sparsity {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        let compressed = self
            .compress()
            .map_err(|err| CodecError::unsupported(err.to_string()))?;
        s.sink().put_tag(WireKind::Sparsity)?;
        compressed.pack(s)
    }
}

impl Unpack for Sparsity {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        d.source().expect_tag(WireKind::Sparsity)?;
        let compressed = Vec::<i64>::unpack(d)?;
        Sparsity::compressed(&compressed).map_err(|err| CodecError::corruption(err.to_string()))
    }
}

impl Pack for Expr {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        let limit = s.options().max_depth;
        let mut open: Vec<(Expr, usize)> = Vec::new();
        if open_expr(s, self)? {
            if limit == 0 && !self.operands().is_empty() {
                return Err(CodecError::DepthLimitExceeded { limit });
            }
            open.push((self.clone(), 0));
        }
        while let Some((node, cursor)) = open.last_mut() {
            match node.operands().get(*cursor).cloned() {
                Some(operand) => {
                    *cursor += 1;
                    if open_expr(s, &operand)? {
                        if open.len() >= limit && !operand.operands().is_empty() {
                            return Err(CodecError::DepthLimitExceeded { limit });
                        }
                        open.push((operand, 0));
                    }
                }
                None => {
                    if let Some((done, _)) = open.pop() {
                        let slot = s.exprs.define(done.id());
                        s.stats.expr_definitions += 1;
                        trace!(slot, op = done.op().name(), "codec.define");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Writes the record head for `expr`. Returns `true` when a definition was
/// opened and its operand records must follow.
fn open_expr<W: Write>(s: &mut Encoder<W>, expr: &Expr) -> Result<bool> {
    s.sink().put_tag(WireKind::Expr)?;
    if let Some(slot) = s.exprs.lookup(expr.id()) {
        pack_reference(s, slot)?;
        s.stats.expr_references += 1;
        trace!(slot, "codec.reference");
        return Ok(false);
    }
    s.sink().put_u8(DEFINITION)?;
    pack_op(s, expr.op())?;
    Ok(true)
}

struct OpenExpr {
    op: Op,
    arity: usize,
    operands: SmallVec<[Expr; 2]>,
}

impl OpenExpr {
    fn is_complete(&self) -> bool {
        self.operands.len() >= self.arity
    }
}

enum ExprRecord {
    Reference(Expr),
    Definition(OpenExpr),
}

impl Unpack for Expr {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        let limit = d.options().max_depth;
        let mut open: Vec<OpenExpr> = Vec::new();
        'records: loop {
            let mut value = match read_expr_record(d)? {
                ExprRecord::Reference(expr) => expr,
                ExprRecord::Definition(pending) if pending.is_complete() => close_expr(d, pending)?,
                ExprRecord::Definition(pending) => {
                    if open.len() >= limit {
                        return Err(CodecError::DepthLimitExceeded { limit });
                    }
                    open.push(pending);
                    continue 'records;
                }
            };
            while let Some(mut parent) = open.pop() {
                parent.operands.push(value);
                if !parent.is_complete() {
                    open.push(parent);
                    continue 'records;
                }
                value = close_expr(d, parent)?;
            }
            return Ok(value);
        }
    }
}

fn read_expr_record<R: Read>(d: &mut Decoder<R>) -> Result<ExprRecord> {
    d.source().expect_tag(WireKind::Expr)?;
    match d.source().take_u8("expr discriminator")? {
        REFERENCE => {
            let slot = i64::unpack(d)?;
            let expr = d.exprs.resolve(slot)?;
            d.stats.expr_references += 1;
            trace!(slot, "codec.reference");
            Ok(ExprRecord::Reference(expr))
        }
        DEFINITION => {
            let op = unpack_op(d)?;
            let arity = op.arity();
            Ok(ExprRecord::Definition(OpenExpr {
                op,
                arity,
                operands: SmallVec::with_capacity(arity.min(MAX_OPERAND_PREALLOC)),
            }))
        }
        other => Err(CodecError::corruption(format!(
            "invalid expr discriminator 0x{other:02X}"
        ))),
    }
}

fn close_expr<R: Read>(d: &mut Decoder<R>, pending: OpenExpr) -> Result<Expr> {
    let expr = Expr::from_parts(pending.op, pending.operands)
        .map_err(|err| CodecError::corruption(format!("invalid expression node: {err}")))?;
    let slot = d.exprs.register(expr.clone());
    d.stats.expr_definitions += 1;
    trace!(slot, op = expr.op().name(), "codec.define");
    Ok(expr)
}

impl Pack for Function {
    fn pack<W: Write>(&self, s: &mut Encoder<W>) -> Result<()> {
        s.sink().put_tag(WireKind::Function)?;
        if let Some(slot) = s.functions.lookup(self.id()) {
            pack_reference(s, slot)?;
            s.stats.function_references += 1;
            trace!(function = self.name(), slot, "codec.reference");
            return Ok(());
        }
        let limit = s.options().max_function_nesting;
        if s.function_depth >= limit {
            return Err(CodecError::DepthLimitExceeded { limit });
        }
        s.sink().put_u8(DEFINITION)?;
        s.function_depth += 1;
        let body = pack_function_body(s, self);
        s.function_depth -= 1;
        body?;
        let slot = s.functions.define(self.id());
        s.stats.function_definitions += 1;
        debug!(
            function = self.name(),
            slot,
            nodes = self.instructions().len(),
            "codec.define"
        );
        Ok(())
    }
}

fn pack_function_body<W: Write>(s: &mut Encoder<W>, f: &Function) -> Result<()> {
    f.name().pack(s)?;
    for ports in [f.inputs(), f.outputs()] {
        let names: Vec<&str> = ports.iter().map(Port::name).collect();
        names.pack(s)?;
        let patterns: Vec<&Sparsity> = ports.iter().map(Port::sparsity).collect();
        patterns.pack(s)?;
    }
    pack_len(s, f.instructions().len(), "instruction count")?;
    for node in f.instructions() {
        node.pack(s)?;
    }
    for ports in [f.inputs(), f.outputs()] {
        let nonzeros: Vec<&Expr> = ports.iter().flat_map(|p| p.nonzeros()).collect();
        nonzeros.pack(s)?;
    }
    Ok(())
}

impl Unpack for Function {
    fn unpack<R: Read>(d: &mut Decoder<R>) -> Result<Self> {
        d.source().expect_tag(WireKind::Function)?;
        match d.source().take_u8("function discriminator")? {
            REFERENCE => {
                let slot = i64::unpack(d)?;
                let function = d.functions.resolve(slot)?;
                d.stats.function_references += 1;
                trace!(function = function.name(), slot, "codec.reference");
                Ok(function)
            }
            DEFINITION => {
                let limit = d.options().max_function_nesting;
                if d.function_depth >= limit {
                    return Err(CodecError::DepthLimitExceeded { limit });
                }
                d.function_depth += 1;
                let body = unpack_function_body(d);
                d.function_depth -= 1;
                let function = body?;
                let slot = d.functions.register(function.clone());
                d.stats.function_definitions += 1;
                debug!(
                    function = function.name(),
                    slot,
                    nodes = function.instructions().len(),
                    "codec.define"
                );
                Ok(function)
            }
            other => Err(CodecError::corruption(format!(
                "invalid function discriminator 0x{other:02X}"
            ))),
        }
    }
}

fn unpack_function_body<R: Read>(d: &mut Decoder<R>) -> Result<Function> {
    let name = String::unpack(d)?;
    let input_names = Vec::<String>::unpack(d)?;
    let input_patterns = Vec::<Sparsity>::unpack(d)?;
    let output_names = Vec::<String>::unpack(d)?;
    let output_patterns = Vec::<Sparsity>::unpack(d)?;
    let count = unpack_len(d, "instruction count")?;
    for _ in 0..count {
        Expr::unpack(d)?;
    }
    let input_nonzeros = Vec::<Expr>::unpack(d)?;
    let output_nonzeros = Vec::<Expr>::unpack(d)?;
    let inputs = build_ports(&name, input_names, input_patterns, input_nonzeros)?;
    let outputs = build_ports(&name, output_names, output_patterns, output_nonzeros)?;
    Function::new(name.clone(), inputs, outputs)
        .map_err(|err| CodecError::corruption(format!("invalid function '{name}': {err}")))
}

fn build_ports(
    function: &str,
    names: Vec<String>,
    patterns: Vec<Sparsity>,
    nonzeros: Vec<Expr>,
) -> Result<Vec<Port>> {
    if names.len() != patterns.len() {
        return Err(CodecError::corruption(format!(
            "'{function}' declares {} port names but {} patterns",
            names.len(),
            patterns.len()
        )));
    }
    let expected: usize = patterns.iter().map(Sparsity::nnz).sum();
    if expected != nonzeros.len() {
        return Err(CodecError::corruption(format!(
            "'{function}' ports hold {expected} nonzeros but {} were stored",
            nonzeros.len()
        )));
    }
    let mut rest = nonzeros.into_iter();
    names
        .into_iter()
        .zip(patterns)
        .map(|(name, sparsity)| {
            let nz: Vec<Expr> = rest.by_ref().take(sparsity.nnz()).collect();
            Port::new(name, sparsity, nz)
                .map_err(|err| CodecError::corruption(format!("invalid port in '{function}': {err}")))
        })
        .collect()
}

impl Function {
    /// Writes this graph through `s`, sharing it with any earlier occurrence in the session.
    pub fn serialize<W: Write>(&self, s: &mut Serializer<W>) -> Result<()> {
        s.pack(self)
    }

    /// Reads the next function graph from `d`.
    pub fn deserialize<R: Read>(d: &mut Deserializer<R>) -> Result<Self> {
        d.unpack()
    }
}
