#![allow(dead_code)]

use std::sync::Once;

use dagcodec::{Expr, Function, Port, Sparsity};
use tracing_subscriber::EnvFilter;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("dagcodec=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

/// `f(x, y) = (w, z)` with `w = atan2(y, x)` and `z = sin(w) + 1`.
pub fn atan2_function() -> Function {
    let x = Expr::symbol("x");
    let y = Expr::symbol("y");
    let w = y.atan2(&x);
    let z = w.sin() + 1.0;
    Function::new(
        "f",
        vec![Port::scalar("x", x), Port::scalar("y", y)],
        vec![Port::scalar("w", w), Port::scalar("z", z)],
    )
    .expect("atan2 graph")
}

/// Two-variable Rosenbrock function over a dense 2-vector input.
pub fn rosenbrock() -> Function {
    let x0 = Expr::symbol("x0");
    let x1 = Expr::symbol("x1");
    let a = 1.0 - x0.clone();
    let b = &x1 - &(&x0 * &x0);
    let value = &a * &a + 100.0 * (&b * &b);
    Function::new(
        "rosenbrock",
        vec![Port::column("x", vec![x0, x1])],
        vec![Port::scalar("f", value)],
    )
    .expect("rosenbrock graph")
}

/// Sums `rosenbrock` at `(p, q)` and `(q, p)`, so the callee is shared by two call nodes.
pub fn rosenbrock_sum() -> Function {
    let inner = rosenbrock();
    let p = Expr::symbol("p");
    let q = Expr::symbol("q");
    let first = Expr::call(&inner, &[p.clone(), q.clone()], 0).expect("call");
    let second = Expr::call(&inner, &[q.clone(), p.clone()], 0).expect("call");
    Function::new(
        "rosenbrock_sum",
        vec![Port::scalar("p", p), Port::scalar("q", q)],
        vec![Port::scalar("total", first + second)],
    )
    .expect("rosenbrock_sum graph")
}

/// Function with a scalar input, one null output pattern, and one 2x3 output with no nonzeros.
pub fn pattern_function() -> Function {
    let x = Expr::symbol("x");
    Function::new(
        "patterns",
        vec![Port::scalar("x", x.clone())],
        vec![
            Port::scalar("y", x.exp()),
            Port::new("none", Sparsity::null(), Vec::new()).expect("null port"),
            Port::new("empty", Sparsity::empty(2, 3), Vec::new()).expect("empty port"),
        ],
    )
    .expect("pattern graph")
}

pub fn encode(functions: &[&Function]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut s = dagcodec::Serializer::new(&mut buf).expect("open serializer");
        for f in functions {
            s.add(f).expect("add");
        }
        s.finish().expect("finish");
    }
    buf
}

pub fn bits(values: &[Vec<f64>]) -> Vec<Vec<u64>> {
    values
        .iter()
        .map(|port| port.iter().map(|v| v.to_bits()).collect())
        .collect()
}
