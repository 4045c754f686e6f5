#![allow(missing_docs)]

mod support;

use std::fs::File;
use std::io::{BufReader, BufWriter};

use dagcodec::{Deserializer, Expr, Function, Op, Port, Serializer};
use support::{atan2_function, bits, encode, init_tracing, pattern_function, rosenbrock_sum, TestResult};
use tempfile::tempdir;

#[test]
fn atan2_graph_evaluates_identically_after_roundtrip() -> TestResult {
    init_tracing();
    let f = atan2_function();
    let buf = encode(&[&f]);

    let mut d = Deserializer::new(&buf[..])?;
    let back = Function::deserialize(&mut d)?;
    assert!(!d.has_remaining()?);

    let args = [vec![1.0], vec![2.0]];
    let expected = f.call(&args)?;
    let actual = back.call(&args)?;
    assert_eq!(bits(&actual), bits(&expected));
    assert_eq!(expected[0][0], 2.0f64.atan2(1.0));
    assert_eq!(expected[1][0], 2.0f64.atan2(1.0).sin() + 1.0);

    // z = sin(w) + 1 must reuse the decoded w, not a copy of it
    let w = &back.outputs()[0].nonzeros()[0];
    let z = &back.outputs()[1].nonzeros()[0];
    assert!(matches!(w.op(), Op::Atan2));
    assert!(z.operands()[0].operands()[0].ptr_eq(w));
    Ok(())
}

#[test]
fn names_and_patterns_survive() -> TestResult {
    let f = pattern_function();
    let back = dagcodec::from_bytes(&encode(&[&f]))?;
    assert_eq!(back.len(), 1);
    let back = &back[0];
    assert_eq!(back.name(), "patterns");
    let names: Vec<&str> = back.outputs().iter().map(Port::name).collect();
    assert_eq!(names, ["y", "none", "empty"]);
    for (orig, got) in f.outputs().iter().zip(back.outputs()) {
        assert_eq!(orig.sparsity(), got.sparsity());
    }
    assert!(back.outputs()[1].sparsity().is_null());
    assert!(!back.outputs()[2].sparsity().is_null());
    assert_eq!(back.outputs()[2].sparsity().nrow(), 2);
    assert_eq!(back.outputs()[2].sparsity().ncol(), 3);
    assert_eq!(back.call(&[vec![0.5]])?, f.call(&[vec![0.5]])?);
    Ok(())
}

#[test]
fn nested_calls_roundtrip_with_one_callee() -> TestResult {
    let f = rosenbrock_sum();
    let buf = encode(&[&f]);
    let mut d = Deserializer::new(&buf[..])?;
    let back = d.next_function()?.expect("one function");
    assert_eq!(d.stats().function_definitions, 2);
    assert_eq!(d.stats().function_references, 1);

    let args = [vec![0.3], vec![-1.7]];
    assert_eq!(bits(&back.call(&args)?), bits(&f.call(&args)?));

    let callees: Vec<Function> = back
        .instructions()
        .iter()
        .filter_map(|e| match e.op() {
            Op::Call { function, .. } => Some(function.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(callees.len(), 2);
    assert!(callees[0].ptr_eq(&callees[1]));
    assert_eq!(callees[0].name(), "rosenbrock");
    Ok(())
}

#[test]
fn reencoding_a_decoded_stream_is_byte_identical() -> TestResult {
    let (f, g, h) = (atan2_function(), rosenbrock_sum(), pattern_function());
    let first = dagcodec::to_bytes(&[f, g, h])?;
    let decoded = dagcodec::from_bytes(&first)?;
    assert_eq!(decoded.len(), 3);
    let second = dagcodec::to_bytes(&decoded)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn subexpressions_are_shared_across_top_level_functions() -> TestResult {
    let x = Expr::symbol("x");
    let shared = x.sin() * x.cos();
    let f = Function::new(
        "f",
        vec![Port::scalar("x", x.clone())],
        vec![Port::scalar("a", shared.exp())],
    )?;
    let g = Function::new(
        "g",
        vec![Port::scalar("x", x)],
        vec![Port::scalar("b", shared.clone() + 2.0)],
    )?;
    let back = dagcodec::from_bytes(&dagcodec::to_bytes(&[f, g])?)?;
    let a = &back[0].outputs()[0].nonzeros()[0];
    let b = &back[1].outputs()[0].nonzeros()[0];
    assert!(a.operands()[0].ptr_eq(&b.operands()[0]));
    assert!(back[0].inputs()[0].nonzeros()[0].ptr_eq(&back[1].inputs()[0].nonzeros()[0]));
    Ok(())
}

#[test]
fn file_backed_stream_roundtrips() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("graphs.dagx");
    let f = atan2_function();
    let g = rosenbrock_sum();
    {
        let mut s = Serializer::new(BufWriter::new(File::create(&path)?))?;
        s.add(&f)?;
        s.add(&g)?;
        s.finish()?;
    }
    let mut d = Deserializer::new(BufReader::new(File::open(&path)?))?;
    let mut names = Vec::new();
    while let Some(next) = d.next_function()? {
        names.push(next.name().to_string());
    }
    assert_eq!(names, ["f", "rosenbrock_sum"]);
    assert_eq!(d.stats().bytes, std::fs::metadata(&path)?.len());
    Ok(())
}

#[test]
fn deep_chain_function_roundtrips() -> TestResult {
    let x = Expr::symbol("x");
    let mut e = x.clone();
    for i in 0..100_000 {
        e = if i % 2 == 0 { e.tanh() } else { e * 0.5 };
    }
    let f = Function::new("deep", vec![Port::scalar("x", x)], vec![Port::scalar("y", e)])?;
    let back = dagcodec::from_bytes(&dagcodec::to_bytes(std::slice::from_ref(&f))?)?;
    assert_eq!(back[0].instructions().len(), f.instructions().len());
    assert_eq!(bits(&back[0].call(&[vec![3.0]])?), bits(&f.call(&[vec![3.0]])?));
    Ok(())
}
