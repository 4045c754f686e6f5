#![allow(missing_docs)]

mod support;

use dagcodec::{Deserializer, Expr, Function, Op, Port, Serializer};
use support::{encode, rosenbrock, rosenbrock_sum, TestResult};

#[test]
fn shared_node_decodes_to_one_object() -> TestResult {
    let x = Expr::symbol("x");
    let y = Expr::symbol("y");
    let shared = &x * &y;
    let a = shared.sin();
    let b = shared.cos();
    let f = Function::new(
        "f",
        vec![Port::scalar("x", x), Port::scalar("y", y)],
        vec![Port::scalar("a", a), Port::scalar("b", b)],
    )?;
    let back = &dagcodec::from_bytes(&encode(&[&f]))?[0];
    let a = &back.outputs()[0].nonzeros()[0];
    let b = &back.outputs()[1].nonzeros()[0];
    assert!(a.operands()[0].ptr_eq(&b.operands()[0]));
    assert!(matches!(a.operands()[0].op(), Op::Mul));
    Ok(())
}

#[test]
fn shared_node_is_defined_once_and_referenced_n_minus_one_times() -> TestResult {
    for n in [2usize, 3, 10, 57] {
        let shared = Expr::symbol("x").exp();
        let mut parents: Vec<Expr> = (0..n).map(|i| &shared + i as f64).collect();

        for order in 0..2 {
            if order == 1 {
                parents.reverse();
            }
            let mut buf = Vec::new();
            {
                let mut s = Serializer::new(&mut buf)?;
                s.pack(&parents)?;
                let stats = s.stats();
                // one add and one constant per parent, plus exp and x once
                assert_eq!(stats.expr_definitions, 2 * n as u64 + 2);
                assert_eq!(stats.expr_references, n as u64 - 1);
                s.finish()?;
            }
            let mut d = Deserializer::new(&buf[..])?;
            let back: Vec<Expr> = d.unpack()?;
            assert_eq!(d.stats().expr_references, n as u64 - 1);
            let first = &back[0].operands()[0];
            assert!(back.iter().all(|p| p.operands()[0].ptr_eq(first)));
        }
    }
    Ok(())
}

#[test]
fn equal_but_distinct_nodes_are_not_merged() -> TestResult {
    let a = Expr::symbol("x");
    let b = Expr::symbol("x");
    let mut buf = Vec::new();
    {
        let mut s = Serializer::new(&mut buf)?;
        s.pack(&vec![a.clone(), b, a])?;
        assert_eq!(s.stats().expr_definitions, 2);
        assert_eq!(s.stats().expr_references, 1);
        s.finish()?;
    }
    let mut d = Deserializer::new(&buf[..])?;
    let back: Vec<Expr> = d.unpack()?;
    assert!(!back[0].ptr_eq(&back[1]));
    assert!(back[0].ptr_eq(&back[2]));
    Ok(())
}

#[test]
fn adding_twice_matches_adding_once() -> TestResult {
    let f = rosenbrock_sum();
    let once = encode(&[&f]);
    let twice = encode(&[&f, &f]);
    assert_eq!(once, twice);
    assert_eq!(dagcodec::from_bytes(&twice)?.len(), 1);
    Ok(())
}

#[test]
fn callee_added_later_becomes_a_reference() -> TestResult {
    let outer = rosenbrock_sum();
    let inner = outer
        .instructions()
        .iter()
        .find_map(|e| match e.op() {
            Op::Call { function, .. } => Some(function.clone()),
            _ => None,
        })
        .expect("rosenbrock_sum has call nodes");

    let mut buf = Vec::new();
    {
        let mut s = Serializer::new(&mut buf)?;
        s.add(&outer)?;
        let before = s.stats();
        s.add(&inner)?;
        let after = s.stats();
        assert_eq!(after.function_definitions, before.function_definitions);
        assert_eq!(after.function_references, before.function_references + 1);
        // tag, discriminator, tagged i64 slot
        assert_eq!(after.bytes - before.bytes, 2 + 9);
        s.finish()?;
    }
    let back = dagcodec::from_bytes(&buf)?;
    assert_eq!(back.len(), 2);
    let called = back[0]
        .instructions()
        .iter()
        .find_map(|e| match e.op() {
            Op::Call { function, .. } => Some(function.clone()),
            _ => None,
        })
        .expect("decoded call node");
    assert!(called.ptr_eq(&back[1]));
    Ok(())
}

#[test]
fn distinct_functions_with_same_structure_stay_distinct() -> TestResult {
    let (a, b) = (rosenbrock(), rosenbrock());
    let back = dagcodec::from_bytes(&dagcodec::to_bytes(&[a, b])?)?;
    assert_eq!(back.len(), 2);
    assert!(!back[0].ptr_eq(&back[1]));
    assert_eq!(back[0].name(), back[1].name());
    Ok(())
}

#[test]
fn sessions_do_not_share_slots() -> TestResult {
    let f = rosenbrock_sum();
    let first = encode(&[&f]);
    let second = encode(&[&f]);
    assert_eq!(first, second);
    Ok(())
}
