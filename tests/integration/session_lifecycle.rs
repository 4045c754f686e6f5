#![allow(missing_docs)]

mod support;

use std::cell::Cell;
use std::io::{self, Write};
use std::rc::Rc;

use dagcodec::{
    CodecError, Deserializer, Expr, Function, Port, Serializer, SessionOptions, SessionStats,
};
use support::{atan2_function, encode, init_tracing, rosenbrock_sum, TestResult};

/// Wraps the atan2 graph in `levels` functions, each calling the previous one.
fn nested(levels: usize) -> Function {
    let mut f = atan2_function();
    for level in 0..levels {
        let a = Expr::symbol("a");
        let b = Expr::symbol("b");
        let out = Expr::call(&f, &[a.clone(), b.clone()], 0).expect("call");
        f = Function::new(
            format!("level{level}"),
            vec![Port::scalar("a", a), Port::scalar("b", b)],
            vec![Port::scalar("out", out)],
        )
        .expect("wrapper");
    }
    f
}

#[test]
fn failed_add_aborts_the_session() -> TestResult {
    init_tracing();
    let deep = nested(3);
    let mut buf = Vec::new();
    let mut s = Serializer::with_options(
        &mut buf,
        SessionOptions::default().max_function_nesting(2),
    )?;
    assert!(matches!(
        s.add(&deep),
        Err(CodecError::DepthLimitExceeded { limit: 2 })
    ));
    assert!(s.is_aborted());
    assert!(matches!(s.add(&atan2_function()), Err(CodecError::SessionAborted)));
    assert!(matches!(s.pack(&1i32), Err(CodecError::SessionAborted)));
    assert!(matches!(s.finish(), Err(CodecError::SessionAborted)));
    Ok(())
}

#[test]
fn failed_pack_aborts_the_session() -> TestResult {
    let mut e = Expr::symbol("x");
    for _ in 0..10 {
        e = e.cos();
    }
    let mut buf = Vec::new();
    let mut s = Serializer::with_options(&mut buf, SessionOptions::default().max_depth(4))?;
    assert!(matches!(
        s.pack(&e),
        Err(CodecError::DepthLimitExceeded { limit: 4 })
    ));
    assert!(s.is_aborted());
    assert!(matches!(s.pack(&Expr::symbol("y")), Err(CodecError::SessionAborted)));
    assert!(matches!(s.finish(), Err(CodecError::SessionAborted)));
    Ok(())
}

#[test]
fn failed_function_decode_aborts_the_session() -> TestResult {
    let mut buf = encode(&[&atan2_function()]);
    let first_expr = buf
        .iter()
        .position(|&b| b == b'X')
        .expect("expression record");
    buf[first_expr + 2] = 0xEE;
    let mut d = Deserializer::new(&buf[..])?;
    assert!(matches!(
        Function::deserialize(&mut d),
        Err(CodecError::StreamCorruption(_))
    ));
    assert!(d.is_aborted());
    assert!(matches!(d.unpack::<Expr>(), Err(CodecError::SessionAborted)));
    assert!(matches!(d.has_remaining(), Err(CodecError::SessionAborted)));
    Ok(())
}

#[test]
fn nesting_limit_applies_when_decoding() -> TestResult {
    let buf = encode(&[&nested(3)]);
    let opts = SessionOptions::from_toml_str("max_function_nesting = 3")?;
    let mut d = Deserializer::with_options(&buf[..], opts)?;
    assert!(matches!(
        d.next_function(),
        Err(CodecError::DepthLimitExceeded { limit: 3 })
    ));
    assert!(matches!(d.next_function(), Err(CodecError::SessionAborted)));

    let opts = SessionOptions::from_toml_str("max_function_nesting = 4")?;
    let mut d = Deserializer::with_options(&buf[..], opts)?;
    let f = d.next_function()?.expect("nested function");
    assert_eq!(f.name(), "level2");
    assert_eq!(d.stats().function_definitions, 4);
    Ok(())
}

#[test]
fn expression_depth_limit_comes_from_toml() -> TestResult {
    let mut e = Expr::symbol("x");
    for _ in 0..20 {
        e = e.sqrt();
    }
    let mut buf = Vec::new();
    {
        let mut s = Serializer::new(&mut buf)?;
        s.pack(&e)?;
        s.finish()?;
    }
    let opts = SessionOptions::from_toml_str("max_depth = 8\n")?;
    let mut d = Deserializer::with_options(&buf[..], opts)?;
    assert!(matches!(
        d.unpack::<Expr>(),
        Err(CodecError::DepthLimitExceeded { limit: 8 })
    ));
    let mut d = Deserializer::new(&buf[..])?;
    assert!(d.unpack::<Expr>().is_ok());
    Ok(())
}

#[test]
fn bad_options_are_config_errors() {
    assert!(matches!(
        SessionOptions::from_toml_str("max_depth = -1"),
        Err(CodecError::Config(_))
    ));
}

#[test]
fn primitives_and_graphs_interleave_in_order() -> TestResult {
    let f = atan2_function();
    let g = rosenbrock_sum();
    let mut buf = Vec::new();
    {
        let mut s = Serializer::new(&mut buf)?;
        s.pack_described("count", &2i64)?;
        s.add(&f)?;
        s.pack(&vec![0.25f64, -0.0])?;
        s.add(&g)?;
        s.pack("done")?;
        s.finish()?;
    }
    let mut d = Deserializer::new(&buf[..])?;
    assert_eq!(d.unpack_described::<i64>("count")?, 2);
    assert_eq!(Function::deserialize(&mut d)?.name(), "f");
    let floats: Vec<f64> = d.unpack()?;
    assert_eq!(floats[1].to_bits(), (-0.0f64).to_bits());
    assert_eq!(Function::deserialize(&mut d)?.name(), "rosenbrock_sum");
    assert_eq!(d.unpack::<String>()?, "done");
    assert!(!d.has_remaining()?);
    Ok(())
}

#[test]
fn stats_agree_between_sides() -> TestResult {
    let f = rosenbrock_sum();
    let mut buf = Vec::new();
    let written: SessionStats;
    {
        let mut s = Serializer::new(&mut buf)?;
        s.add(&f)?;
        written = s.stats();
        s.finish()?;
    }
    assert_eq!(written.bytes, buf.len() as u64);
    let mut d = Deserializer::new(&buf[..])?;
    d.next_function()?;
    assert_eq!(d.stats(), written);
    Ok(())
}

#[derive(Clone, Default)]
struct FlushCounter {
    flushes: Rc<Cell<usize>>,
}

impl Write for FlushCounter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.set(self.flushes.get() + 1);
        Ok(())
    }
}

#[test]
fn writer_is_flushed_on_every_exit_path() -> TestResult {
    let out = FlushCounter::default();
    let s = Serializer::new(out.clone())?;
    s.finish()?;
    assert_eq!(out.flushes.get(), 1);

    let out = FlushCounter::default();
    {
        let mut s = Serializer::new(out.clone())?;
        s.add(&atan2_function())?;
    }
    assert_eq!(out.flushes.get(), 1);

    let out = FlushCounter::default();
    {
        let mut s = Serializer::with_options(
            out.clone(),
            SessionOptions::default().max_function_nesting(1),
        )?;
        assert!(s.add(&nested(2)).is_err());
    }
    assert_eq!(out.flushes.get(), 1);
    Ok(())
}
