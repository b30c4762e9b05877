//! Register allocation over translated functions.

use bumpalo::Bump;
use minic_backend::ast::{AstBuilder, BinaryOp, Function, Type};
use minic_backend::ir::{Graph, LocalOptimizer, NodeKind, SsaTranslation};
use minic_backend::x64::ALLOCATION_POOL;
use minic_backend::{CompileError, RegisterAllocator, RegisterStrategy};

fn build(function: &Function<'_>) -> Graph {
    SsaTranslation::new(function, LocalOptimizer::new()).translate()
}

/// `return p0 * (p0 + 1) * (p0 + 2) * ... ` over `terms` distinct values.
fn wide_function<'a>(ast: AstBuilder<'a>, terms: i32) -> Function<'a> {
    let p = || ast.var("p", 0);
    let mut total = p();
    for k in 1..terms {
        total = ast.binary(BinaryOp::Mul, total, ast.binary(BinaryOp::Add, p(), ast.int(k)));
    }
    ast.function("wide", &[ast.param("p", 0, Type::Int)], &[ast.ret(total)])
}

#[test]
fn constants_take_no_physical_register() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let f = ast.function(
        "f",
        &[ast.param("p", 0, Type::Int)],
        &[ast.ret(ast.binary(BinaryOp::Add, ast.var("p", 0), ast.int(5)))],
    );
    let graph = build(&f);
    let map = RegisterAllocator::new(RegisterStrategy::Dedicated)
        .allocate(&graph)
        .unwrap();

    let five = graph
        .block(graph.start_block())
        .nodes()
        .iter()
        .copied()
        .find(|&n| *graph.kind(n) == NodeKind::ConstInt(5))
        .unwrap();
    assert!(map.virtual_register(five).is_some());
    assert_eq!(map.physical(five), None);
    assert_eq!(map.used_registers(), &ALLOCATION_POOL[..2]);
}

#[test]
fn division_result_shares_the_division_register() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let f = ast.function(
        "f",
        &[ast.param("p", 0, Type::Int)],
        &[ast.ret(ast.binary(BinaryOp::Div, ast.var("p", 0), ast.int(3)))],
    );
    let graph = build(&f);
    let map = RegisterAllocator::new(RegisterStrategy::Dedicated)
        .allocate(&graph)
        .unwrap();

    let ret = graph.predecessors(graph.end_block())[0];
    let result = graph.operands(ret)[1];
    let div = graph.value_source(result);
    assert_ne!(result, div);
    assert_eq!(map.virtual_register(result), map.virtual_register(div));
    assert_eq!(map.physical(result), map.physical(div));
}

#[test]
fn dedicated_strategy_runs_out_of_registers() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let graph = build(&wide_function(ast, 8));

    let result = RegisterAllocator::new(RegisterStrategy::Dedicated).allocate(&graph);
    match result {
        Err(CompileError::OutOfRegisters { function, required, available }) => {
            assert_eq!(function, "wide");
            assert!(required > available);
            assert_eq!(available, ALLOCATION_POOL.len());
        }
        other => panic!("expected OutOfRegisters, got {other:?}"),
    }
}

#[test]
fn modulo_strategy_reuses_the_pool() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let graph = build(&wide_function(ast, 8));

    let map = RegisterAllocator::new(RegisterStrategy::Modulo)
        .allocate(&graph)
        .unwrap();
    assert_eq!(map.used_registers().len(), ALLOCATION_POOL.len());
    assert!(map.virtual_count() as usize > ALLOCATION_POOL.len());
}

#[test]
fn small_functions_fit_either_way() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let graph = build(&wide_function(ast, 3));

    let dedicated = RegisterAllocator::new(RegisterStrategy::Dedicated)
        .allocate(&graph)
        .unwrap();
    let modulo = RegisterAllocator::new(RegisterStrategy::Modulo)
        .allocate(&graph)
        .unwrap();
    assert_eq!(dedicated.used_registers(), modulo.used_registers());
}

#[test]
fn loop_invariant_values_need_no_extra_registers() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let i = || ast.var("i", 0);
    let invariant = |k: i32| ast.var(["a", "b", "c"][k as usize], 0);
    let mut body = ast.binary(BinaryOp::Add, i(), invariant(0));
    for k in 1..3 {
        body = ast.binary(BinaryOp::Add, body, invariant(k));
    }
    let f = ast.function(
        "loop",
        &[ast.param("p", 0, Type::Int)],
        &[
            ast.declare("a", 0, Type::Int, Some(ast.binary(BinaryOp::Add, ast.var("p", 0), ast.int(1)))),
            ast.declare("b", 0, Type::Int, Some(ast.binary(BinaryOp::Add, ast.var("p", 0), ast.int(2)))),
            ast.declare("c", 0, Type::Int, Some(ast.binary(BinaryOp::Add, ast.var("p", 0), ast.int(3)))),
            ast.declare("i", 0, Type::Int, Some(ast.int(0))),
            ast.while_loop(
                ast.binary(BinaryOp::Less, i(), ast.int(100)),
                ast.assign("i", 0, body),
            ),
            ast.ret(i()),
        ],
    );
    let graph = build(&f);
    assert_eq!(graph.phi_count(), 1);

    let map = RegisterAllocator::new(RegisterStrategy::Dedicated)
        .allocate(&graph)
        .unwrap();
    assert_eq!(map.used_registers().len(), 9);
}
