//! Assembly text produced by the full pipeline.

use bumpalo::Bump;
use minic_backend::ast::{AstBuilder, BinaryOp, Type};
use minic_backend::ir::{Graph, Node, NodeId, NodeKind, ProjectionKind};
use minic_backend::{
    samples, BackendConfig, CodeGenerator, CompilationSession, CompileError, CompileResult, Compiler,
    FunctionAsm, RegisterAllocator, RegisterStrategy,
};

fn compile_sample(name: &str, config: BackendConfig) -> String {
    let arena = Bump::new();
    let sample = samples::find(name).unwrap();
    let program = sample.program(AstBuilder::new(&arena));
    let session = CompilationSession::new(&arena);
    Compiler::new(&session, config).compile_program(&program).unwrap()
}

#[test]
fn program_layout() {
    let text = compile_sample("fold", BackendConfig::default());
    assert!(text.starts_with(".section .text\n.global main\nmain:\n    call _main\n"));
    assert!(text.contains("    movl %eax, %edi\n    movl $60, %eax\n    syscall\n"));
    assert!(text.contains("_main:\n    pushq %rbp\n    movq %rsp, %rbp\n    movl $7, %eax\n"));
    assert!(text.contains(".Lfatal_div_by_zero:\n    movl $136, %edi\n"));
}

#[test]
fn layout_without_trampoline_or_stub() {
    let config = BackendConfig::default()
        .with_entry_trampoline(false)
        .with_division_guard(false);
    let text = compile_sample("calls", config);
    assert!(text.contains(".global _add\n"));
    assert!(text.contains(".global _main\n"));
    assert!(!text.contains("\nmain:\n"));
    assert!(!text.contains(".Lfatal_div_by_zero"));
}

#[test]
fn division_guard_is_emitted_for_zero_divisor() {
    let text = compile_sample("div_zero", BackendConfig::default());
    assert!(text.contains("    movl $0, %ecx\n    cmpl $0, %ecx\n    je .Lfatal_div_by_zero\n"));
    assert!(text.contains("    movl $10, %eax\n    cltd\n    idivl %ecx\n"));

    let unguarded = compile_sample("div_zero", BackendConfig::default().with_division_guard(false));
    assert!(!unguarded.contains("cmpl $0, %ecx"));
}

#[test]
fn calls_push_arguments_right_to_left() {
    let text = compile_sample("calls", BackendConfig::default());
    assert!(text.contains("    pushq $22\n    pushq $20\n    call _add\n    addq $16, %rsp\n"));
    assert!(text.contains("    movl 16(%rbp), %"));
    assert!(text.contains("    movl 24(%rbp), %"));
}

#[test]
fn used_registers_are_saved_and_restored() {
    let text = compile_sample("factorial", BackendConfig::default());
    let fact = &text[text.find("_fact:").unwrap()..text.find("_main:").unwrap()];
    assert!(fact.contains("    pushq %rbx\n"));
    assert!(fact.contains("    popq %rbx\n    popq %rbp\n    ret\n"));
    assert!(fact.contains("    call _fact\n    addq $8, %rsp\n"));
}

#[test]
fn unoptimized_output_still_folds_constants() {
    let text = compile_sample("logical_and", BackendConfig::default().with_optimizer(false));
    assert!(text.contains("    movl $1, %"));
    assert!(!text.contains("setl"));
}

#[test]
fn join_false_edge_gets_a_stub() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let f = ast.function(
        "pick",
        &[ast.param("p", 0, Type::Int)],
        &[
            ast.declare("x", 0, Type::Int, Some(ast.int(1))),
            ast.if_else(ast.var("p", 0), ast.assign("x", 0, ast.int(2)), None),
            ast.ret(ast.var("x", 0)),
        ],
    );
    let program = ast.program(&[f]);
    let session = CompilationSession::new(&arena);
    let text = Compiler::new(&session, BackendConfig::default().with_entry_trampoline(false))
        .compile_program(&program)
        .unwrap();

    assert!(text.contains("    je .Lpick_edge0\n"));
    assert!(text.contains(".Lpick_edge0:\n    movl $1, %"));
}

#[test]
fn swapped_values_are_copied_in_parallel() {
    let text = compile_sample("swap", BackendConfig::default());
    let body = &text[text.find(".Lmain_b").unwrap()..text.find(".Lmain_epilogue:").unwrap()];
    assert!(body.contains("    pushq %"), "back edge staged through the stack:\n{body}");
    assert!(body.contains("    popq %"));
}

#[test]
fn exhausting_the_pool_aborts_compilation() {
    let arena = Bump::new();
    let ast = AstBuilder::new(&arena);
    let p = || ast.var("p", 0);
    let mut total = p();
    for k in 1..12 {
        total = ast.binary(BinaryOp::Mul, total, ast.binary(BinaryOp::Add, p(), ast.int(k)));
    }
    let f = ast.function("main", &[ast.param("p", 0, Type::Int)], &[ast.ret(total)]);
    let program = ast.program(&[f]);
    let session = CompilationSession::new(&arena);

    let result = Compiler::new(&session, BackendConfig::default()).compile_program(&program);
    assert!(matches!(result, Err(CompileError::OutOfRegisters { .. })));
    assert_eq!(session.stats().functions_compiled, 0);
}

fn generate(graph: &Graph) -> CompileResult<FunctionAsm> {
    let registers = RegisterAllocator::new(RegisterStrategy::Dedicated).allocate(graph)?;
    CodeGenerator::new(graph, &registers).generate()
}

/// Start node and its side-effect projection in the start block.
fn entry(graph: &mut Graph) -> (NodeId, NodeId) {
    let block = graph.start_block();
    let start = graph.add_node(Node::new(NodeKind::Start, block, vec![]));
    let effect = graph.add_node(Node::new(
        NodeKind::Projection(ProjectionKind::SideEffect),
        block,
        vec![start],
    ));
    (start, effect)
}

#[test]
fn phi_arity_must_match_predecessors() {
    let mut graph = Graph::new("bad_phi");
    let (start, effect) = entry(&mut graph);
    let start_block = graph.start_block();
    let p = graph.add_node(Node::new(NodeKind::Parameter(0), start_block, vec![start]));
    let branch = graph.add_node(Node::new(NodeKind::If, start_block, vec![p]));
    let on_true = graph.add_node(Node::new(
        NodeKind::Projection(ProjectionKind::True),
        start_block,
        vec![branch],
    ));
    let on_false = graph.add_node(Node::new(
        NodeKind::Projection(ProjectionKind::False),
        start_block,
        vec![branch],
    ));

    let then_block = graph.add_block();
    graph.add_predecessor(then_block, on_true);
    let then_jump = graph.add_node(Node::new(NodeKind::Jump, then_block, vec![]));
    let else_block = graph.add_block();
    graph.add_predecessor(else_block, on_false);
    let else_jump = graph.add_node(Node::new(NodeKind::Jump, else_block, vec![]));

    let join = graph.add_block();
    graph.add_predecessor(join, then_jump);
    graph.add_predecessor(join, else_jump);
    let phi = graph.add_node(Node::new(NodeKind::Phi { side_effect: false }, join, vec![p]));
    let ret = graph.add_node(Node::new(NodeKind::Return, join, vec![effect, phi]));
    let end = graph.end_block();
    graph.add_predecessor(end, ret);

    match generate(&graph) {
        Err(CompileError::MalformedPhi {
            function,
            phi: reported,
            operands,
            predecessors,
        }) => {
            assert_eq!(function, "bad_phi");
            assert_eq!(reported, phi);
            assert_eq!(operands, 1);
            assert_eq!(predecessors, 2);
        }
        other => panic!("expected MalformedPhi, got {other:?}"),
    }
}

#[test]
fn reachable_block_without_terminator_is_rejected() {
    let mut graph = Graph::new("open");
    entry(&mut graph);
    let start_block = graph.start_block();
    let jump = graph.add_node(Node::new(NodeKind::Jump, start_block, vec![]));
    let open = graph.add_block();
    graph.add_predecessor(open, jump);
    graph.add_node(Node::new(NodeKind::ConstInt(1), open, vec![]));

    match generate(&graph) {
        Err(CompileError::MissingTerminator { function, block }) => {
            assert_eq!(function, "open");
            assert_eq!(block, open);
        }
        other => panic!("expected MissingTerminator, got {other:?}"),
    }
}

#[test]
fn unlinked_jump_is_rejected() {
    let mut graph = Graph::new("dangling");
    entry(&mut graph);
    let start_block = graph.start_block();
    let jump = graph.add_node(Node::new(NodeKind::Jump, start_block, vec![]));

    match generate(&graph) {
        Err(CompileError::DanglingControl { function, node }) => {
            assert_eq!(function, "dangling");
            assert_eq!(node, jump);
        }
        other => panic!("expected DanglingControl, got {other:?}"),
    }
}
