//! Bundled sample programs with their expected exit codes.
//!
//! Used by the `emit_samples` tool and by the end-to-end tests. Each sample
//! is the AST a front-end would produce for the source shown in its docs.

use crate::ast::{AssignOp, AstBuilder, BinaryOp, Program, Type};

pub struct Sample {
    pub name: &'static str,
    /// Source the AST corresponds to.
    pub source: &'static str,
    /// Process exit status of the compiled program.
    pub expected_exit: i32,
    build: for<'a> fn(AstBuilder<'a>) -> Program<'a>,
}

impl Sample {
    pub fn program<'a>(&self, ast: AstBuilder<'a>) -> Program<'a> {
        (self.build)(ast)
    }
}

pub fn all() -> &'static [Sample] {
    &SAMPLES
}

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|sample| sample.name == name)
}

static SAMPLES: [Sample; 10] = [
    Sample {
        name: "fold",
        source: "int main() { return 1 + 2 * 3; }",
        expected_exit: 7,
        build: fold,
    },
    Sample {
        name: "while",
        source: "int main() { int x = 0; while (x < 3) { x = x + 1; } return x; }",
        expected_exit: 3,
        build: while_loop,
    },
    Sample {
        name: "div_zero",
        source: "int main() { return 10 / 0; }",
        expected_exit: 136,
        build: div_zero,
    },
    Sample {
        name: "logical_and",
        source: "int main() { return (1 < 2) && (3 > 2); }",
        expected_exit: 1,
        build: logical_and,
    },
    Sample {
        name: "for_continue",
        source: "int main() { int s = 0; for (int i = 0; i < 5; i += 1) { if (i == 2) continue; s += i; } return s; }",
        expected_exit: 8,
        build: for_continue,
    },
    Sample {
        name: "break_ternary",
        source: "int main() { int x = 0; while (true) { x += 1; if (x >= 5) break; } return x > 3 ? x * 2 : 0; }",
        expected_exit: 10,
        build: break_ternary,
    },
    Sample {
        name: "swap",
        source: "int main() { int a = 1; int b = 2; int i = 0; while (i < 3) { int t = a; a = b; b = t; i = i + 1; } return a * 10 + b; }",
        expected_exit: 21,
        build: swap,
    },
    Sample {
        name: "calls",
        source: "int add(int a, int b) { return a + b; } int main() { return add(20, 22) - add(1, 1); }",
        expected_exit: 40,
        build: calls,
    },
    Sample {
        name: "factorial",
        source: "int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); } int main() { return fact(5); }",
        expected_exit: 120,
        build: factorial,
    },
    Sample {
        name: "bits",
        source: "int bits(int x) { return ((x << 2) | 3) % 7 + (x >> 1) + (~x & 1); } int main() { return bits(12); }",
        expected_exit: 9,
        build: bits,
    },
];

fn fold(ast: AstBuilder<'_>) -> Program<'_> {
    let product = ast.binary(BinaryOp::Mul, ast.int(2), ast.int(3));
    let body = ast.ret(ast.binary(BinaryOp::Add, ast.int(1), product));
    ast.program(&[ast.function("main", &[], &[body])])
}

fn while_loop(ast: AstBuilder<'_>) -> Program<'_> {
    let x = || ast.var("x", 0);
    let body = ast.block(&[ast.assign("x", 0, ast.binary(BinaryOp::Add, x(), ast.int(1)))]);
    ast.program(&[ast.function(
        "main",
        &[],
        &[
            ast.declare("x", 0, Type::Int, Some(ast.int(0))),
            ast.while_loop(ast.binary(BinaryOp::Less, x(), ast.int(3)), body),
            ast.ret(x()),
        ],
    )])
}

fn div_zero(ast: AstBuilder<'_>) -> Program<'_> {
    let body = ast.ret(ast.binary(BinaryOp::Div, ast.int(10), ast.int(0)));
    ast.program(&[ast.function("main", &[], &[body])])
}

fn logical_and(ast: AstBuilder<'_>) -> Program<'_> {
    let less = ast.binary(BinaryOp::Less, ast.int(1), ast.int(2));
    let greater = ast.binary(BinaryOp::Greater, ast.int(3), ast.int(2));
    let body = ast.ret(ast.binary(BinaryOp::LogicalAnd, less, greater));
    ast.program(&[ast.function("main", &[], &[body])])
}

fn for_continue(ast: AstBuilder<'_>) -> Program<'_> {
    let i = || ast.var("i", 1);
    let skip = ast.if_else(
        ast.binary(BinaryOp::Equal, i(), ast.int(2)),
        ast.continue_stmt(),
        None,
    );
    let body = ast.block(&[skip, ast.compound_assign("s", 0, AssignOp::Add, i())]);
    let for_loop = ast.for_loop(
        Some(ast.declare("i", 1, Type::Int, Some(ast.int(0)))),
        ast.binary(BinaryOp::Less, i(), ast.int(5)),
        Some(ast.compound_assign("i", 1, AssignOp::Add, ast.int(1))),
        body,
    );
    ast.program(&[ast.function(
        "main",
        &[],
        &[
            ast.declare("s", 0, Type::Int, Some(ast.int(0))),
            for_loop,
            ast.ret(ast.var("s", 0)),
        ],
    )])
}

fn break_ternary(ast: AstBuilder<'_>) -> Program<'_> {
    let x = || ast.var("x", 0);
    let body = ast.block(&[
        ast.compound_assign("x", 0, AssignOp::Add, ast.int(1)),
        ast.if_else(
            ast.binary(BinaryOp::GreaterEqual, x(), ast.int(5)),
            ast.break_stmt(),
            None,
        ),
    ]);
    let result = ast.ternary(
        ast.binary(BinaryOp::Greater, x(), ast.int(3)),
        ast.binary(BinaryOp::Mul, x(), ast.int(2)),
        ast.int(0),
    );
    ast.program(&[ast.function(
        "main",
        &[],
        &[
            ast.declare("x", 0, Type::Int, Some(ast.int(0))),
            ast.while_loop(ast.boolean(true), body),
            ast.ret(result),
        ],
    )])
}

fn swap(ast: AstBuilder<'_>) -> Program<'_> {
    let var = |name: &str| ast.var(name, 0);
    let body = ast.block(&[
        ast.declare("t", 1, Type::Int, Some(var("a"))),
        ast.assign("a", 0, var("b")),
        ast.assign("b", 0, ast.var("t", 1)),
        ast.assign("i", 0, ast.binary(BinaryOp::Add, var("i"), ast.int(1))),
    ]);
    let result = ast.binary(
        BinaryOp::Add,
        ast.binary(BinaryOp::Mul, var("a"), ast.int(10)),
        var("b"),
    );
    ast.program(&[ast.function(
        "main",
        &[],
        &[
            ast.declare("a", 0, Type::Int, Some(ast.int(1))),
            ast.declare("b", 0, Type::Int, Some(ast.int(2))),
            ast.declare("i", 0, Type::Int, Some(ast.int(0))),
            ast.while_loop(ast.binary(BinaryOp::Less, var("i"), ast.int(3)), body),
            ast.ret(result),
        ],
    )])
}

fn calls(ast: AstBuilder<'_>) -> Program<'_> {
    let sum = ast.binary(BinaryOp::Add, ast.var("a", 0), ast.var("b", 0));
    let add = ast.function(
        "add",
        &[ast.param("a", 0, Type::Int), ast.param("b", 0, Type::Int)],
        &[ast.ret(sum)],
    );
    let difference = ast.binary(
        BinaryOp::Sub,
        ast.call("add", &[ast.int(20), ast.int(22)]),
        ast.call("add", &[ast.int(1), ast.int(1)]),
    );
    let main = ast.function("main", &[], &[ast.ret(difference)]);
    ast.program(&[add, main])
}

fn factorial(ast: AstBuilder<'_>) -> Program<'_> {
    let n = || ast.var("n", 0);
    let base = ast.if_else(
        ast.binary(BinaryOp::LessEqual, n(), ast.int(1)),
        ast.ret(ast.int(1)),
        None,
    );
    let recurse = ast.call("fact", &[ast.binary(BinaryOp::Sub, n(), ast.int(1))]);
    let fact = ast.function(
        "fact",
        &[ast.param("n", 0, Type::Int)],
        &[base, ast.ret(ast.binary(BinaryOp::Mul, n(), recurse))],
    );
    let main = ast.function("main", &[], &[ast.ret(ast.call("fact", &[ast.int(5)]))]);
    ast.program(&[fact, main])
}

fn bits(ast: AstBuilder<'_>) -> Program<'_> {
    let x = || ast.var("x", 0);
    let shifted = ast.binary(
        BinaryOp::BitOr,
        ast.binary(BinaryOp::ShiftLeft, x(), ast.int(2)),
        ast.int(3),
    );
    let remainder = ast.binary(BinaryOp::Mod, shifted, ast.int(7));
    let half = ast.binary(BinaryOp::ShiftRight, x(), ast.int(1));
    let low_bit = ast.binary(BinaryOp::BitAnd, ast.bit_not(x()), ast.int(1));
    let total = ast.binary(
        BinaryOp::Add,
        ast.binary(BinaryOp::Add, remainder, half),
        low_bit,
    );
    let bits = ast.function("bits", &[ast.param("x", 0, Type::Int)], &[ast.ret(total)]);
    let main = ast.function("main", &[], &[ast.ret(ast.call("bits", &[ast.int(12)]))]);
    ast.program(&[bits, main])
}
