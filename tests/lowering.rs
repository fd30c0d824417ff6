//! End-to-end checks of AST-to-IR lowering: the structural properties of
//! the produced instruction streams rather than exact instruction-by-
//! instruction dumps.

use minicc::{
    ast::{AstBinaryOp, AstNode},
    generate_ir,
    ir::{
        function::Function,
        instruction::{BinaryOp, Inst},
        module::Module,
        ty::Type,
        value::Operand,
    },
};

fn lower(root: &mut AstNode) -> Module {
    let mut module = Module::new();
    generate_ir(&mut module, root).unwrap();
    module
}

fn placed(function: &Function) -> Vec<&Inst> {
    function.code.iter().map(|&id| &function.insts[id]).collect()
}

fn int_function(name: &str, params: Vec<AstNode>, body: Vec<AstNode>) -> AstNode {
    AstNode::function_def(
        name,
        Type::Int,
        AstNode::formal_params(params),
        AstNode::block(body),
    )
}

#[test]
fn function_skeleton() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![
            AstNode::formal_param("a", Type::Int),
            AstNode::formal_param("b", Type::Int),
        ],
        vec![AstNode::return_stmt(Some(AstNode::ident("a")))],
    )]);
    let module = lower(&mut root);

    let function = &module.functions.raw[0];
    let code = placed(function);

    // Entry first, Exit last, and one move per parameter right after the
    // entry.
    assert!(matches!(code[0], Inst::Entry));
    assert!(matches!(code.last().unwrap(), Inst::Exit { .. }));
    assert!(matches!(
        code[1],
        Inst::Move {
            source: Operand::Param(0),
            ..
        }
    ));
    assert!(matches!(
        code[2],
        Inst::Move {
            source: Operand::Param(1),
            ..
        }
    ));

    // The return slot is zero-initialized before the body runs.
    assert!(matches!(
        code[3],
        Inst::Move {
            source: Operand::Const(0),
            ..
        }
    ));

    // The exit label is placed exactly once, just before the epilogue.
    let exit_label = function.exit_label.unwrap();
    let label_positions: Vec<_> = function
        .code
        .iter()
        .enumerate()
        .filter(|&(_, &id)| id == exit_label)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(label_positions, vec![function.code.len() - 2]);
}

#[test]
fn comparisons_materialize_through_branches() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![
            AstNode::formal_param("a", Type::Int),
            AstNode::formal_param("b", Type::Int),
        ],
        vec![AstNode::return_stmt(Some(AstNode::binary(
            AstBinaryOp::Lt,
            AstNode::ident("a"),
            AstNode::ident("b"),
        )))],
    )]);
    let module = lower(&mut root);
    let code = placed(&module.functions.raw[0]);

    // One Lt instruction, then a branch diamond assigning 1 and 0 to the
    // same slot.
    let lt = code
        .iter()
        .position(|inst| matches!(inst, Inst::Binary { op: BinaryOp::Lt, .. }))
        .unwrap();
    assert!(matches!(code[lt + 1], Inst::Branch { .. }));

    let moved: Vec<_> = code[lt..]
        .iter()
        .filter_map(|inst| match inst {
            Inst::Move {
                destination,
                source: Operand::Const(c),
            } => Some((*destination, *c)),
            _ => None,
        })
        .collect();
    assert!(moved.len() >= 2);
    assert_eq!(moved[0].1, 1);
    assert_eq!(moved[1].1, 0);
    // Both arms target the same materialized result.
    assert_eq!(moved[0].0, moved[1].0);
}

#[test]
fn logical_and_short_circuits() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![
            AstNode::formal_param("a", Type::Int),
            AstNode::formal_param("b", Type::Int),
        ],
        vec![AstNode::return_stmt(Some(AstNode::binary(
            AstBinaryOp::And,
            AstNode::ident("a"),
            AstNode::ident("b"),
        )))],
    )]);
    let module = lower(&mut root);
    let function = &module.functions.raw[0];
    let code = placed(function);

    // The left operand's zero test branches before the right operand is
    // ever compared.
    let ne_positions: Vec<_> = code
        .iter()
        .enumerate()
        .filter(|(_, inst)| matches!(inst, Inst::Binary { op: BinaryOp::Ne, .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(ne_positions.len(), 2);

    let branch = code
        .iter()
        .position(|inst| matches!(inst, Inst::Branch { .. }))
        .unwrap();
    assert!(ne_positions[0] < branch);
    assert!(branch < ne_positions[1]);

    // The branch's negative edge lands on a label placed after the right
    // operand's test, skipping it entirely.
    let Inst::Branch { negative, .. } = code[branch] else {
        unreachable!()
    };
    let negative_pos = function.code.iter().position(|&id| id == *negative).unwrap();
    assert!(negative_pos > ne_positions[1]);
}

#[test]
fn logical_or_short_circuits() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![
            AstNode::formal_param("a", Type::Int),
            AstNode::formal_param("b", Type::Int),
        ],
        vec![AstNode::return_stmt(Some(AstNode::binary(
            AstBinaryOp::Or,
            AstNode::ident("a"),
            AstNode::ident("b"),
        )))],
    )]);
    let module = lower(&mut root);
    let function = &module.functions.raw[0];
    let code = placed(function);

    // The left operand's zero test branches before the right operand is
    // ever compared.
    let ne_positions: Vec<_> = code
        .iter()
        .enumerate()
        .filter(|(_, inst)| matches!(inst, Inst::Binary { op: BinaryOp::Ne, .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(ne_positions.len(), 2);

    let branch = code
        .iter()
        .position(|inst| matches!(inst, Inst::Branch { .. }))
        .unwrap();
    assert!(ne_positions[0] < branch);
    assert!(branch < ne_positions[1]);

    // The branch's positive edge lands on a label placed after the right
    // operand's test, skipping it entirely.
    let Inst::Branch { positive, .. } = code[branch] else {
        unreachable!()
    };
    let positive_pos = function.code.iter().position(|&id| id == *positive).unwrap();
    assert!(positive_pos > ne_positions[1]);

    // The left-true arm assigns 1 to the same result slot the right
    // operand's path created.
    let ones: Vec<_> = code
        .iter()
        .filter_map(|inst| match inst {
            Inst::Move {
                destination,
                source: Operand::Const(1),
            } => Some(*destination),
            _ => None,
        })
        .collect();
    assert_eq!(ones.len(), 2);
    assert_eq!(ones[0], ones[1]);
}

#[test]
fn constant_conditions_fold_to_jumps() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![],
        vec![
            AstNode::decl_stmt(vec![AstNode::var_decl(
                Type::Int,
                AstNode::var_def("x", None),
            )]),
            AstNode::if_stmt(
                AstNode::int(0),
                AstNode::block(vec![AstNode::assign(AstNode::ident("x"), AstNode::int(1))]),
                Some(AstNode::block(vec![AstNode::assign(
                    AstNode::ident("x"),
                    AstNode::int(2),
                )])),
            ),
            AstNode::return_stmt(Some(AstNode::ident("x"))),
        ],
    )]);
    let module = lower(&mut root);

    // No conditional branch survives a constant condition.
    assert!(
        placed(&module.functions.raw[0])
            .iter()
            .all(|inst| !matches!(inst, Inst::Branch { .. }))
    );
}

#[test]
fn infinite_loop_with_break() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![],
        vec![
            AstNode::while_stmt(
                AstNode::int(1),
                AstNode::block(vec![AstNode::break_stmt()]),
            ),
            AstNode::return_stmt(Some(AstNode::int(0))),
        ],
    )]);
    let module = lower(&mut root);
    let code = placed(&module.functions.raw[0]);

    // `while (1)` folds its test away; the break is an unconditional
    // jump out.
    assert!(code.iter().all(|inst| !matches!(inst, Inst::Branch { .. })));
    assert!(code.iter().any(|inst| matches!(inst, Inst::Jump { .. })));
}

#[test]
fn while_loop_has_a_back_edge() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![AstNode::formal_param("n", Type::Int)],
        vec![
            AstNode::while_stmt(
                AstNode::ident("n"),
                AstNode::block(vec![AstNode::assign(
                    AstNode::ident("n"),
                    AstNode::binary(AstBinaryOp::Sub, AstNode::ident("n"), AstNode::int(1)),
                )]),
            ),
            AstNode::return_stmt(Some(AstNode::int(0))),
        ],
    )]);
    let module = lower(&mut root);
    let function = &module.functions.raw[0];

    // Some placed jump must target a label placed before it: the jump
    // from the loop body back to the condition.
    let has_back_edge = function.code.iter().enumerate().any(|(i, &id)| {
        if let Inst::Jump { target } = function.insts[id] {
            function.code[..i].contains(&target)
        } else {
            false
        }
    });
    assert!(has_back_edge);
}

#[test]
fn array_access_offsets_use_declared_extents() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![],
        vec![
            AstNode::decl_stmt(vec![AstNode::var_decl(
                Type::Int,
                AstNode::array_def("a", vec![AstNode::int(3), AstNode::int(4)]),
            )]),
            AstNode::return_stmt(Some(AstNode::array_access(
                "a",
                vec![AstNode::int(2), AstNode::int(1)],
            ))),
        ],
    )]);
    let module = lower(&mut root);
    let code = placed(&module.functions.raw[0]);

    // Horner: (2 * 4 + 1) * 4 bytes, then base + offset, then a load.
    let mul = code
        .iter()
        .position(|inst| {
            matches!(
                inst,
                Inst::Binary {
                    op: BinaryOp::Mul,
                    lhs: Operand::Const(2),
                    rhs: Operand::Const(4),
                }
            )
        })
        .unwrap();
    assert!(matches!(
        code[mul + 1],
        Inst::Binary {
            op: BinaryOp::Add,
            rhs: Operand::Const(1),
            ..
        }
    ));
    assert!(matches!(
        code[mul + 2],
        Inst::Binary {
            op: BinaryOp::Mul,
            rhs: Operand::Const(4),
            ..
        }
    ));
    assert!(matches!(code[mul + 3], Inst::Binary { op: BinaryOp::Add, .. }));
    assert!(matches!(code[mul + 4], Inst::LoadArray { .. }));
}

#[test]
fn partial_array_access_produces_a_slice() {
    let mut root = AstNode::compile_unit(vec![
        AstNode::function_def(
            "g",
            Type::Void,
            AstNode::formal_params(vec![AstNode::array_param("p", Type::Int, vec![])]),
            AstNode::block(vec![]),
        ),
        AstNode::function_def(
            "f",
            Type::Void,
            AstNode::formal_params(vec![]),
            AstNode::block(vec![
                AstNode::decl_stmt(vec![AstNode::var_decl(
                    Type::Int,
                    AstNode::array_def("a", vec![AstNode::int(3), AstNode::int(4)]),
                )]),
                AstNode::call("g", vec![AstNode::array_access("a", vec![AstNode::int(2)])]),
            ]),
        ),
    ]);
    let module = lower(&mut root);
    let function = &module.functions.raw[1];

    let slice = placed(function)
        .into_iter()
        .find_map(|inst| match inst {
            Inst::ArraySlice { ty, .. } => Some(ty.clone()),
            _ => None,
        })
        .unwrap();
    // One consumed dimension leaves the trailing extent.
    assert_eq!(slice.dims, vec![4]);
}

#[test]
fn array_store_goes_through_the_cached_address() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![],
        vec![
            AstNode::decl_stmt(vec![AstNode::var_decl(
                Type::Int,
                AstNode::array_def("a", vec![AstNode::int(8)]),
            )]),
            AstNode::assign(
                AstNode::array_access("a", vec![AstNode::int(3)]),
                AstNode::int(7),
            ),
            AstNode::return_stmt(Some(AstNode::int(0))),
        ],
    )]);
    let module = lower(&mut root);
    let code = placed(&module.functions.raw[0]);

    let store = code
        .iter()
        .find_map(|inst| match inst {
            Inst::StoreArray { address, value, .. } => Some((*address, *value)),
            _ => None,
        })
        .unwrap();
    assert_eq!(store.1, Operand::Const(7));
    // The store's address is the access's own computed element address, a
    // temporary, not the array base.
    assert!(matches!(store.0, Operand::Temp(_)));
}

#[test]
fn calls_track_argument_pressure() {
    let mut root = AstNode::compile_unit(vec![
        int_function(
            "six",
            (0..6)
                .map(|i| AstNode::formal_param(&format!("p{i}"), Type::Int))
                .collect(),
            vec![AstNode::return_stmt(Some(AstNode::int(0)))],
        ),
        int_function(
            "f",
            vec![],
            vec![AstNode::return_stmt(Some(AstNode::call(
                "six",
                (0..6).map(AstNode::int).collect(),
            )))],
        ),
    ]);
    let module = lower(&mut root);

    let caller = &module.functions.raw[1];
    assert!(caller.has_call);
    assert_eq!(caller.max_call_args, 6);

    let callee = &module.functions.raw[0];
    assert!(!callee.has_call);
    assert_eq!(callee.params.len(), 6);
}

#[test]
fn call_arity_is_checked() {
    let mut root = AstNode::compile_unit(vec![
        int_function(
            "g",
            vec![AstNode::formal_param("a", Type::Int)],
            vec![AstNode::return_stmt(Some(AstNode::ident("a")))],
        ),
        int_function(
            "f",
            vec![],
            vec![AstNode::return_stmt(Some(
                AstNode::call("g", vec![]).at_line(12),
            ))],
        ),
    ]);

    let mut module = Module::new();
    let error = generate_ir(&mut module, &mut root).unwrap_err();
    assert!(matches!(
        error,
        minicc::LowerError::ArityMismatch {
            line: 12,
            expected: 1,
            found: 0,
            ..
        }
    ));
}

#[test]
fn calling_an_undefined_function_fails() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![],
        vec![AstNode::return_stmt(Some(AstNode::call(
            "missing",
            vec![],
        )))],
    )]);

    let mut module = Module::new();
    assert!(matches!(
        generate_ir(&mut module, &mut root).unwrap_err(),
        minicc::LowerError::UndefinedFunction { .. }
    ));
}

#[test]
fn shadowing_resolves_innermost_first() {
    let mut root = AstNode::compile_unit(vec![
        AstNode::decl_stmt(vec![AstNode::var_decl(
            Type::Int,
            AstNode::var_def("x", Some(AstNode::int(1))),
        )]),
        int_function(
            "f",
            vec![],
            vec![
                AstNode::decl_stmt(vec![AstNode::var_decl(
                    Type::Int,
                    AstNode::var_def("x", Some(AstNode::int(2))),
                )]),
                AstNode::return_stmt(Some(AstNode::ident("x"))),
            ],
        ),
    ]);
    let module = lower(&mut root);

    // The return reads the local, not the global.
    let function = &module.functions.raw[0];
    let reads_local = placed(function).iter().any(|inst| {
        matches!(
            inst,
            Inst::Move {
                source: Operand::Local(_),
                ..
            }
        )
    });
    assert!(reads_local);
}

#[test]
fn unsized_array_parameter_keeps_a_zero_extent() {
    let mut root = AstNode::compile_unit(vec![AstNode::function_def(
        "f",
        Type::Int,
        AstNode::formal_params(vec![AstNode::array_param(
            "a",
            Type::Int,
            vec![AstNode::int(4)],
        )]),
        AstNode::block(vec![AstNode::return_stmt(Some(AstNode::array_access(
            "a",
            vec![AstNode::int(1), AstNode::int(2)],
        )))]),
    )]);
    let module = lower(&mut root);
    let function = &module.functions.raw[0];

    let Type::Array(array) = &function.locals.raw[0].ty else {
        panic!("parameter local should be array-typed");
    };
    assert_eq!(array.dims, vec![0, 4]);
    assert!(array.is_unsized());
}

#[test]
fn relowering_the_same_tree_is_idempotent() {
    let mut root = AstNode::compile_unit(vec![int_function(
        "f",
        vec![AstNode::formal_param("n", Type::Int)],
        vec![
            AstNode::if_stmt(
                AstNode::binary(AstBinaryOp::Gt, AstNode::ident("n"), AstNode::int(0)),
                AstNode::block(vec![AstNode::return_stmt(Some(AstNode::ident("n")))]),
                None,
            ),
            AstNode::return_stmt(Some(AstNode::neg(AstNode::ident("n")))),
        ],
    )]);

    // Handlers rebuild every node's value and instruction list from
    // scratch, so the same tree lowers identically into a fresh module.
    let first = minicc::compile(&mut root, &minicc::CodegenOptions::default()).unwrap();
    let second = minicc::compile(&mut root, &minicc::CodegenOptions::default()).unwrap();
    assert_eq!(first, second);
}
