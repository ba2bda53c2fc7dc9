mod common;

use cinder_bound::{BinaryOperator, BoundExpression, BoundFactory, BoundStatement, MethodDescriptor, UnaryOperator};
use cinder_codegen::ModuleTranslator;
use cinder_config::OptimizationLevel;
use cinder_il::verify_body;
use cinder_type::types::TypeStore;
use proptest::prelude::*;

/// Integer expression over `(int a, int b, bool c)`.
#[derive(Debug, Clone)]
enum IntTree {
  Param(u16),
  Constant(i32),
  Negate(Box<IntTree>),
  Binary(BinaryOperator, Box<IntTree>, Box<IntTree>),
  Choose(BoolTree, Box<IntTree>, Box<IntTree>),
}

#[derive(Debug, Clone)]
enum BoolTree {
  Param,
  Literal(bool),
  Compare(BinaryOperator, IntLeaf, IntLeaf),
  And(Box<BoolTree>, Box<BoolTree>),
  Or(Box<BoolTree>, Box<BoolTree>),
  Not(Box<BoolTree>),
}

#[derive(Debug, Clone)]
enum IntLeaf {
  Param(u16),
  Constant(i32),
}

fn arithmetic() -> impl Strategy<Value = BinaryOperator> {
  prop_oneof![
    Just(BinaryOperator::Add),
    Just(BinaryOperator::Sub),
    Just(BinaryOperator::Mul),
    Just(BinaryOperator::BitAnd),
    Just(BinaryOperator::BitOr),
    Just(BinaryOperator::Xor),
  ]
}

fn comparison() -> impl Strategy<Value = BinaryOperator> {
  prop_oneof![
    Just(BinaryOperator::Eq),
    Just(BinaryOperator::Ne),
    Just(BinaryOperator::Lt),
    Just(BinaryOperator::Le),
    Just(BinaryOperator::Gt),
    Just(BinaryOperator::Ge),
  ]
}

fn int_leaf() -> impl Strategy<Value = IntLeaf> {
  prop_oneof![(0u16..2).prop_map(IntLeaf::Param), (-200i32..200).prop_map(IntLeaf::Constant)]
}

fn bool_tree() -> impl Strategy<Value = BoolTree> {
  let leaf = prop_oneof![
    Just(BoolTree::Param),
    any::<bool>().prop_map(BoolTree::Literal),
    (comparison(), int_leaf(), int_leaf()).prop_map(|(op, l, r)| BoolTree::Compare(op, l, r)),
  ];

  leaf.prop_recursive(3, 12, 2, |inner| {
    prop_oneof![
      (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolTree::And(Box::new(l), Box::new(r))),
      (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolTree::Or(Box::new(l), Box::new(r))),
      inner.prop_map(|b| BoolTree::Not(Box::new(b))),
    ]
  })
}

fn int_tree() -> impl Strategy<Value = IntTree> {
  let leaf = prop_oneof![(0u16..2).prop_map(IntTree::Param), any::<i32>().prop_map(IntTree::Constant)];

  leaf.prop_recursive(4, 24, 3, |inner| {
    prop_oneof![
      inner.clone().prop_map(|t| IntTree::Negate(Box::new(t))),
      (arithmetic(), inner.clone(), inner.clone()).prop_map(|(op, l, r)| IntTree::Binary(op, Box::new(l), Box::new(r))),
      (bool_tree(), inner.clone(), inner).prop_map(|(c, t, e)| IntTree::Choose(c, Box::new(t), Box::new(e))),
    ]
  })
}

fn optimization() -> impl Strategy<Value = OptimizationLevel> {
  prop_oneof![Just(OptimizationLevel::Debug), Just(OptimizationLevel::Release)]
}

fn lower_leaf(
  f: &BoundFactory,
  types: &TypeStore,
  leaf: &IntLeaf,
) -> BoundExpression {
  match leaf {
    IntLeaf::Param(index) => f.param(*index, types.i32()),
    IntLeaf::Constant(value) => f.int(*value, types.i32()),
  }
}

fn lower_bool(
  f: &BoundFactory,
  types: &TypeStore,
  tree: &BoolTree,
) -> BoundExpression {
  let boolean = types.boolean();
  match tree {
    BoolTree::Param => f.param(2, boolean),
    BoolTree::Literal(value) => f.bool(*value, boolean),
    BoolTree::Compare(op, left, right) => {
      f.binary(*op, lower_leaf(f, types, left), lower_leaf(f, types, right), boolean)
    },
    BoolTree::And(left, right) => f.binary(
      BinaryOperator::LogicalAnd,
      lower_bool(f, types, left),
      lower_bool(f, types, right),
      boolean,
    ),
    BoolTree::Or(left, right) => f.binary(
      BinaryOperator::LogicalOr,
      lower_bool(f, types, left),
      lower_bool(f, types, right),
      boolean,
    ),
    BoolTree::Not(operand) => f.unary(UnaryOperator::Not, lower_bool(f, types, operand), boolean),
  }
}

fn lower_int(
  f: &BoundFactory,
  types: &TypeStore,
  tree: &IntTree,
) -> BoundExpression {
  let i32 = types.i32();
  match tree {
    IntTree::Param(index) => f.param(*index, i32),
    IntTree::Constant(value) => f.int(*value, i32),
    IntTree::Negate(operand) => f.unary(UnaryOperator::Neg, lower_int(f, types, operand), i32),
    IntTree::Binary(op, left, right) => f.binary(*op, lower_int(f, types, left), lower_int(f, types, right), i32),
    IntTree::Choose(condition, when_true, when_false) => f.conditional(
      lower_bool(f, types, condition),
      lower_int(f, types, when_true),
      lower_int(f, types, when_false),
    ),
  }
}

fn eval_method(types: &TypeStore) -> MethodDescriptor {
  MethodDescriptor::new("Eval", types.i32(), false).with_parameters(vec![types.i32(), types.i32(), types.boolean()])
}

fn run(
  body: impl FnOnce(&BoundFactory, &TypeStore) -> BoundStatement,
  optimization: OptimizationLevel,
) -> common::CodegenResult {
  let mut module = common::module();
  let f = BoundFactory::default();
  let method = eval_method(module.types());
  let statement = body(&f, module.types());
  common::generate(&mut module, &method, statement, &common::config(optimization))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Value expressions always lower to a stack-balanced body
    #[test]
    fn value_trees_verify(tree in int_tree(), level in optimization()) {
        let result = run(|f, types| f.ret(Some(lower_int(f, types, &tree))), level);

        prop_assert!(result.diagnostics.is_empty(), "unexpected diagnostics: {:?}", result.diagnostics.codes());
        let verified = verify_body(result.body(), true);
        prop_assert!(verified.is_ok(), "verification failed: {:?}", verified);
    }

    /// Branch conditions lower to jumps that land on instruction boundaries with matching heights
    #[test]
    fn branch_trees_verify(condition in bool_tree(), level in optimization()) {
        let result = run(
            |f, types| {
                f.if_(
                    lower_bool(f, types, &condition),
                    f.ret(Some(f.int(1, types.i32()))),
                    Some(f.ret(Some(f.int(2, types.i32())))),
                )
            },
            level,
        );

        let verified = verify_body(result.body(), true);
        prop_assert!(verified.is_ok(), "verification failed: {:?}", verified);
    }

    /// Generating the same tree twice yields the same body
    #[test]
    fn generation_is_deterministic(tree in int_tree(), level in optimization()) {
        let first = run(|f, types| f.ret(Some(lower_int(f, types, &tree))), level);
        let second = run(|f, types| f.ret(Some(lower_int(f, types, &tree))), level);

        prop_assert_eq!(first.body, second.body);
    }
}

#[test]
fn constant_condition_drops_the_dead_arm() {
  let result = run(
    |f, types| {
      f.if_(
        f.bool(true, types.boolean()),
        f.ret(Some(f.int(1, types.i32()))),
        Some(f.ret(Some(f.int(2, types.i32())))),
      )
    },
    OptimizationLevel::Release,
  );

  assert_eq!(verify_body(result.body(), true), Ok(()));
  assert!(result.body().instructions.iter().all(|i| !i.opcode.is_conditional_branch()));
}
