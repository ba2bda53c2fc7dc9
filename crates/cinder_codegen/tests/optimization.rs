mod common;

use cinder_bound::{BinaryOperator, BoundFactory, BoundStatement, MethodDescriptor};
use cinder_codegen::{EmitStyle, ModuleTranslator};
use cinder_config::{CodegenOptions, OptimizationLevel};
use cinder_il::OpCode;
use cinder_type::types::TypeStore;

/// `int Twice(int x) { int t = x * 2; return t + 1; }`
fn single_use_temp(
  f: &mut BoundFactory,
  types: &TypeStore,
) -> BoundStatement {
  let i32 = types.i32();
  let t = f.local("t", i32);
  f.block(
    vec![t.clone()],
    vec![
      f.store(&t, f.binary(BinaryOperator::Mul, f.param(0, i32), f.int(2, i32), i32)),
      f.ret(Some(f.binary(BinaryOperator::Add, f.local_ref(&t), f.int(1, i32), i32))),
    ],
  )
}

fn twice(types: &TypeStore) -> MethodDescriptor {
  MethodDescriptor::new("Twice", types.i32(), false).with_parameters(vec![types.i32()])
}

#[test]
fn release_keeps_single_use_local_on_stack() {
  let mut module = common::module();
  let mut f = BoundFactory::default();
  let method = twice(module.types());
  let body = single_use_temp(&mut f, module.types());
  let result = common::generate(&mut module, &method, body, &common::release_config());

  assert_eq!(result.style, EmitStyle::Release);
  assert_eq!(result.stack_local_count, 1);
  assert_eq!(
    result.opcodes(),
    vec![OpCode::Ldarg0, OpCode::LdcI42, OpCode::Mul, OpCode::LdcI41, OpCode::Add, OpCode::Ret]
  );
  assert!(result.body().locals.is_empty());
  common::assert_verifies(&result, true);
}

#[test]
fn debug_friendly_release_keeps_user_locals() {
  let mut module = common::module();
  let mut f = BoundFactory::default();
  let method = twice(module.types());
  let body = single_use_temp(&mut f, module.types());

  let config = common::release_config().with_codegen(CodegenOptions {
    optimization: OptimizationLevel::Release,
    debug_plus: true,
    ..CodegenOptions::default()
  });
  let result = common::generate(&mut module, &method, body, &config);

  assert_eq!(result.style, EmitStyle::DebugFriendlyRelease);
  assert_eq!(result.stack_local_count, 0);
  assert_eq!(
    result.opcodes(),
    vec![
      OpCode::Ldarg0,
      OpCode::LdcI42,
      OpCode::Mul,
      OpCode::Stloc0,
      OpCode::Ldloc0,
      OpCode::LdcI41,
      OpCode::Add,
      OpCode::Ret,
    ]
  );
  assert_eq!(result.body().locals[0].name.as_deref(), Some("t"));
  common::assert_verifies(&result, true);
}

#[test]
fn debug_never_schedules_stack_locals() {
  let mut module = common::module();
  let mut f = BoundFactory::default();
  let method = twice(module.types());
  let body = single_use_temp(&mut f, module.types());
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(result.style, EmitStyle::Debug);
  assert_eq!(result.stack_local_count, 0);
  assert!(result.opcodes().contains(&OpCode::Stloc0));
}
