mod common;

use cinder_bound::{BoundFactory, MethodDescriptor, MethodRef, NoOpFlavor};
use cinder_codegen::{AsyncOffsets, CompilationModule, ModuleTranslator};
use cinder_il::OpCode;
use cinder_type::types::TypeId;

fn static_call(
  module: &CompilationModule,
  name: &str,
  declaring_type: TypeId,
) -> MethodRef {
  MethodRef {
    name: name.to_string(),
    declaring_type,
    parameters: vec![],
    return_type: module.types().void(),
    returns_void: true,
    is_static: true,
    is_virtual: false,
  }
}

#[test]
fn yield_and_resume_resolve_to_offsets() {
  let mut module = common::module();
  let void = module.types().void();
  let boolean = module.types().boolean();
  let object = module.types().object();
  let mut f = BoundFactory::default();

  let resume = f.label("resume");
  let method = MethodDescriptor::new("MoveNext", void, true)
    .asynchronous()
    .with_parameters(vec![boolean]);
  let body = f.block(
    vec![],
    vec![
      f.cond_goto(f.param(0, boolean), true, &resume),
      f.expr_stmt(f.call(static_call(&module, "Start", object), None, vec![])),
      f.nop(NoOpFlavor::AwaitYieldPoint),
      f.ret(None),
      f.label_stmt(&resume),
      f.nop(NoOpFlavor::AwaitResumePoint),
      f.expr_stmt(f.call(static_call(&module, "Finish", object), None, vec![])),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(
    result.opcodes(),
    vec![OpCode::Ldarg0, OpCode::Brtrue, OpCode::Call, OpCode::Ret, OpCode::Call, OpCode::Ret]
  );
  assert_eq!(
    result.offsets,
    AsyncOffsets {
      catch_handler_offset: None,
      yield_offsets: vec![11],
      resume_offsets: vec![12],
    }
  );
  assert!(result.diagnostics.is_empty());
  common::assert_verifies(&result, false);
}

#[test]
fn unreachable_yield_is_dropped_with_its_resume() {
  let mut module = common::module();
  let void = module.types().void();
  let boolean = module.types().boolean();
  let object = module.types().object();
  let mut f = BoundFactory::default();

  let resume = f.label("resume");
  let method = MethodDescriptor::new("MoveNext", void, true)
    .asynchronous()
    .with_parameters(vec![boolean]);
  let body = f.block(
    vec![],
    vec![
      f.cond_goto(f.param(0, boolean), true, &resume),
      f.ret(None),
      f.nop(NoOpFlavor::AwaitYieldPoint),
      f.expr_stmt(f.call(static_call(&module, "Start", object), None, vec![])),
      f.label_stmt(&resume),
      f.nop(NoOpFlavor::AwaitResumePoint),
      f.expr_stmt(f.call(static_call(&module, "Finish", object), None, vec![])),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(
    result.opcodes(),
    vec![OpCode::Ldarg0, OpCode::Brtrue, OpCode::Ret, OpCode::Call, OpCode::Ret]
  );
  assert!(result.offsets.yield_offsets.is_empty());
  assert!(result.offsets.resume_offsets.is_empty());
  assert_eq!(result.diagnostics.codes(), vec!["C0006"]);
  assert!(!result.diagnostics.has_errors());
  common::assert_verifies(&result, false);
}

#[test]
#[should_panic(expected = "resume point in 'MoveNext' is unreachable")]
fn unreachable_resume_point_panics() {
  let mut module = common::module();
  let void = module.types().void();
  let object = module.types().object();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("MoveNext", void, true).asynchronous();
  let body = f.block(
    vec![],
    vec![
      f.ret(None),
      f.nop(NoOpFlavor::AwaitYieldPoint),
      f.nop(NoOpFlavor::AwaitResumePoint),
      f.expr_stmt(f.call(static_call(&module, "Finish", object), None, vec![])),
    ],
  );
  common::generate(&mut module, &method, body, &common::debug_config());
}

#[test]
#[should_panic(expected = "yield point without a matching resume point in 'MoveNext'")]
fn trailing_yield_without_resume_panics() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("MoveNext", void, true).asynchronous();
  let body = f.block(vec![], vec![f.nop(NoOpFlavor::AwaitYieldPoint), f.ret(None)]);
  common::generate(&mut module, &method, body, &common::debug_config());
}

#[test]
fn synthesized_catch_all_reports_handler_offset() {
  let mut module = common::module();
  let void = module.types().void();
  let object = module.types().object();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("MoveNext", void, true).asynchronous();
  let body = f.try_catch(
    f.block(
      vec![],
      vec![f.expr_stmt(f.call(static_call(&module, "Work", object), None, vec![]))],
    ),
    vec![f.async_catch_all(None, f.block(vec![], vec![]))],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(
    result.opcodes(),
    vec![OpCode::Call, OpCode::Leave, OpCode::Pop, OpCode::Leave, OpCode::Ret]
  );
  assert_eq!(result.offsets.catch_handler_offset, Some(10));
  common::assert_verifies(&result, false);
}

#[test]
fn errors_leave_offsets_unresolved() {
  let mut module = common::module();
  let void = module.types().void();
  let error = module.types().error();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("MoveNext", void, true).asynchronous();
  let body = f.block(
    vec![],
    vec![
      f.expr_stmt(f.call(static_call(&module, "Missing", error), None, vec![])),
      f.nop(NoOpFlavor::AwaitYieldPoint),
      f.nop(NoOpFlavor::AwaitResumePoint),
      f.ret(None),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert!(result.body.is_none());
  assert_eq!(result.offsets, AsyncOffsets::default());
  assert_eq!(result.diagnostics.codes(), vec!["C0002"]);
  assert!(!result.has_ordinal_table);
}

#[test]
#[should_panic(expected = "yield point before the previous resume point")]
fn second_yield_without_resume_panics() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("MoveNext", void, true).asynchronous();
  let body = f.block(
    vec![],
    vec![
      f.nop(NoOpFlavor::AwaitYieldPoint),
      f.nop(NoOpFlavor::AwaitYieldPoint),
      f.ret(None),
    ],
  );
  common::generate(&mut module, &method, body, &common::debug_config());
}
