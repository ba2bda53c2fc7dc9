mod common;

use cinder_bound::{BoundFactory, MethodDescriptor, MethodRef, NoOpFlavor};
use cinder_codegen::{CompilationModule, EmitStyle, IndirectReturnState, ModuleTranslator};
use cinder_config::{CodegenOptions, OptimizationLevel};
use cinder_il::OpCode;
use cinder_type::{file::FileId, span::Span};

const FILE: FileId = FileId::new(1);

fn span(
  start: u32,
  end: u32,
) -> Span {
  Span::at(FILE, start, end)
}

fn work(module: &CompilationModule) -> MethodRef {
  MethodRef {
    name: "Work".to_string(),
    declaring_type: module.types().object(),
    parameters: vec![],
    return_type: module.types().void(),
    returns_void: true,
    is_static: true,
    is_virtual: false,
  }
}

#[test]
fn empty_visible_point_gets_nop_in_debug() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Main", void, true).with_body_syntax(span(0, 50), Some(span(49, 50)));
  let body = f.block(
    vec![],
    vec![
      f.sequence_point_at(span(2, 10), Some(f.block(vec![], vec![]))),
      f.sequence_point_at(span(12, 20), Some(f.ret(None))),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(result.opcodes(), vec![OpCode::Nop, OpCode::Ret]);
  assert!(result.emits_sequence_points);

  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 2);
  assert_eq!((points[0].offset, points[0].span.clone()), (0, Some(span(2, 10))));
  assert_eq!((points[1].offset, points[1].span.clone()), (1, Some(span(12, 20))));
  assert!(points.iter().all(|p| p.document == FILE));
}

#[test]
fn release_keeps_last_point_at_an_offset() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Main", void, true).with_body_syntax(span(0, 50), Some(span(49, 50)));
  let body = f.block(
    vec![],
    vec![
      f.sequence_point_at(span(2, 10), Some(f.block(vec![], vec![]))),
      f.sequence_point_at(span(12, 20), Some(f.ret(None))),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::release_config());

  assert_eq!(result.opcodes(), vec![OpCode::Ret]);

  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 1);
  assert_eq!(points[0].offset, 0);
  assert_eq!(points[0].span, Some(span(12, 20)));
}

#[test]
fn hidden_point_never_gets_nop() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Main", void, true);
  let body = f.block(
    vec![],
    vec![f.hidden_sequence_point(Some(f.block(vec![], vec![]))), f.ret(None)],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(result.opcodes(), vec![OpCode::Ret]);
  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 1);
  assert!(points[0].is_hidden());
}

#[test]
fn synthetic_span_is_emitted_hidden() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Main", void, true);
  let body = f.sequence_point_at(Span::synthetic(), Some(f.ret(None)));
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 1);
  assert!(points[0].is_hidden());
}

#[test]
fn synthesized_method_starts_with_hidden_point() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Thunk", void, true)
    .synthesized(true)
    .with_body_syntax(span(0, 50), None);
  let body = f.block(
    vec![],
    vec![
      f.expr_stmt(f.call(work(&module), None, vec![])),
      f.sequence_point_at(span(12, 20), Some(f.ret(None))),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(result.style, EmitStyle::Debug);
  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 2);
  assert!(points[0].is_hidden());
  assert_eq!(points[0].offset, 0);
  assert_eq!(points[1].offset, 5);
}

#[test]
fn synthesized_hidden_point_survives_a_leading_visible_point() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Thunk", void, true)
    .synthesized(true)
    .with_body_syntax(span(0, 50), None);
  let body = f.block(
    vec![],
    vec![f.sequence_point_at(span(2, 10), Some(f.expr_stmt(f.call(work(&module), None, vec![]))))],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(result.opcodes(), vec![OpCode::Call, OpCode::Ret]);
  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 2);
  assert!(points[0].is_hidden());
  assert_eq!(points[0].offset, 0);
  assert_eq!((points[1].offset, points[1].span.clone()), (0, Some(span(2, 10))));
}

#[test]
fn empty_synthesized_method_gets_hidden_point_and_ret() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Init", void, true).synthesized(false);
  let result = common::generate(&mut module, &method, f.block(vec![], vec![]), &common::debug_config());

  assert_eq!(result.opcodes(), vec![OpCode::Ret]);
  assert_eq!(result.indirect_return_state, IndirectReturnState::NotNeeded);
  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 1);
  assert!(points[0].is_hidden());
  assert_eq!(points[0].offset, 0);
}

#[test]
fn code_less_synthesized_method_is_forced_to_release() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Glue", void, true).synthesized(false);
  let body = f.block(vec![], vec![f.nop(NoOpFlavor::Default), f.ret(None)]);
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(result.style, EmitStyle::Release);
  assert_eq!(result.opcodes(), vec![OpCode::Ret]);
}

#[test]
fn debug_plus_selects_debug_friendly_release() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let config = common::release_config().with_codegen(CodegenOptions {
    optimization: OptimizationLevel::Release,
    debug_plus: true,
    ..CodegenOptions::default()
  });
  let method = MethodDescriptor::new("Main", void, true);
  let result = common::generate(&mut module, &method, f.ret(None), &config);

  assert_eq!(result.style, EmitStyle::DebugFriendlyRelease);
}

#[test]
fn methods_without_debug_info_get_no_points() {
  let mut module = common::module();
  let void = module.types().void();
  let f = BoundFactory::default();

  let method = MethodDescriptor::new("Main", void, true).with_debug_info(false);
  let body = f.block(
    vec![],
    vec![
      f.sequence_point_at(span(2, 10), Some(f.block(vec![], vec![]))),
      f.ret(None),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert!(!result.emits_sequence_points);
  assert!(result.body().sequence_points.is_empty());
  assert_eq!(result.opcodes(), vec![OpCode::Nop, OpCode::Ret]);
}

#[test]
fn epilogue_gets_closing_brace_point() {
  let mut module = common::module();
  let i32 = module.types().i32();
  let f = BoundFactory::default();

  let body = || {
    f.try_finally(
      f.block(vec![], vec![f.ret(Some(f.int(1, i32)))]),
      f.block(vec![], vec![]),
    )
  };

  let method = MethodDescriptor::new("Get", i32, false).with_body_syntax(span(0, 50), Some(span(49, 50)));
  let result = common::generate(&mut module, &method, body(), &common::debug_config());

  let points = &result.body().sequence_points;
  assert_eq!(points.len(), 1);
  assert_eq!(points[0].offset, 8);
  assert_eq!(points[0].span, Some(span(49, 50)));

  let iterator = method.clone().iterator();
  let result = common::generate(&mut module, &iterator, body(), &common::debug_config());
  assert!(result.body().sequence_points.is_empty());
}
