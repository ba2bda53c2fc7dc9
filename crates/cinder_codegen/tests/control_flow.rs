mod common;

use cinder_bound::{BoundFactory, MethodDescriptor, MethodRef};
use cinder_codegen::{CompilationModule, ModuleTranslator};
use cinder_il::{HandlerKind, OpCode, Operand, RealizedBody};

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

fn targets(body: &RealizedBody) -> Vec<(u32, u32)> {
  body
    .instructions
    .iter()
    .filter_map(|i| match i.operand {
      Operand::Target(target) => Some((i.offset, target)),
      _ => None,
    })
    .collect()
}

#[test]
fn break_and_continue_jump_to_loop_labels() {
  let mut module = common::module();
  let void = module.types().void();
  let boolean = module.types().boolean();
  let f = BoundFactory::default();

  let call = f.expr_stmt(f.call(work(&module), None, vec![]));
  let method = MethodDescriptor::new("Spin", void, true).with_parameters(vec![boolean, boolean, boolean]);
  let body = f.while_(
    Some(f.param(0, boolean)),
    f.block(
      vec![],
      vec![
        f.if_(f.param(1, boolean), f.break_(), None),
        f.if_(f.param(2, boolean), f.continue_(), None),
        call,
      ],
    ),
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(
    result.opcodes(),
    vec![
      OpCode::Br,
      OpCode::Ldarg1,
      OpCode::Brfalse,
      OpCode::Br,
      OpCode::Ldarg2,
      OpCode::Brfalse,
      OpCode::Br,
      OpCode::Call,
      OpCode::Ldarg0,
      OpCode::Brtrue,
      OpCode::Ret,
    ]
  );
  // Entry jump and `continue` reach the condition; `break` reaches the exit.
  assert_eq!(
    targets(result.body()),
    vec![(0, 32), (6, 16), (11, 38), (17, 27), (22, 32), (33, 5)]
  );
  common::assert_verifies(&result, false);
}

#[test]
fn break_out_of_try_finally_becomes_leave() {
  let mut module = common::module();
  let void = module.types().void();
  let boolean = module.types().boolean();
  let f = BoundFactory::default();
  let work = work(&module);

  let body = || {
    f.while_(
      Some(f.param(0, boolean)),
      f.try_finally(
        f.block(
          vec![],
          vec![
            f.if_(f.param(1, boolean), f.break_(), None),
            f.expr_stmt(f.call(work.clone(), None, vec![])),
          ],
        ),
        f.block(vec![], vec![f.expr_stmt(f.call(work.clone(), None, vec![]))]),
      ),
    )
  };
  let method = MethodDescriptor::new("Drain", void, true).with_parameters(vec![boolean, boolean]);
  let debug = common::generate(&mut module, &method, body(), &common::debug_config());

  assert_eq!(
    debug.opcodes(),
    vec![
      OpCode::Br,
      OpCode::Ldarg1,
      OpCode::Brfalse,
      OpCode::Leave,
      OpCode::Call,
      OpCode::Leave,
      OpCode::Call,
      OpCode::Endfinally,
      OpCode::Ldarg0,
      OpCode::Brtrue,
      OpCode::Ret,
    ]
  );
  // `break` leaves the try straight to the exit; the end of the try leaves to the condition.
  assert_eq!(targets(debug.body()), vec![(0, 32), (6, 16), (11, 38), (21, 32), (33, 5)]);

  let region = &debug.body().exception_regions[0];
  assert_eq!(region.kind, HandlerKind::Finally);
  assert_eq!((region.try_start, region.try_end), (5, 26));
  assert_eq!((region.handler_start, region.handler_end), (26, 32));
  common::assert_verifies(&debug, false);

  let release = common::generate(&mut module, &method, body(), &common::release_config());
  common::assert_verifies(&release, false);
}

#[test]
fn conditional_goto_out_of_try_is_split_into_leave() {
  let mut module = common::module();
  let void = module.types().void();
  let boolean = module.types().boolean();
  let mut f = BoundFactory::default();

  let exit = f.label("exit");
  let method = MethodDescriptor::new("Bail", void, true).with_parameters(vec![boolean]);
  let body = f.block(
    vec![],
    vec![
      f.try_finally(
        f.block(
          vec![],
          vec![
            f.cond_goto(f.param(0, boolean), true, &exit),
            f.expr_stmt(f.call(work(&module), None, vec![])),
          ],
        ),
        f.block(vec![], vec![f.expr_stmt(f.call(work(&module), None, vec![]))]),
      ),
      f.label_stmt(&exit),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(
    result.opcodes(),
    vec![
      OpCode::Ldarg0,
      OpCode::Brfalse,
      OpCode::Leave,
      OpCode::Call,
      OpCode::Leave,
      OpCode::Call,
      OpCode::Endfinally,
      OpCode::Ret,
    ]
  );
  // The inverted branch skips over the inserted `leave`, which takes the original target.
  assert_eq!(targets(result.body()), vec![(1, 11), (6, 27), (16, 27)]);

  let region = &result.body().exception_regions[0];
  assert_eq!((region.try_start, region.try_end), (0, 21));
  assert_eq!((region.handler_start, region.handler_end), (21, 27));
  common::assert_verifies(&result, false);
}

#[test]
fn forward_goto_skips_dead_code() {
  let mut module = common::module();
  let void = module.types().void();
  let mut f = BoundFactory::default();

  let skip = f.label("skip");
  let method = MethodDescriptor::new("Skip", void, true);
  let body = f.block(
    vec![],
    vec![
      f.goto(&skip),
      f.expr_stmt(f.call(work(&module), None, vec![])),
      f.label_stmt(&skip),
      f.expr_stmt(f.call(work(&module), None, vec![])),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  // The skipped call is unreachable, which leaves the `br` pointing at the next instruction.
  assert_eq!(result.opcodes(), vec![OpCode::Call, OpCode::Ret]);
  common::assert_verifies(&result, false);
}

#[test]
fn backward_conditional_goto_forms_a_loop() {
  let mut module = common::module();
  let void = module.types().void();
  let boolean = module.types().boolean();
  let mut f = BoundFactory::default();

  let top = f.label("top");
  let method = MethodDescriptor::new("Again", void, true).with_parameters(vec![boolean]);
  let body = f.block(
    vec![],
    vec![
      f.label_stmt(&top),
      f.expr_stmt(f.call(work(&module), None, vec![])),
      f.cond_goto(f.param(0, boolean), true, &top),
    ],
  );
  let result = common::generate(&mut module, &method, body, &common::debug_config());

  assert_eq!(
    result.opcodes(),
    vec![OpCode::Call, OpCode::Ldarg0, OpCode::Brtrue, OpCode::Ret]
  );
  assert_eq!(targets(result.body()), vec![(6, 0)]);
  common::assert_verifies(&result, false);
}
