use cinder_config::{CinderConfig, DebugTrace};
use cinder_log::trace_dbg;
use cinder_type::{Store, file::FileId, span::Span};

use crate::{
  BasicBlock, BlockId, DebugPoint, GroupId, HandlerGroup, Instruction, InstructionSink, LabelId, LabelTarget,
  LocalDeclaration, LocalSlot, Marker, MarkerId, MarkerOffset, OpCode, Operand, Position, RealizedBody, Region,
  RegionId, RegionKind, ScopeKind, Terminator,
  realize::{Layout, realize},
};

enum OpenScope {
  Variable(usize),
  Group(GroupId),
  Region(RegionId),
}

pub(crate) struct ScopeRecord {
  pub start: Position,
  pub end: Option<Position>,
  pub locals: Vec<LocalSlot>,
}

/// Default [`InstructionSink`]: collects basic blocks and turns them into a [`RealizedBody`].
pub struct ILBuilder {
  config: CinderConfig,

  pub(crate) blocks: Store<BasicBlock>,
  pub(crate) labels: Store<LabelTarget>,
  pub(crate) markers: Store<Marker>,
  pub(crate) regions: Store<Region>,
  pub(crate) groups: Store<HandlerGroup>,
  pub(crate) scopes: Vec<ScopeRecord>,
  pub(crate) locals: Vec<LocalDeclaration>,

  /// Block receiving instructions.
  current: BlockId,
  current_region: Option<RegionId>,
  open_scopes: Vec<OpenScope>,

  stack: i32,
  pub(crate) max_stack: u32,
  emitted: usize,
  /// False right after an unconditional transfer, until a label is marked.
  reachable: bool,

  pub(crate) initial_document: Option<FileId>,
  pub(crate) initial_hidden: bool,

  layout: Option<Layout>,
  realized: Option<RealizedBody>,
}

impl ILBuilder {
  pub fn new(config: &CinderConfig) -> Self {
    let mut blocks = Store::new();
    let entry = blocks.alloc(BasicBlock::new(None));

    Self {
      config: config.clone(),
      blocks,
      labels: Store::new(),
      markers: Store::new(),
      regions: Store::new(),
      groups: Store::new(),
      scopes: Vec::new(),
      locals: Vec::new(),
      current: entry,
      current_region: None,
      open_scopes: Vec::new(),
      stack: 0,
      max_stack: 0,
      emitted: 0,
      reachable: true,
      initial_document: None,
      initial_hidden: false,
      layout: None,
      realized: None,
    }
  }

  /// Consumes the builder, returning the realized body if there is one.
  pub fn into_realized(self) -> Option<RealizedBody> {
    self.realized
  }

  fn position(&self) -> Position {
    Position {
      block: self.current,
      index: self.blocks.get(&self.current).instructions.len(),
    }
  }

  fn assert_not_realized(&self) {
    assert!(self.realized.is_none(), "cannot emit into a realized method body");
  }

  fn apply_stack(
    &mut self,
    delta: i32,
  ) {
    self.stack += delta;
    if self.stack > self.max_stack as i32 {
      self.max_stack = self.stack as u32;
    }
  }

  fn start_block(&mut self) -> BlockId {
    let block = self.blocks.alloc(BasicBlock::new(self.current_region));
    self.current = block;
    block
  }

  /// Ends the current block and continues in a fresh one.
  fn terminate(
    &mut self,
    terminator: Terminator,
    stack_delta: i32,
  ) {
    self.assert_not_realized();
    self.apply_stack(stack_delta);
    self.emitted += 1;
    self.reachable = terminator.falls_through();
    self.blocks.get_mut(&self.current).terminator = terminator;
    self.start_block();
  }

  /// Returns a block that starts at the current position, reusing the current one if nothing was emitted into it.
  fn block_at_boundary(&mut self) -> BlockId {
    if self.blocks.get(&self.current).instructions.is_empty()
      && self.blocks.get(&self.current).terminator == Terminator::FallThrough
    {
      return self.current;
    }
    self.start_block()
  }

  fn innermost_group(&self) -> GroupId {
    match self.open_scopes.last() {
      Some(OpenScope::Group(group)) => *group,
      _ => panic!("try, catch and finally scopes must be opened directly inside a try-catch-finally scope"),
    }
  }

  fn open_region(
    &mut self,
    kind: RegionKind,
  ) {
    let group = self.innermost_group();
    let parent = self.groups.get(&group).outer;
    let entry = self.block_at_boundary();
    let region = self.regions.alloc(Region {
      kind,
      group,
      parent,
      entry,
    });

    self.blocks.get_mut(&entry).region = Some(region);
    self.current_region = Some(region);

    let group_data = self.groups.get_mut(&group);
    match kind {
      RegionKind::Try => {
        assert!(group_data.try_region.is_none(), "try-catch-finally scope already has a try block");
        group_data.try_region = Some(region);
      },
      RegionKind::Catch(_) | RegionKind::Finally => {
        assert!(group_data.try_region.is_some(), "handler opened before its try block");
        group_data.handlers.push(region);
      },
    }

    match kind {
      RegionKind::Try => {
        debug_assert_eq!(self.stack, 0, "try block entered with a non-empty stack");
      },
      RegionKind::Catch(_) => {
        self.stack = 1;
        self.apply_stack(0);
        self.reachable = true;
      },
      RegionKind::Finally => {
        self.stack = 0;
        self.reachable = true;
      },
    }

    self.open_scopes.push(OpenScope::Region(region));
  }

  fn close_region(
    &mut self,
    region: RegionId,
  ) {
    let data = self.regions.get(&region).clone();
    let end_label = self.groups.get(&data.group).end_label;

    if self.reachable {
      match data.kind {
        RegionKind::Try | RegionKind::Catch(_) => self.terminate(Terminator::Leave(end_label), 0),
        RegionKind::Finally => self.terminate(Terminator::EndFinally, 0),
      }
    }

    self.stack = 0;
    self.current_region = data.parent;
    let next = self.block_at_boundary();
    self.blocks.get_mut(&next).region = data.parent;
  }

  fn trace_block_count(&self) {
    trace_dbg!(
      &self.config,
      DebugTrace::Builder,
      "{} blocks, {} labels, {} markers, max stack {}",
      self.blocks.len(),
      self.labels.len(),
      self.markers.len(),
      self.max_stack
    );
  }
}

impl InstructionSink for ILBuilder {
  fn emit(
    &mut self,
    opcode: OpCode,
    operand: Operand,
    stack_delta: i32,
  ) {
    self.assert_not_realized();
    assert!(
      !opcode.is_control_transfer(),
      "{} ends a basic block and must go through its dedicated emit method",
      opcode
    );

    self.blocks.get_mut(&self.current).instructions.push(Instruction {
      opcode,
      operand,
      stack_delta,
    });
    self.apply_stack(stack_delta);
    self.emitted += 1;
  }

  fn emit_branch(
    &mut self,
    opcode: OpCode,
    label: LabelId,
  ) {
    let terminator = match opcode {
      OpCode::Br => Terminator::Goto(label),
      OpCode::Leave => Terminator::Leave(label),
      op if op.is_conditional_branch() => Terminator::Branch { opcode: op, target: label },
      other => panic!("{} is not a branch", other),
    };
    let delta = opcode.stack_delta().unwrap_or(0);
    self.terminate(terminator, delta);

    if opcode == OpCode::Leave {
      self.stack = 0;
    }
  }

  fn emit_switch(
    &mut self,
    labels: &[LabelId],
  ) {
    self.terminate(Terminator::Switch(labels.to_vec()), -1);
  }

  fn emit_ret(
    &mut self,
    has_value: bool,
  ) {
    self.terminate(Terminator::Return { has_value }, -i32::from(has_value));
  }

  fn emit_throw(&mut self) {
    self.terminate(Terminator::Throw, -1);
  }

  fn emit_rethrow(&mut self) {
    self.terminate(Terminator::Rethrow, 0);
  }

  fn define_label(&mut self) -> LabelId {
    self.labels.alloc(LabelTarget::default())
  }

  fn mark_label(
    &mut self,
    label: LabelId,
  ) {
    self.assert_not_realized();
    assert!(
      self.labels.get(&label).block.is_none(),
      "label {:?} is already marked",
      label
    );

    let block = self.block_at_boundary();
    self.blocks.get_mut(&block).labels.push(label);
    self.labels.get_mut(&label).block = Some(block);
    self.reachable = true;
  }

  fn allocate_marker(&mut self) -> MarkerId {
    let at = self.position();
    self.markers.alloc(Marker { at })
  }

  fn set_initial_debug_document(
    &mut self,
    document: FileId,
  ) {
    self.initial_document = Some(document);
  }

  fn define_sequence_point(
    &mut self,
    span: &Span,
  ) {
    let at = self.position();
    self
      .blocks
      .get_mut(&at.block)
      .debug_points
      .push((at.index, DebugPoint::Span(span.clone())));
  }

  fn define_hidden_sequence_point(&mut self) {
    let at = self.position();
    self.blocks.get_mut(&at.block).debug_points.push((at.index, DebugPoint::Hidden));
  }

  fn define_initial_hidden_sequence_point(&mut self) {
    self.initial_hidden = true;
  }

  fn open_local_scope(
    &mut self,
    kind: ScopeKind,
  ) {
    self.assert_not_realized();

    match kind {
      ScopeKind::Variable => {
        self.scopes.push(ScopeRecord {
          start: self.position(),
          end: None,
          locals: Vec::new(),
        });
        self.open_scopes.push(OpenScope::Variable(self.scopes.len() - 1));
      },
      ScopeKind::TryCatchFinally => {
        let end_label = self.define_label();
        let group = self.groups.alloc(HandlerGroup {
          end_label,
          outer: self.current_region,
          try_region: None,
          handlers: Vec::new(),
        });
        self.open_scopes.push(OpenScope::Group(group));
      },
      ScopeKind::Try => self.open_region(RegionKind::Try),
      ScopeKind::Catch(token) => self.open_region(RegionKind::Catch(token)),
      ScopeKind::Finally => self.open_region(RegionKind::Finally),
    }
  }

  fn close_local_scope(&mut self) {
    self.assert_not_realized();

    match self.open_scopes.pop() {
      Some(OpenScope::Variable(index)) => {
        self.scopes[index].end = Some(self.position());
      },
      Some(OpenScope::Region(region)) => self.close_region(region),
      Some(OpenScope::Group(group)) => {
        let data = self.groups.get(&group);
        assert!(!data.handlers.is_empty(), "try-catch-finally scope closed without a handler");
        let end_label = data.end_label;
        self.mark_label(end_label);
        self.stack = 0;
      },
      None => panic!("close_local_scope without a matching open_local_scope"),
    }
  }

  fn declare_local(
    &mut self,
    local: LocalDeclaration,
  ) -> LocalSlot {
    assert!(self.locals.len() <= u16::MAX as usize, "local signature is full");

    let slot = LocalSlot(self.locals.len() as u16);
    self.locals.push(local);

    let innermost = self.open_scopes.iter().rev().find_map(|scope| match scope {
      OpenScope::Variable(index) => Some(*index),
      _ => None,
    });
    if let Some(index) = innermost {
      self.scopes[index].locals.push(slot);
    }

    slot
  }

  fn instructions_emitted(&self) -> usize {
    self.emitted
  }

  fn adjust_stack(
    &mut self,
    delta: i32,
  ) {
    self.apply_stack(delta);
  }

  fn stack_height(&self) -> u32 {
    self.stack.max(0) as u32
  }

  fn can_fall_through(&self) -> bool {
    self.reachable
  }

  fn realize(&mut self) {
    assert!(self.realized.is_none(), "method body realized twice");
    assert!(self.open_scopes.is_empty(), "method body realized with open scopes");

    self.trace_block_count();
    let (layout, body) = realize(self, &self.config);
    self.layout = Some(layout);
    self.realized = Some(body);
  }

  fn realized(&self) -> Option<&RealizedBody> {
    self.realized.as_ref()
  }

  fn resolve_marker(
    &self,
    marker: MarkerId,
  ) -> MarkerOffset {
    let layout = self
      .layout
      .as_ref()
      .unwrap_or_else(|| panic!("marker {:?} resolved before realization", marker));
    layout.resolve(self.markers.get(&marker).at)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Token;

  fn builder() -> ILBuilder {
    ILBuilder::new(&CinderConfig::default())
  }

  #[test]
  fn test_int_constants_use_short_forms() {
    let mut b = builder();
    for value in [-1, 0, 8, 9, -128, 128, 100_000] {
      b.emit_int_constant(value);
      b.emit_opcode(OpCode::Pop);
    }
    b.emit_ret(false);
    b.realize();

    let ops: Vec<_> = b.realized().unwrap().opcodes().into_iter().filter(|op| *op != OpCode::Pop).collect();
    assert_eq!(
      ops,
      vec![
        OpCode::LdcI4M1,
        OpCode::LdcI40,
        OpCode::LdcI48,
        OpCode::LdcI4S,
        OpCode::LdcI4S,
        OpCode::LdcI4,
        OpCode::LdcI4,
        OpCode::Ret,
      ]
    );
  }

  #[test]
  fn test_branch_to_next_block_is_elided() {
    let mut b = builder();
    let next = b.define_label();
    b.emit_branch(OpCode::Br, next);
    b.mark_label(next);
    b.emit_ret(false);
    b.realize();

    assert_eq!(b.realized().unwrap().opcodes(), vec![OpCode::Ret]);
  }

  #[test]
  fn test_dead_code_is_dropped_and_markers_report_it() {
    let mut b = builder();
    b.emit_ret(false);
    let dead = b.allocate_marker();
    b.emit_opcode(OpCode::Nop);
    b.emit_ret(false);
    b.realize();

    assert_eq!(b.realized().unwrap().opcodes(), vec![OpCode::Ret]);
    assert_eq!(b.resolve_marker(dead), MarkerOffset::Unreachable);
  }

  #[test]
  fn test_marker_resolves_to_next_instruction() {
    let mut b = builder();
    b.emit_opcode(OpCode::Nop);
    let marker = b.allocate_marker();
    b.emit_int_constant(1);
    b.emit_opcode(OpCode::Pop);
    b.emit_ret(false);
    b.realize();

    assert_eq!(b.resolve_marker(marker), MarkerOffset::Offset(1));
  }

  #[test]
  fn test_try_finally_regions_and_leave() {
    let mut b = builder();
    b.open_local_scope(ScopeKind::TryCatchFinally);
    b.open_local_scope(ScopeKind::Try);
    b.emit_opcode(OpCode::Nop);
    b.close_local_scope();
    b.open_local_scope(ScopeKind::Finally);
    b.emit_opcode(OpCode::Nop);
    b.close_local_scope();
    b.close_local_scope();
    b.emit_ret(false);
    b.realize();

    let body = b.realized().unwrap();
    assert_eq!(
      body.opcodes(),
      vec![OpCode::Nop, OpCode::Leave, OpCode::Nop, OpCode::Endfinally, OpCode::Ret]
    );
    assert_eq!(body.exception_regions.len(), 1);
    let region = &body.exception_regions[0];
    assert_eq!((region.try_start, region.try_end), (0, 6));
    assert_eq!((region.handler_start, region.handler_end), (6, 8));
  }

  #[test]
  fn test_branch_out_of_try_becomes_leave() {
    let mut b = builder();
    let exit = b.define_label();
    b.open_local_scope(ScopeKind::TryCatchFinally);
    b.open_local_scope(ScopeKind::Try);
    b.emit_branch(OpCode::Br, exit);
    b.close_local_scope();
    b.open_local_scope(ScopeKind::Catch(Token::new(Token::TYPE_TABLE, 1)));
    b.emit_opcode(OpCode::Pop);
    b.close_local_scope();
    b.close_local_scope();
    b.mark_label(exit);
    b.emit_ret(false);
    b.realize();

    let body = b.realized().unwrap();
    assert_eq!(
      body.opcodes(),
      vec![OpCode::Leave, OpCode::Pop, OpCode::Leave, OpCode::Ret]
    );
    assert_eq!(body.max_stack, 1);
  }

  #[test]
  fn test_conditional_branch_out_of_try_is_split() {
    let mut b = builder();
    let exit = b.define_label();
    b.open_local_scope(ScopeKind::TryCatchFinally);
    b.open_local_scope(ScopeKind::Try);
    b.emit_arg_load(0);
    b.emit_branch(OpCode::Brtrue, exit);
    b.emit_opcode(OpCode::Nop);
    b.close_local_scope();
    b.open_local_scope(ScopeKind::Finally);
    b.close_local_scope();
    b.close_local_scope();
    b.mark_label(exit);
    b.emit_ret(false);
    b.realize();

    let body = b.realized().unwrap();
    assert_eq!(
      body.opcodes(),
      vec![
        OpCode::Ldarg0,
        OpCode::Brfalse,
        OpCode::Leave,
        OpCode::Nop,
        OpCode::Leave,
        OpCode::Endfinally,
        OpCode::Ret
      ]
    );
    assert_eq!(body.instructions[1].operand, Operand::Target(11));
  }

  #[test]
  fn test_last_sequence_point_at_an_offset_wins() {
    let mut b = builder();
    let file = FileId::new(0);
    b.define_hidden_sequence_point();
    b.define_sequence_point(&Span::at(file, 0, 4));
    b.emit_opcode(OpCode::Nop);
    b.define_hidden_sequence_point();
    b.emit_ret(false);
    b.realize();

    let points = &b.realized().unwrap().sequence_points;
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].offset, 0);
    assert_eq!(points[0].span, Some(Span::at(file, 0, 4)));
    assert!(points[1].is_hidden());
    assert_eq!(points[1].document, file);
  }

  #[test]
  fn test_initial_hidden_point_is_kept_before_a_point_at_zero() {
    let mut b = builder();
    let file = FileId::new(0);
    b.define_initial_hidden_sequence_point();
    b.define_sequence_point(&Span::at(file, 0, 4));
    b.define_sequence_point(&Span::at(file, 5, 9));
    b.emit_ret(false);
    b.realize();

    let points = &b.realized().unwrap().sequence_points;
    assert_eq!(points.len(), 2);
    assert!(points[0].is_hidden());
    assert_eq!(points[0].offset, 0);
    assert_eq!(points[1].offset, 0);
    assert_eq!(points[1].span, Some(Span::at(file, 5, 9)));
  }

  #[test]
  #[should_panic(expected = "resolved before realization")]
  fn test_marker_before_realize_panics() {
    let mut b = builder();
    let marker = b.allocate_marker();
    b.resolve_marker(marker);
  }
}
