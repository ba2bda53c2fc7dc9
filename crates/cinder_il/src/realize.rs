use std::cmp::Reverse;

use cinder_config::{CinderConfig, DebugTrace};
use cinder_log::trace_dbg;
use cinder_type::file::FileId;

use crate::{
  BlockId, DebugPoint, ExceptionRegion, HandlerKind, ILBuilder, Instruction, LabelId, LocalInfo, LocalScope,
  LocalSlot, MarkerOffset, OpCode, Operand, Position, RealizedBody, RealizedInstruction, RegionId, RegionKind,
  SequencePoint, Terminator,
};

/// Offsets assigned to the builder's blocks, kept around to resolve markers.
pub(crate) struct Layout {
  /// Per block: offset of each instruction, plus the terminator's offset at the end.
  offsets: Vec<Option<Vec<u32>>>,
}

impl Layout {
  pub(crate) fn resolve(
    &self,
    at: Position,
  ) -> MarkerOffset {
    match &self.offsets[at.block.index() as usize] {
      Some(offsets) => MarkerOffset::Offset(offsets[at.index]),
      None => MarkerOffset::Unreachable,
    }
  }

  /// Offset of `at`, or of the first reachable code after it.
  fn offset_at_or_after(
    &self,
    at: Position,
    code_size: u32,
  ) -> u32 {
    let start = at.block.index() as usize;
    if let Some(offsets) = &self.offsets[start] {
      return offsets[at.index];
    }
    self.offsets[start + 1..]
      .iter()
      .flatten()
      .map(|offsets| offsets[0])
      .next()
      .unwrap_or(code_size)
  }
}

/// Control flow of a laid-out block, with labels resolved to blocks.
#[derive(Debug, Clone)]
enum Flow {
  FallThrough,
  Jump { opcode: OpCode, target: BlockId },
  Switch(Vec<BlockId>),
  Return { has_value: bool },
  Throw,
  Rethrow,
  EndFinally,
}

impl Flow {
  fn size(&self) -> u32 {
    match self {
      Flow::FallThrough => 0,
      Flow::Jump { .. } => 5,
      Flow::Switch(targets) => 5 + 4 * targets.len() as u32,
      Flow::Return { .. } | Flow::Throw | Flow::EndFinally => 1,
      Flow::Rethrow => 2,
    }
  }
}

struct LaidOutBlock<'a> {
  source: BlockId,
  /// Inserted to split a conditional branch that leaves a protected region.
  synthetic: bool,
  instructions: &'a [Instruction],
  flow: Flow,
  region: Option<RegionId>,
  start: u32,
}

impl LaidOutBlock<'_> {
  fn size(&self) -> u32 {
    self.instructions.iter().map(Instruction::size).sum::<u32>() + self.flow.size()
  }
}

pub(crate) fn realize(
  builder: &ILBuilder,
  config: &CinderConfig,
) -> (Layout, RealizedBody) {
  Realizer::new(builder, config).run()
}

struct Realizer<'a> {
  builder: &'a ILBuilder,
  config: &'a CinderConfig,
  reachable: Vec<bool>,
}

impl<'a> Realizer<'a> {
  fn new(
    builder: &'a ILBuilder,
    config: &'a CinderConfig,
  ) -> Self {
    Self {
      builder,
      config,
      reachable: vec![false; builder.blocks.len()],
    }
  }

  fn run(mut self) -> (Layout, RealizedBody) {
    self.compute_reachability();

    let dropped = self.reachable.iter().filter(|r| !**r).count();
    trace_dbg!(
      self.config,
      DebugTrace::Realize,
      "{} of {} blocks unreachable",
      dropped,
      self.reachable.len()
    );

    let mut blocks = self.lay_out();
    let code_size = assign_offsets(&mut blocks);
    let layout = self.layout(&blocks);

    let body = RealizedBody {
      code_size,
      max_stack: self.builder.max_stack,
      instructions: self.instructions(&blocks),
      locals: self.locals(),
      exception_regions: self.exception_regions(&blocks),
      sequence_points: self.sequence_points(&layout),
      scopes: self.scopes(&layout, code_size),
    };

    (layout, body)
  }

  fn label_block(
    &self,
    label: LabelId,
  ) -> BlockId {
    self
      .builder
      .labels
      .get(&label)
      .block
      .unwrap_or_else(|| panic!("label {:?} is branched to but never marked", label))
  }

  fn next_block(
    &self,
    id: BlockId,
  ) -> Option<BlockId> {
    let next = id.index() + 1;
    ((next as usize) < self.builder.blocks.len()).then(|| BlockId::new(next))
  }

  fn successors(
    &self,
    id: BlockId,
  ) -> Vec<BlockId> {
    let block = self.builder.blocks.get(&id);
    let mut out = Vec::new();

    match &block.terminator {
      Terminator::FallThrough => out.extend(self.next_block(id)),
      Terminator::Goto(label) | Terminator::Leave(label) => out.push(self.label_block(*label)),
      Terminator::Branch { target, .. } => {
        out.push(self.label_block(*target));
        out.extend(self.next_block(id));
      },
      Terminator::Switch(labels) => {
        out.extend(labels.iter().map(|label| self.label_block(*label)));
        out.extend(self.next_block(id));
      },
      Terminator::Return { .. } | Terminator::Throw | Terminator::Rethrow | Terminator::EndFinally => {},
    }

    out
  }

  fn compute_reachability(&mut self) {
    let mut work = vec![BlockId::new(0)];

    while let Some(id) = work.pop() {
      let index = id.index() as usize;
      if self.reachable[index] {
        continue;
      }
      self.reachable[index] = true;
      work.extend(self.successors(id));

      // Handlers of every try block enclosing reachable code are reachable too.
      let mut region = self.builder.blocks.get(&id).region;
      while let Some(r) = region {
        let data = self.builder.regions.get(&r);
        if data.kind == RegionKind::Try {
          let group = self.builder.groups.get(&data.group);
          work.extend(group.handlers.iter().map(|h| self.builder.regions.get(h).entry));
        }
        region = data.parent;
      }
    }
  }

  fn is_within(
    &self,
    ancestor: RegionId,
    mut region: Option<RegionId>,
  ) -> bool {
    while let Some(r) = region {
      if r == ancestor {
        return true;
      }
      region = self.builder.regions.get(&r).parent;
    }
    false
  }

  fn leaves_region(
    &self,
    from: Option<RegionId>,
    to: BlockId,
  ) -> bool {
    match from {
      Some(region) => !self.is_within(region, self.builder.blocks.get(&to).region),
      None => false,
    }
  }

  fn region_depth(
    &self,
    region: RegionId,
  ) -> usize {
    let mut depth = 0;
    let mut current = self.builder.regions.get(&region).parent;
    while let Some(r) = current {
      depth += 1;
      current = self.builder.regions.get(&r).parent;
    }
    depth
  }

  /// Drops unreachable blocks and rewrites branches that exit protected regions into `leave`.
  fn lay_out(&self) -> Vec<LaidOutBlock<'a>> {
    let builder = self.builder;
    let mut out: Vec<LaidOutBlock<'a>> = Vec::new();

    for (id, block) in builder.blocks.iter() {
      if !self.reachable[id.index() as usize] {
        continue;
      }

      let laid_out = |flow: Flow, synthetic: bool, instructions: &'a [Instruction]| LaidOutBlock {
        source: id,
        synthetic,
        instructions,
        flow,
        region: block.region,
        start: 0,
      };

      match &block.terminator {
        Terminator::FallThrough => out.push(laid_out(Flow::FallThrough, false, &block.instructions)),
        Terminator::Goto(label) => {
          let target = self.label_block(*label);
          let opcode = if self.leaves_region(block.region, target) {
            OpCode::Leave
          } else {
            OpCode::Br
          };
          out.push(laid_out(Flow::Jump { opcode, target }, false, &block.instructions));
        },
        Terminator::Leave(label) => {
          let target = self.label_block(*label);
          out.push(laid_out(
            Flow::Jump {
              opcode: OpCode::Leave,
              target,
            },
            false,
            &block.instructions,
          ));
        },
        Terminator::Branch { opcode, target } => {
          let target = self.label_block(*target);
          if self.leaves_region(block.region, target) {
            let next = self
              .next_block(id)
              .unwrap_or_else(|| panic!("conditional branch at the end of the method"));
            out.push(laid_out(
              Flow::Jump {
                opcode: opcode.inverted(),
                target: next,
              },
              false,
              &block.instructions,
            ));
            out.push(laid_out(
              Flow::Jump {
                opcode: OpCode::Leave,
                target,
              },
              true,
              &[],
            ));
          } else {
            out.push(laid_out(
              Flow::Jump {
                opcode: *opcode,
                target,
              },
              false,
              &block.instructions,
            ));
          }
        },
        Terminator::Switch(labels) => {
          let targets: Vec<_> = labels.iter().map(|l| self.label_block(*l)).collect();
          assert!(
            targets.iter().all(|t| !self.leaves_region(block.region, *t)),
            "switch cannot jump out of a protected region"
          );
          out.push(laid_out(Flow::Switch(targets), false, &block.instructions));
        },
        Terminator::Return { has_value } => out.push(laid_out(
          Flow::Return { has_value: *has_value },
          false,
          &block.instructions,
        )),
        Terminator::Throw => out.push(laid_out(Flow::Throw, false, &block.instructions)),
        Terminator::Rethrow => out.push(laid_out(Flow::Rethrow, false, &block.instructions)),
        Terminator::EndFinally => out.push(laid_out(Flow::EndFinally, false, &block.instructions)),
      }
    }

    // A plain branch to the block laid out right after it is redundant.
    for i in 0..out.len().saturating_sub(1) {
      if let Flow::Jump {
        opcode: OpCode::Br,
        target,
      } = out[i].flow
        && !out[i + 1].synthetic
        && out[i + 1].source == target
      {
        out[i].flow = Flow::FallThrough;
      }
    }

    out
  }

  fn layout(
    &self,
    blocks: &[LaidOutBlock<'_>],
  ) -> Layout {
    let mut offsets: Vec<Option<Vec<u32>>> = vec![None; self.builder.blocks.len()];

    for block in blocks.iter().filter(|b| !b.synthetic) {
      let mut at = block.start;
      let mut block_offsets = Vec::with_capacity(block.instructions.len() + 1);
      for instruction in block.instructions {
        block_offsets.push(at);
        at += instruction.size();
      }
      block_offsets.push(at);
      offsets[block.source.index() as usize] = Some(block_offsets);
    }

    Layout { offsets }
  }

  fn block_start(
    blocks: &[LaidOutBlock<'_>],
    id: BlockId,
  ) -> u32 {
    blocks
      .iter()
      .find(|b| b.source == id && !b.synthetic)
      .map(|b| b.start)
      .unwrap_or_else(|| panic!("branch target {:?} was not laid out", id))
  }

  fn instructions(
    &self,
    blocks: &[LaidOutBlock<'_>],
  ) -> Vec<RealizedInstruction> {
    let mut out = Vec::new();

    for block in blocks {
      let mut at = block.start;
      for instruction in block.instructions {
        out.push(RealizedInstruction {
          offset: at,
          opcode: instruction.opcode,
          operand: instruction.operand.clone(),
          stack_delta: instruction.stack_delta,
        });
        at += instruction.size();
      }

      let (opcode, operand, stack_delta) = match &block.flow {
        Flow::FallThrough => continue,
        Flow::Jump { opcode, target } => (
          *opcode,
          Operand::Target(Self::block_start(blocks, *target)),
          opcode.stack_delta().unwrap_or(0),
        ),
        Flow::Switch(targets) => (
          OpCode::Switch,
          Operand::Targets(targets.iter().map(|t| Self::block_start(blocks, *t)).collect()),
          -1,
        ),
        Flow::Return { has_value } => (OpCode::Ret, Operand::None, -i32::from(*has_value)),
        Flow::Throw => (OpCode::Throw, Operand::None, -1),
        Flow::Rethrow => (OpCode::Rethrow, Operand::None, 0),
        Flow::EndFinally => (OpCode::Endfinally, Operand::None, 0),
      };

      out.push(RealizedInstruction {
        offset: at,
        opcode,
        operand,
        stack_delta,
      });
    }

    out
  }

  fn locals(&self) -> Vec<LocalInfo> {
    self
      .builder
      .locals
      .iter()
      .enumerate()
      .map(|(slot, local)| LocalInfo {
        slot: LocalSlot(slot as u16),
        ty: local.ty,
        token: local.token,
        name: local.name.clone(),
        debug_id: local.debug_id,
      })
      .collect()
  }

  fn range_of(
    &self,
    region: RegionId,
    blocks: &[LaidOutBlock<'_>],
  ) -> Option<(u32, u32)> {
    blocks
      .iter()
      .filter(|b| b.size() > 0 && self.is_within(region, b.region))
      .fold(None, |range, b| {
        let end = b.start + b.size();
        Some(match range {
          None => (b.start, end),
          Some((start, stop)) => (start.min(b.start), stop.max(end)),
        })
      })
  }

  /// Inner regions come before the regions enclosing them.
  fn exception_regions(
    &self,
    blocks: &[LaidOutBlock<'_>],
  ) -> Vec<ExceptionRegion> {
    let mut out: Vec<(usize, ExceptionRegion)> = Vec::new();

    for (_, group) in self.builder.groups.iter() {
      let Some(try_region) = group.try_region else {
        continue;
      };
      let Some((try_start, try_end)) = self.range_of(try_region, blocks) else {
        continue;
      };

      for handler in &group.handlers {
        let Some((handler_start, handler_end)) = self.range_of(*handler, blocks) else {
          continue;
        };
        let kind = match self.builder.regions.get(handler).kind {
          RegionKind::Catch(token) => HandlerKind::Catch(token),
          RegionKind::Finally => HandlerKind::Finally,
          RegionKind::Try => unreachable!("try region registered as a handler"),
        };

        out.push((
          self.region_depth(try_region),
          ExceptionRegion {
            kind,
            try_start,
            try_end,
            handler_start,
            handler_end,
          },
        ));
      }
    }

    out.sort_by_key(|(depth, _)| Reverse(*depth));
    out.into_iter().map(|(_, region)| region).collect()
  }

  fn sequence_points(
    &self,
    layout: &Layout,
  ) -> Vec<SequencePoint> {
    let mut document = self.builder.initial_document.unwrap_or(FileId::SYNTHETIC);
    let mut points = Vec::new();

    if self.builder.initial_hidden {
      points.push(SequencePoint {
        offset: 0,
        document,
        span: None,
      });
    }
    // The initial hidden point is never replaced by a later point at offset 0.
    let pinned = points.len();

    for (id, block) in self.builder.blocks.iter() {
      for (index, point) in &block.debug_points {
        let MarkerOffset::Offset(offset) = layout.resolve(Position { block: id, index: *index }) else {
          continue;
        };
        let point = match point {
          DebugPoint::Span(span) => {
            document = span.file;
            SequencePoint {
              offset,
              document,
              span: Some(span.clone()),
            }
          },
          DebugPoint::Hidden => SequencePoint {
            offset,
            document,
            span: None,
          },
        };

        let len = points.len();
        match points.last_mut() {
          Some(last) if last.offset == point.offset && len > pinned => *last = point,
          _ => points.push(point),
        }
      }
    }

    points
  }

  fn scopes(
    &self,
    layout: &Layout,
    code_size: u32,
  ) -> Vec<LocalScope> {
    self
      .builder
      .scopes
      .iter()
      .filter(|scope| !scope.locals.is_empty())
      .filter_map(|scope| {
        let start = layout.offset_at_or_after(scope.start, code_size);
        let end = scope
          .end
          .map(|end| layout.offset_at_or_after(end, code_size))
          .unwrap_or(code_size);
        (start < end).then(|| LocalScope {
          start,
          end,
          locals: scope.locals.clone(),
        })
      })
      .collect()
  }
}

fn assign_offsets(blocks: &mut [LaidOutBlock<'_>]) -> u32 {
  let mut offset = 0;
  for block in blocks.iter_mut() {
    block.start = offset;
    offset += block.size();
  }
  offset
}
