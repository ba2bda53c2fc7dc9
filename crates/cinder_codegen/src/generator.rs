use std::collections::HashMap;

use cinder_bound::{BoundStatement, LabelSymbolId, MethodDescriptor};
use cinder_config::{CinderConfig, DebugTrace, OptimizationLevel};
use cinder_diagnostics::{DiagnosticBag, DiagnosticMessage};
use cinder_il::{InstructionSink, LabelId, LocalSlot, MarkerId, MarkerOffset, Token};
use cinder_log::{log_dbg, trace_dbg};
use cinder_type::{span::Span, types::TypeId};

use crate::{
  error::EmitResult,
  locals::{LocalAllocator, SynthesizedLocalOrdinals},
  module::ModuleTranslator,
  optimizer::{Optimizer, StackLocals, StackScheduler},
};

/// Progress of the shared return epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectReturnState {
  /// No return has jumped to the epilogue yet.
  NotNeeded,
  /// Some return jumps to the epilogue, which is not written yet.
  Needed,
  Emitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStyle {
  Debug,
  /// Optimized, but user locals keep their slots.
  DebugFriendlyRelease,
  Release,
}

/// Offsets an async state machine needs once the body is realized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsyncOffsets {
  /// Start of the synthesized catch-all handler, if the body has one.
  pub catch_handler_offset: Option<u32>,
  pub yield_offsets: Vec<u32>,
  /// `resume_offsets[i]` is where execution continues after `yield_offsets[i]`.
  pub resume_offsets: Vec<u32>,
}

pub(crate) struct LoopLabels {
  pub continue_label: LabelId,
  pub break_label: LabelId,
}

/// Lowers one method body into an [`InstructionSink`].
///
/// One generator per method body; [`CodeGenerator::generate`] may run once.
pub struct CodeGenerator<'a> {
  pub(crate) method: &'a MethodDescriptor,
  body: Option<BoundStatement>,
  pub(crate) sink: &'a mut dyn InstructionSink,
  pub(crate) module: &'a mut dyn ModuleTranslator,
  pub(crate) diagnostics: &'a mut DiagnosticBag,
  pub(crate) config: &'a CinderConfig,

  pub(crate) style: EmitStyle,
  pub(crate) emit_sequence_points: bool,
  pub(crate) stack_locals: Option<StackLocals>,

  pub(crate) locals: LocalAllocator,
  ordinals: Option<SynthesizedLocalOrdinals>,
  pub(crate) synthesized_names: u32,

  pub(crate) indirect_return_state: IndirectReturnState,
  pub(crate) return_temp: Option<LocalSlot>,
  return_label: Option<LabelId>,
  pub(crate) try_nesting_level: u32,
  pub(crate) catch_depth: u32,
  pub(crate) finally_depth: u32,
  pub(crate) loop_stack: Vec<LoopLabels>,
  labels: HashMap<LabelSymbolId, LabelId>,

  pub(crate) yield_points: Vec<(MarkerId, Span)>,
  pub(crate) resume_points: Vec<MarkerId>,
  pub(crate) async_catch_handler: Option<MarkerId>,

  pub(crate) expression_depth: u32,
}

impl<'a> CodeGenerator<'a> {
  pub fn new(
    method: &'a MethodDescriptor,
    body: BoundStatement,
    sink: &'a mut dyn InstructionSink,
    module: &'a mut dyn ModuleTranslator,
    diagnostics: &'a mut DiagnosticBag,
    config: &'a CinderConfig,
  ) -> Self {
    let mut optimizer = StackScheduler::new(config);
    Self::with_optimizer(method, body, sink, module, diagnostics, config, &mut optimizer)
  }

  pub fn with_optimizer(
    method: &'a MethodDescriptor,
    body: BoundStatement,
    sink: &'a mut dyn InstructionSink,
    module: &'a mut dyn ModuleTranslator,
    diagnostics: &'a mut DiagnosticBag,
    config: &'a CinderConfig,
    optimizer: &mut dyn Optimizer,
  ) -> Self {
    let level = if method.is_code_less_synthesized() {
      OptimizationLevel::Release
    } else {
      config.codegen.optimization
    };

    let style = match level {
      OptimizationLevel::Debug => EmitStyle::Debug,
      OptimizationLevel::Release if config.codegen.debug_plus => EmitStyle::DebugFriendlyRelease,
      OptimizationLevel::Release => EmitStyle::Release,
    };

    let emit_sequence_points = config.codegen.emit_sequence_points && method.generate_debug_info;

    let (body, stack_locals) = if style == EmitStyle::Debug {
      (body, None)
    } else {
      let (body, stack_locals) = optimizer.optimize(body, style != EmitStyle::Release);
      (body, Some(stack_locals))
    };

    trace_dbg!(
      config,
      DebugTrace::Codegen,
      "{}: {:?}, sequence points {}",
      method.name,
      style,
      if emit_sequence_points { "on" } else { "off" }
    );

    Self {
      method,
      body: Some(body),
      sink,
      module,
      diagnostics,
      config,
      style,
      emit_sequence_points,
      stack_locals,
      locals: LocalAllocator::new(),
      ordinals: None,
      synthesized_names: 0,
      indirect_return_state: IndirectReturnState::NotNeeded,
      return_temp: None,
      return_label: None,
      try_nesting_level: 0,
      catch_depth: 0,
      finally_depth: 0,
      loop_stack: Vec::new(),
      labels: HashMap::new(),
      yield_points: Vec::new(),
      resume_points: Vec::new(),
      async_catch_handler: None,
      expression_depth: 0,
    }
  }

  pub fn emit_style(&self) -> EmitStyle {
    self.style
  }

  pub fn emits_sequence_points(&self) -> bool {
    self.emit_sequence_points
  }

  pub fn stack_locals(&self) -> Option<&StackLocals> {
    self.stack_locals.as_ref()
  }

  pub fn indirect_return_state(&self) -> IndirectReturnState {
    self.indirect_return_state
  }

  pub fn return_temp(&self) -> Option<LocalSlot> {
    self.return_temp
  }

  /// Whether the synthesized-local ordinal table is still alive.
  pub fn has_ordinal_table(&self) -> bool {
    self.ordinals.is_some()
  }

  pub fn generate(&mut self) {
    self.generate_impl();
  }

  /// Generates the body, then resolves the async markers against the realized stream.
  ///
  /// Every resume point must be reachable. A yield point in unreachable code is dropped together
  /// with its resume point. Nothing is resolved when errors kept the stream from being realized.
  pub fn generate_with_offsets(&mut self) -> AsyncOffsets {
    self.generate_impl();

    if !self.sink.is_realized() {
      return AsyncOffsets::default();
    }

    let catch_handler_offset = self
      .async_catch_handler
      .and_then(|marker| self.sink.resolve_marker(marker).offset());

    let mut offsets = AsyncOffsets {
      catch_handler_offset,
      ..AsyncOffsets::default()
    };

    assert_eq!(
      self.yield_points.len(),
      self.resume_points.len(),
      "yield point without a matching resume point in '{}'",
      self.method.name
    );

    let resume_offsets: Vec<u32> = self
      .resume_points
      .iter()
      .map(|&marker| match self.sink.resolve_marker(marker) {
        MarkerOffset::Offset(offset) => offset,
        MarkerOffset::Unreachable => panic!("resume point in '{}' is unreachable", self.method.name),
      })
      .collect();

    for ((yield_marker, span), resume_offset) in self.yield_points.iter().zip(resume_offsets) {
      match self.sink.resolve_marker(*yield_marker) {
        MarkerOffset::Offset(yield_offset) => {
          offsets.yield_offsets.push(yield_offset);
          offsets.resume_offsets.push(resume_offset);
        },
        MarkerOffset::Unreachable => {
          log_dbg!(self.config, "{}: dropping unreachable yield point", self.method.name);
          self.diagnostics.report(DiagnosticMessage::UnreachableYieldPoint {
            method: self.method.name.clone(),
            span: span.clone(),
          });
        },
      }
    }

    offsets
  }

  fn generate_impl(&mut self) {
    let body = self
      .body
      .take()
      .unwrap_or_else(|| panic!("method '{}' was already generated", self.method.name));

    let walked = self.generate_body(&body);

    if walked.is_ok() && !self.diagnostics.has_errors() {
      self.sink.realize();
      trace_dbg!(
        self.config,
        DebugTrace::Codegen,
        "{}: realized {} instructions",
        self.method.name,
        self.sink.instructions_emitted()
      );
    } else {
      log_dbg!(self.config, "{}: errors reported, stream left unrealized", self.method.name);
    }

    self.ordinals = None;
  }

  fn generate_body(
    &mut self,
    body: &BoundStatement,
  ) -> EmitResult {
    if self.emit_sequence_points
      && let Some(syntax) = &self.method.body_syntax
    {
      self.sink.set_initial_debug_document(syntax.span.file);
    }

    if self.method.is_synthesized && self.emit_sequence_points {
      self.sink.define_initial_hidden_sequence_point();
    }

    self.emit_statement(body)?;

    if self.indirect_return_state == IndirectReturnState::Needed {
      self.handle_return();
    }

    self.ensure_return();
    Ok(())
  }

  /// Writes the epilogue: marks the return label and returns the temp's value.
  pub(crate) fn handle_return(&mut self) {
    let label = self.return_label();
    self.sink.mark_label(label);

    if self.emit_sequence_points
      && !self.method.is_iterator
      && !self.method.is_async
      && let Some(closing) = self.method.body_syntax.as_ref().and_then(|b| b.closing_brace.as_ref())
    {
      self.sink.define_sequence_point(closing);
    }

    match self.return_temp {
      Some(slot) => {
        self.sink.emit_local_load(slot);
        self.sink.emit_ret(true);
      },
      None => self.sink.emit_ret(false),
    }

    self.indirect_return_state = IndirectReturnState::Emitted;
  }

  /// Void bodies may end without an explicit return.
  fn ensure_return(&mut self) {
    if self.method.returns_void && self.sink.can_fall_through() {
      self.sink.emit_ret(false);
    }
  }

  pub(crate) fn return_label(&mut self) -> LabelId {
    match self.return_label {
      Some(label) => label,
      None => {
        let label = self.sink.define_label();
        self.return_label = Some(label);
        label
      },
    }
  }

  pub(crate) fn label_for(
    &mut self,
    symbol: LabelSymbolId,
  ) -> LabelId {
    if let Some(&label) = self.labels.get(&symbol) {
      return label;
    }
    let label = self.sink.define_label();
    self.labels.insert(symbol, label);
    label
  }

  pub(crate) fn ordinals(&mut self) -> &mut SynthesizedLocalOrdinals {
    self.ordinals.get_or_insert_with(SynthesizedLocalOrdinals::new)
  }

  pub(crate) fn body_span(&self) -> Span {
    self
      .method
      .body_syntax
      .as_ref()
      .map(|b| b.span.clone())
      .unwrap_or_else(Span::synthetic)
  }

  pub(crate) fn translate_type(
    &mut self,
    ty: TypeId,
    syntax: &Span,
  ) -> Token {
    self.module.translate_type(ty, syntax, self.diagnostics)
  }
}
