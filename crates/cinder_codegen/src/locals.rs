use std::collections::HashMap;

use cinder_bound::{LocalId, LocalSymbol, SynthesizedLocalKind};
use cinder_diagnostics::DiagnosticMessage;
use cinder_il::{InstructionSink, LocalDebugId, LocalDeclaration, LocalSlot};
use cinder_type::{span::Span, types::TypeId};

use crate::generator::{CodeGenerator, EmitStyle};

/// Slots a local signature can hold.
pub const MAX_LOCALS: usize = 0xFFFF;

/// Ordinals that tell apart synthesized locals declared at the same syntax offset.
///
/// Keyed by `(syntax offset, kind)`. Asking again for a local that already has an ordinal
/// returns the same one.
#[derive(Debug, Default)]
pub struct SynthesizedLocalOrdinals {
  next: HashMap<(i32, SynthesizedLocalKind), i32>,
  assigned: HashMap<LocalId, i32>,
}

impl SynthesizedLocalOrdinals {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn assign(
    &mut self,
    local: &LocalSymbol,
    syntax_offset: i32,
  ) -> i32 {
    if local.is_user_defined() {
      return 0;
    }

    if let Some(&ordinal) = self.assigned.get(&local.id) {
      return ordinal;
    }

    let ordinal = self.next_ordinal(local.kind, syntax_offset);
    self.assigned.insert(local.id, ordinal);
    ordinal
  }

  /// Hands out an ordinal for a local the emitter creates itself, which has no bound symbol.
  pub fn next_ordinal(
    &mut self,
    kind: SynthesizedLocalKind,
    syntax_offset: i32,
  ) -> i32 {
    let counter = self.next.entry((syntax_offset, kind)).or_insert(0);
    let ordinal = *counter;
    *counter += 1;
    ordinal
  }

  pub fn len(&self) -> usize {
    self.assigned.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assigned.is_empty()
  }
}

/// Slot bookkeeping for one method body.
#[derive(Debug, Default)]
pub struct LocalAllocator {
  slots: HashMap<LocalId, LocalSlot>,
  /// Released slots, reusable by a later local of the same type.
  free: Vec<(TypeId, LocalSlot)>,
  declared: usize,
  overflow_reported: bool,
}

impl LocalAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declares a fresh slot, or `None` once the signature is full.
  pub fn declare(
    &mut self,
    sink: &mut dyn InstructionSink,
    declaration: LocalDeclaration,
  ) -> Option<LocalSlot> {
    if self.declared >= MAX_LOCALS {
      return None;
    }
    self.declared += 1;
    Some(sink.declare_local(declaration))
  }

  pub fn bind(
    &mut self,
    local: LocalId,
    slot: LocalSlot,
  ) {
    let previous = self.slots.insert(local, slot);
    assert!(previous.is_none(), "local {:?} declared twice", local);
  }

  pub fn slot(
    &self,
    local: LocalId,
  ) -> Option<LocalSlot> {
    self.slots.get(&local).copied()
  }

  pub fn unbind(
    &mut self,
    local: LocalId,
  ) -> Option<LocalSlot> {
    self.slots.remove(&local)
  }

  pub fn take_free(
    &mut self,
    ty: TypeId,
  ) -> Option<LocalSlot> {
    let index = self.free.iter().position(|(free_ty, _)| *free_ty == ty)?;
    Some(self.free.remove(index).1)
  }

  pub fn release(
    &mut self,
    ty: TypeId,
    slot: LocalSlot,
  ) {
    self.free.push((ty, slot));
  }

  pub fn declared(&self) -> usize {
    self.declared
  }
}

/// Long-lived synthesized locals get `$S<kind>$<nnnn>` names so debuggers can show them.
pub fn synthesized_local_name(
  kind: SynthesizedLocalKind,
  unique: u32,
) -> String {
  format!("$S{}${:04}", kind.code(), unique)
}

impl CodeGenerator<'_> {
  pub(crate) fn is_stack_local(
    &self,
    local: LocalId,
  ) -> bool {
    self.stack_locals.as_ref().is_some_and(|set| set.contains(&local))
  }

  pub(crate) fn local_slot(
    &self,
    local: LocalId,
  ) -> LocalSlot {
    self
      .locals
      .slot(local)
      .unwrap_or_else(|| panic!("local {:?} used outside its declaring scope", local))
  }

  /// Gives a bound local its slot. Stack locals get none.
  pub(crate) fn define_local(
    &mut self,
    local: &LocalSymbol,
  ) {
    if self.is_stack_local(local.id) {
      return;
    }

    let debug = self.style == EmitStyle::Debug;
    if local.kind.is_slot_reusable(debug)
      && let Some(slot) = self.locals.take_free(local.ty)
    {
      self.locals.bind(local.id, slot);
      return;
    }

    let token = self.translate_type(local.ty, &local.declarator);
    let name = self.local_debug_name(local);
    let debug_id = if debug && local.kind.is_long_lived() {
      let syntax_offset = self.method.local_syntax_offset(&local.declarator);
      let ordinal = self.ordinals().assign(local, syntax_offset);
      Some(LocalDebugId { syntax_offset, ordinal })
    } else {
      None
    };

    let slot = self.declare_slot(
      LocalDeclaration {
        ty: local.ty,
        token,
        name,
        debug_id,
      },
      &local.declarator,
    );
    self.locals.bind(local.id, slot);
  }

  pub(crate) fn free_local(
    &mut self,
    local: &LocalSymbol,
  ) {
    let Some(slot) = self.locals.unbind(local.id) else {
      return;
    };

    if local.kind.is_slot_reusable(self.style == EmitStyle::Debug) {
      self.locals.release(local.ty, slot);
    }
  }

  /// Short-lived unnamed slot for the emitter's own use. Give it back with [`Self::free_temp`].
  pub(crate) fn allocate_temp(
    &mut self,
    ty: TypeId,
    syntax: &Span,
  ) -> LocalSlot {
    if let Some(slot) = self.locals.take_free(ty) {
      return slot;
    }

    let token = self.translate_type(ty, syntax);
    self.declare_slot(
      LocalDeclaration {
        ty,
        token,
        name: None,
        debug_id: None,
      },
      syntax,
    )
  }

  pub(crate) fn free_temp(
    &mut self,
    ty: TypeId,
    slot: LocalSlot,
  ) {
    self.locals.release(ty, slot);
  }

  /// The single slot every indirect return stores into.
  pub(crate) fn lazy_return_temp(&mut self) -> LocalSlot {
    if let Some(slot) = self.return_temp {
      return slot;
    }

    assert!(
      !self.method.returns_void,
      "void method '{}' cannot return a value",
      self.method.name
    );

    let ty = self.method.return_type;
    let syntax = self.body_span();
    let slot = if self.style == EmitStyle::Debug {
      let kind = SynthesizedLocalKind::FunctionReturnValue;
      let token = self.translate_type(ty, &syntax);
      let name = Some(self.next_synthesized_name(kind));
      let syntax_offset = self.method.local_syntax_offset(&syntax);
      let ordinal = self.ordinals().next_ordinal(kind, syntax_offset);
      self.declare_slot(
        LocalDeclaration {
          ty,
          token,
          name,
          debug_id: Some(LocalDebugId { syntax_offset, ordinal }),
        },
        &syntax,
      )
    } else {
      self.allocate_temp(ty, &syntax)
    };

    self.return_temp = Some(slot);
    slot
  }

  fn local_debug_name(
    &mut self,
    local: &LocalSymbol,
  ) -> Option<String> {
    if local.is_user_defined() {
      Some(local.name.clone())
    } else if local.kind.is_long_lived() {
      Some(self.next_synthesized_name(local.kind))
    } else {
      None
    }
  }

  fn next_synthesized_name(
    &mut self,
    kind: SynthesizedLocalKind,
  ) -> String {
    let name = synthesized_local_name(kind, self.synthesized_names);
    self.synthesized_names += 1;
    name
  }

  fn declare_slot(
    &mut self,
    declaration: LocalDeclaration,
    syntax: &Span,
  ) -> LocalSlot {
    match self.locals.declare(&mut *self.sink, declaration) {
      Some(slot) => slot,
      None => {
        if !self.locals.overflow_reported {
          self.locals.overflow_reported = true;
          self.diagnostics.report(DiagnosticMessage::TooManyLocals {
            method: self.method.name.clone(),
            span: syntax.clone(),
          });
        }
        LocalSlot(u16::MAX)
      },
    }
  }
}
