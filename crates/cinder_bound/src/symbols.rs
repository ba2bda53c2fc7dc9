use cinder_type::{Id, span::Span, types::TypeId};

pub type LocalId = Id<LocalSymbol>;
pub type LabelSymbolId = Id<LabelSymbol>;

/// Why a local exists.
///
/// Kinds before `UserDefined` are short-lived: they never get a debug name and their slots can
/// always be reused. Everything from `UserDefined` on is long-lived and must be mapped back to
/// the syntax that produced it when a method body is edited and recompiled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SynthesizedLocalKind {
  EmitterTemp,
  OptimizerTemp,
  LoweringTemp,
  UserDefined,
  FunctionReturnValue,
  LockTaken,
  Using,
  ForEachEnumerator,
  ForEachArray,
  ForEachArrayIndex,
  Awaiter,
  TryAwaitPendingException,
  ConditionalBranchDiscriminator,
}

impl SynthesizedLocalKind {
  pub fn is_long_lived(self) -> bool {
    self >= SynthesizedLocalKind::UserDefined
  }

  /// Long-lived locals keep their slot for the whole method in debug builds.
  pub fn is_slot_reusable(
    self,
    debug: bool,
  ) -> bool {
    !debug || !self.is_long_lived()
  }

  /// Stable number used in synthesized local names.
  pub fn code(self) -> i32 {
    match self {
      SynthesizedLocalKind::EmitterTemp => -3,
      SynthesizedLocalKind::OptimizerTemp => -2,
      SynthesizedLocalKind::LoweringTemp => -1,
      SynthesizedLocalKind::UserDefined => 0,
      SynthesizedLocalKind::FunctionReturnValue => 1,
      SynthesizedLocalKind::LockTaken => 2,
      SynthesizedLocalKind::Using => 3,
      SynthesizedLocalKind::ForEachEnumerator => 4,
      SynthesizedLocalKind::ForEachArray => 5,
      SynthesizedLocalKind::ForEachArrayIndex => 6,
      SynthesizedLocalKind::Awaiter => 7,
      SynthesizedLocalKind::TryAwaitPendingException => 8,
      SynthesizedLocalKind::ConditionalBranchDiscriminator => 9,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSymbol {
  pub id: LocalId,
  pub name: String,
  pub ty: TypeId,
  pub kind: SynthesizedLocalKind,
  /// Syntax the local was declared by; synthesized locals borrow the syntax they were lowered from.
  pub declarator: Span,
}

impl LocalSymbol {
  pub fn is_user_defined(&self) -> bool {
    self.kind == SynthesizedLocalKind::UserDefined
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelSymbol {
  pub id: LabelSymbolId,
  pub name: String,
}

/// A method referenced from a call or object creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
  pub name: String,
  pub declaring_type: TypeId,
  pub parameters: Vec<TypeId>,
  pub return_type: TypeId,
  pub returns_void: bool,
  pub is_static: bool,
  pub is_virtual: bool,
}

impl MethodRef {
  /// Net evaluation stack change of calling this method.
  pub fn call_stack_adjustment(&self) -> i32 {
    let mut adjustment = -(self.parameters.len() as i32);
    if !self.is_static {
      adjustment -= 1;
    }
    if !self.returns_void {
      adjustment += 1;
    }
    adjustment
  }

  /// `newobj` consumes the arguments and pushes the new instance.
  pub fn construct_stack_adjustment(&self) -> i32 {
    1 - self.parameters.len() as i32
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
  pub name: String,
  pub declaring_type: TypeId,
  pub ty: TypeId,
  pub is_static: bool,
}

/// Source extent of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySyntax {
  /// Whole body. Its file is the debug document.
  pub span: Span,
  /// Present when the body is a block; expression-bodied members have no closing brace.
  pub closing_brace: Option<Span>,
}

/// The method whose body is being emitted. Read-only while its body is lowered.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
  pub name: String,
  pub return_type: TypeId,
  pub returns_void: bool,
  pub parameters: Vec<TypeId>,
  pub is_static: bool,
  pub is_synthesized: bool,
  pub has_user_code: bool,
  pub is_async: bool,
  pub is_iterator: bool,
  pub generate_debug_info: bool,
  pub body_syntax: Option<BodySyntax>,
}

impl MethodDescriptor {
  pub fn new(
    name: &str,
    return_type: TypeId,
    returns_void: bool,
  ) -> Self {
    Self {
      name: name.to_string(),
      return_type,
      returns_void,
      parameters: Vec::new(),
      is_static: true,
      is_synthesized: false,
      has_user_code: true,
      is_async: false,
      is_iterator: false,
      generate_debug_info: true,
      body_syntax: None,
    }
  }

  pub fn with_parameters(
    mut self,
    parameters: Vec<TypeId>,
  ) -> Self {
    self.parameters = parameters;
    self
  }

  pub fn instance(mut self) -> Self {
    self.is_static = false;
    self
  }

  /// Marks the method as compiler-generated.
  pub fn synthesized(
    mut self,
    has_user_code: bool,
  ) -> Self {
    self.is_synthesized = true;
    self.has_user_code = has_user_code;
    self
  }

  pub fn asynchronous(mut self) -> Self {
    self.is_async = true;
    self
  }

  pub fn iterator(mut self) -> Self {
    self.is_iterator = true;
    self
  }

  pub fn with_debug_info(
    mut self,
    generate_debug_info: bool,
  ) -> Self {
    self.generate_debug_info = generate_debug_info;
    self
  }

  pub fn with_body_syntax(
    mut self,
    span: Span,
    closing_brace: Option<Span>,
  ) -> Self {
    self.body_syntax = Some(BodySyntax { span, closing_brace });
    self
  }

  /// Synthesized methods without user code are always emitted optimized.
  pub fn is_code_less_synthesized(&self) -> bool {
    self.is_synthesized && !self.has_user_code
  }

  /// Offset of `span` from the start of the body, used to identify locals across edits.
  pub fn local_syntax_offset(
    &self,
    span: &Span,
  ) -> i32 {
    match &self.body_syntax {
      Some(body) if !span.is_synthetic() => span.start.0 as i32 - body.span.start.0 as i32,
      _ => 0,
    }
  }

  /// Number of stack slots taken by the arguments, including `this`.
  pub fn argument_count(&self) -> usize {
    self.parameters.len() + usize::from(!self.is_static)
  }
}
