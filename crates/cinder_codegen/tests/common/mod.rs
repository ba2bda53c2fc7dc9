#![allow(dead_code)]

use cinder_bound::{BoundStatement, MethodDescriptor};
use cinder_codegen::{AsyncOffsets, CodeGenerator, CompilationModule, EmitStyle, IndirectReturnState, ModuleTranslator};
use cinder_config::{CinderConfig, CodegenOptions, OptimizationLevel};
use cinder_diagnostics::DiagnosticBag;
use cinder_il::{ILBuilder, OpCode, RealizedBody, print_il, verify_body};
use cinder_type::types::TypeStore;

pub struct CodegenResult {
  pub body: Option<RealizedBody>,
  pub offsets: AsyncOffsets,
  pub diagnostics: DiagnosticBag,
  pub style: EmitStyle,
  pub indirect_return_state: IndirectReturnState,
  pub has_ordinal_table: bool,
  pub stack_local_count: usize,
  pub emits_sequence_points: bool,
}

impl CodegenResult {
  pub fn body(&self) -> &RealizedBody {
    self
      .body
      .as_ref()
      .unwrap_or_else(|| panic!("body was not realized: {:?}", self.diagnostics.codes()))
  }

  pub fn opcodes(&self) -> Vec<OpCode> {
    self.body().opcodes()
  }
}

/// Quiet config so test output is not cluttered by phase logging.
pub fn config(optimization: OptimizationLevel) -> CinderConfig {
  CinderConfig::new_basic(false, vec![], true, 0).with_codegen(CodegenOptions {
    optimization,
    ..CodegenOptions::default()
  })
}

pub fn debug_config() -> CinderConfig {
  config(OptimizationLevel::Debug)
}

pub fn release_config() -> CinderConfig {
  config(OptimizationLevel::Release)
}

pub fn module() -> CompilationModule {
  CompilationModule::new(TypeStore::new())
}

/// Runs one method through the generator. Async methods also resolve their yield offsets.
pub fn generate(
  module: &mut CompilationModule,
  method: &MethodDescriptor,
  body: BoundStatement,
  config: &CinderConfig,
) -> CodegenResult {
  let mut builder = ILBuilder::new(config);
  let mut diagnostics = DiagnosticBag::new();

  let (offsets, style, indirect_return_state, has_ordinal_table, stack_local_count, emits_sequence_points) = {
    let mut generator = CodeGenerator::new(method, body, &mut builder, module, &mut diagnostics, config);
    let offsets = if method.is_async {
      generator.generate_with_offsets()
    } else {
      generator.generate();
      AsyncOffsets::default()
    };
    (
      offsets,
      generator.emit_style(),
      generator.indirect_return_state(),
      generator.has_ordinal_table(),
      generator.stack_locals().map_or(0, |locals| locals.len()),
      generator.emits_sequence_points(),
    )
  };

  CodegenResult {
    body: builder.into_realized(),
    offsets,
    diagnostics,
    style,
    indirect_return_state,
    has_ordinal_table,
    stack_local_count,
    emits_sequence_points,
  }
}

/// IL listing for snapshot comparison.
pub fn format_il(
  module: &CompilationModule,
  result: &CodegenResult,
) -> String {
  print_il(result.body(), module.types())
}

/// Assert the realized body passes the stack verifier.
pub fn assert_verifies(
  result: &CodegenResult,
  returns_value: bool,
) {
  if let Err(errors) = verify_body(result.body(), returns_value) {
    panic!("Expected no verification errors, got: {:?}", errors);
  }
}
