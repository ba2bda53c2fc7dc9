//! Method body code generation.
//!
//! [`CodeGenerator`] walks one bound method body and emits stack-machine instructions into an
//! [`InstructionSink`](cinder_il::InstructionSink). [`generate_module`] drives it over every body
//! of a module.

pub mod error;
mod expressions;
pub mod generator;
pub mod locals;
pub mod module;
pub mod optimizer;
mod sequence_points;
mod statements;

use cinder_bound::{BoundStatement, MethodDescriptor};
use cinder_config::CinderConfig;
use cinder_diagnostics::DiagnosticBag;
use cinder_il::{ILBuilder, RealizedBody};
use cinder_log::{phase_log, phase_ok, phase_warn};

pub use error::{EmitCancelled, EmitResult};
pub use generator::{AsyncOffsets, CodeGenerator, EmitStyle, IndirectReturnState};
pub use locals::{MAX_LOCALS, SynthesizedLocalOrdinals};
pub use module::{CompilationModule, ModuleTranslator};
pub use optimizer::{Optimizer, StackLocals, StackScheduler};

/// A method and the bound body to generate for it.
#[derive(Debug, Clone)]
pub struct MethodBody {
  pub method: MethodDescriptor,
  pub body: BoundStatement,
}

#[derive(Debug, Clone)]
pub struct GeneratedMethod {
  pub name: String,
  /// `None` when errors kept the stream from being realized.
  pub body: Option<RealizedBody>,
  pub offsets: AsyncOffsets,
  pub indirect_return_state: IndirectReturnState,
}

/// Generates every body of a module, in order.
///
/// Each method gets its own builder and diagnostics, so an error in one body does not keep the
/// others from being realized. All diagnostics end up in `diagnostics`.
pub fn generate_module(
  bodies: Vec<MethodBody>,
  module: &mut dyn ModuleTranslator,
  diagnostics: &mut DiagnosticBag,
  config: &CinderConfig,
) -> Vec<GeneratedMethod> {
  phase_log!(config, "Generating {} method bodies", bodies.len());

  let mut generated = Vec::with_capacity(bodies.len());

  for MethodBody { method, body } in bodies {
    phase_log!(config, indent = 8, "{}", method.name);

    let mut builder = ILBuilder::new(config);
    let mut method_diagnostics = DiagnosticBag::new();

    let (offsets, indirect_return_state) = {
      let mut generator = CodeGenerator::new(
        &method,
        body,
        &mut builder,
        &mut *module,
        &mut method_diagnostics,
        config,
      );

      let offsets = if method.is_async {
        generator.generate_with_offsets()
      } else {
        generator.generate();
        AsyncOffsets::default()
      };

      (offsets, generator.indirect_return_state())
    };

    if method_diagnostics.has_errors() {
      phase_warn!(config, "{}: {} error(s), body not emitted", method.name, method_diagnostics.error_count());
    }
    for diagnostic in method_diagnostics.into_vec() {
      diagnostics.push(diagnostic);
    }

    generated.push(GeneratedMethod {
      name: method.name.clone(),
      body: builder.into_realized(),
      offsets,
      indirect_return_state,
    });
  }

  let realized = generated.iter().filter(|m| m.body.is_some()).count();
  phase_ok!(config, "Generated {} of {} method bodies", realized, generated.len());

  generated
}
