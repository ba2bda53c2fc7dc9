use cinder_bound::{
  BoundExpression, BoundStatement, CatchBlock, LabelSymbolId, LocalSymbol, NoOpFlavor, StatementKind, SwitchCase,
};
use cinder_il::{LabelId, OpCode, ScopeKind};
use cinder_log::log_trc;
use cinder_type::span::Span;

use crate::{
  error::EmitResult,
  generator::{CodeGenerator, EmitStyle, IndirectReturnState, LoopLabels},
};

impl CodeGenerator<'_> {
  pub(crate) fn emit_statement(
    &mut self,
    statement: &BoundStatement,
  ) -> EmitResult {
    match &statement.kind {
      StatementKind::Block { locals, statements } => self.emit_block(locals, statements),
      StatementKind::StatementList(statements) => {
        for statement in statements {
          self.emit_statement(statement)?;
        }
        Ok(())
      },
      StatementKind::Expression(expression) => self.emit_expression(expression, false),
      StatementKind::Return(value) => self.emit_return(statement, value.as_ref()),
      StatementKind::If {
        condition,
        then_branch,
        else_branch,
      } => self.emit_if(condition, then_branch, else_branch.as_deref()),
      StatementKind::Loop { condition, body } => self.emit_loop(condition.as_ref(), body),
      StatementKind::Break => {
        let target = self.innermost_loop().break_label;
        self.sink.emit_branch(OpCode::Br, target);
        Ok(())
      },
      StatementKind::Continue => {
        let target = self.innermost_loop().continue_label;
        self.sink.emit_branch(OpCode::Br, target);
        Ok(())
      },
      StatementKind::Goto(symbol) => {
        let label = self.label_for(*symbol);
        self.sink.emit_branch(OpCode::Br, label);
        Ok(())
      },
      StatementKind::Label(symbol) => {
        let label = self.label_for(*symbol);
        self.sink.mark_label(label);
        Ok(())
      },
      StatementKind::ConditionalGoto {
        condition,
        jump_if_true,
        label,
      } => {
        let label = self.label_for(*label);
        self.emit_cond_branch(condition, label, *jump_if_true)
      },
      StatementKind::SwitchDispatch {
        expression,
        cases,
        default_label,
      } => self.emit_switch_dispatch(expression, cases, *default_label),
      StatementKind::Try {
        try_block,
        catch_blocks,
        finally_block,
      } => self.emit_try(try_block, catch_blocks, finally_block.as_deref()),
      StatementKind::Throw(Some(value)) => {
        self.emit_expression(value, true)?;
        self.sink.emit_throw();
        Ok(())
      },
      StatementKind::Throw(None) => {
        assert!(self.catch_depth > 0, "rethrow outside of a catch block");
        self.sink.emit_rethrow();
        Ok(())
      },
      StatementKind::SequencePoint { point, statement } => {
        self.emit_sequence_point_statement(point, statement.as_deref())
      },
      StatementKind::NoOp(flavor) => {
        self.emit_no_op(*flavor, &statement.span);
        Ok(())
      },
    }
  }

  fn emit_block(
    &mut self,
    locals: &[LocalSymbol],
    statements: &[BoundStatement],
  ) -> EmitResult {
    let scoped = !locals.is_empty();
    if scoped {
      self.sink.open_local_scope(ScopeKind::Variable);
      for local in locals {
        self.define_local(local);
      }
    }

    for statement in statements {
      self.emit_statement(statement)?;
    }

    if scoped {
      self.sink.close_local_scope();
      for local in locals {
        self.free_local(local);
      }
    }

    Ok(())
  }

  /// Direct `ret` outside protected regions; inside one, store into the return temp and jump to
  /// the shared epilogue.
  fn emit_return(
    &mut self,
    statement: &BoundStatement,
    value: Option<&BoundExpression>,
  ) -> EmitResult {
    assert!(self.finally_depth == 0, "return inside a finally block of '{}'", self.method.name);

    if self.try_nesting_level > 0 {
      if let Some(value) = value {
        self.emit_expression(value, true)?;
        let temp = self.lazy_return_temp();
        self.sink.emit_local_store(temp);
      }

      if self.indirect_return_state == IndirectReturnState::NotNeeded {
        log_trc!(self.config, "{}: indirect return needed", self.method.name);
        self.indirect_return_state = IndirectReturnState::Needed;
      }

      let label = self.return_label();
      self.sink.emit_branch(OpCode::Br, label);
      return Ok(());
    }

    // The closing return of a body whose other returns already jump to the epilogue.
    if self.indirect_return_state == IndirectReturnState::Needed && statement.compiler_generated {
      if let Some(value) = value {
        self.emit_expression(value, true)?;
        let temp = self.lazy_return_temp();
        self.sink.emit_local_store(temp);
      }
      self.handle_return();
      return Ok(());
    }

    if let Some(value) = value {
      self.emit_expression(value, true)?;
    }
    self.sink.emit_ret(value.is_some());
    Ok(())
  }

  fn emit_if(
    &mut self,
    condition: &BoundExpression,
    then_branch: &BoundStatement,
    else_branch: Option<&BoundStatement>,
  ) -> EmitResult {
    let else_label = self.sink.define_label();
    self.emit_cond_branch(condition, else_label, false)?;
    self.emit_statement(then_branch)?;

    match else_branch {
      Some(else_branch) => {
        let end_label = self.sink.define_label();
        if self.sink.can_fall_through() {
          self.sink.emit_branch(OpCode::Br, end_label);
        }
        self.sink.mark_label(else_label);
        self.emit_statement(else_branch)?;
        self.sink.mark_label(end_label);
      },
      None => self.sink.mark_label(else_label),
    }

    Ok(())
  }

  /// `while` loops test their condition at the bottom.
  fn emit_loop(
    &mut self,
    condition: Option<&BoundExpression>,
    body: &BoundStatement,
  ) -> EmitResult {
    let continue_label = self.sink.define_label();
    let break_label = self.sink.define_label();

    self.loop_stack.push(LoopLabels {
      continue_label,
      break_label,
    });

    match condition {
      Some(condition) => {
        let body_label = self.sink.define_label();
        self.sink.emit_branch(OpCode::Br, continue_label);
        self.sink.mark_label(body_label);
        self.emit_statement(body)?;
        self.sink.mark_label(continue_label);
        self.emit_cond_branch(condition, body_label, true)?;
      },
      None => {
        self.sink.mark_label(continue_label);
        self.emit_statement(body)?;
        self.sink.emit_branch(OpCode::Br, continue_label);
      },
    }

    self.loop_stack.pop();
    self.sink.mark_label(break_label);
    Ok(())
  }

  fn innermost_loop(&self) -> &LoopLabels {
    self
      .loop_stack
      .last()
      .unwrap_or_else(|| panic!("break or continue outside of a loop in '{}'", self.method.name))
  }

  /// Dense case sets use a jump table; sparse ones a compare chain.
  fn emit_switch_dispatch(
    &mut self,
    expression: &BoundExpression,
    cases: &[SwitchCase],
    default_label: LabelSymbolId,
  ) -> EmitResult {
    let default = self.label_for(default_label);

    let mut sorted: Vec<(i32, LabelId)> = cases
      .iter()
      .map(|case| (case.value, self.label_for(case.label)))
      .collect();
    sorted.sort_by_key(|(value, _)| *value);
    sorted.dedup_by_key(|(value, _)| *value);

    if sorted.is_empty() {
      self.emit_expression(expression, false)?;
      self.sink.emit_branch(OpCode::Br, default);
      return Ok(());
    }

    let low = sorted[0].0 as i64;
    let high = sorted[sorted.len() - 1].0 as i64;
    let range = high - low + 1;

    if sorted.len() >= 3 && range <= 2 * sorted.len() as i64 {
      self.emit_expression(expression, true)?;
      if low != 0 {
        self.sink.emit_int_constant(low as i32);
        self.sink.emit_opcode(OpCode::Sub);
      }

      let mut targets = vec![default; range as usize];
      for (value, label) in &sorted {
        targets[(*value as i64 - low) as usize] = *label;
      }
      self.sink.emit_switch(&targets);
    } else {
      self.emit_expression(expression, true)?;
      let temp = self.allocate_temp(expression.ty, &expression.span);
      self.sink.emit_local_store(temp);
      for (value, label) in &sorted {
        self.sink.emit_local_load(temp);
        self.sink.emit_int_constant(*value);
        self.sink.emit_branch(OpCode::Beq, *label);
      }
      self.free_temp(expression.ty, temp);
    }

    self.sink.emit_branch(OpCode::Br, default);
    Ok(())
  }

  /// The whole try statement, handlers included, counts as one nesting level.
  fn emit_try(
    &mut self,
    try_block: &BoundStatement,
    catch_blocks: &[CatchBlock],
    finally_block: Option<&BoundStatement>,
  ) -> EmitResult {
    self.try_nesting_level += 1;
    let result = self.emit_try_regions(try_block, catch_blocks, finally_block);
    self.try_nesting_level -= 1;
    result
  }

  /// `try {} catch {} finally {}` becomes a try-catch nested in the try of a try-finally.
  fn emit_try_regions(
    &mut self,
    try_block: &BoundStatement,
    catch_blocks: &[CatchBlock],
    finally_block: Option<&BoundStatement>,
  ) -> EmitResult {
    let nested = !catch_blocks.is_empty() && finally_block.is_some();

    self.sink.open_local_scope(ScopeKind::TryCatchFinally);
    self.sink.open_local_scope(ScopeKind::Try);
    if nested {
      self.emit_try_regions(try_block, catch_blocks, None)?;
    } else {
      self.emit_statement(try_block)?;
    }
    self.sink.close_local_scope();

    if !nested {
      for catch in catch_blocks {
        self.emit_catch(catch)?;
      }
    }

    if let Some(finally_block) = finally_block {
      self.sink.open_local_scope(ScopeKind::Finally);
      self.finally_depth += 1;
      let result = self.emit_statement(finally_block);
      self.finally_depth -= 1;
      result?;
      self.sink.close_local_scope();
    }

    self.sink.close_local_scope();
    Ok(())
  }

  fn emit_catch(
    &mut self,
    catch: &CatchBlock,
  ) -> EmitResult {
    let exception_type = catch
      .exception_type
      .unwrap_or_else(|| self.module.types().object());
    let syntax = catch.body.span.clone();
    let token = self.translate_type(exception_type, &syntax);

    self.sink.open_local_scope(ScopeKind::Catch(token));

    if catch.is_synthesized_async_catch_all {
      assert!(
        self.async_catch_handler.is_none(),
        "'{}' has more than one synthesized catch-all handler",
        self.method.name
      );
      self.async_catch_handler = Some(self.sink.allocate_marker());
    }

    self.catch_depth += 1;
    let result = match &catch.local {
      Some(local) => {
        self.sink.open_local_scope(ScopeKind::Variable);
        self.define_local(local);
        let slot = self.local_slot(local.id);
        self.sink.emit_local_store(slot);
        let result = self.emit_statement(&catch.body);
        self.sink.close_local_scope();
        self.free_local(local);
        result
      },
      None => {
        self.sink.emit_opcode(OpCode::Pop);
        self.emit_statement(&catch.body)
      },
    };
    self.catch_depth -= 1;
    result?;

    self.sink.close_local_scope();
    Ok(())
  }

  fn emit_no_op(
    &mut self,
    flavor: NoOpFlavor,
    span: &Span,
  ) {
    match flavor {
      NoOpFlavor::Default => {
        if self.style == EmitStyle::Debug {
          self.sink.emit_opcode(OpCode::Nop);
        }
      },
      NoOpFlavor::AwaitYieldPoint => {
        assert_eq!(
          self.yield_points.len(),
          self.resume_points.len(),
          "yield point before the previous resume point"
        );
        let marker = self.sink.allocate_marker();
        self.yield_points.push((marker, span.clone()));
      },
      NoOpFlavor::AwaitResumePoint => {
        assert_eq!(
          self.yield_points.len(),
          self.resume_points.len() + 1,
          "resume point without a matching yield point"
        );
        let marker = self.sink.allocate_marker();
        self.resume_points.push(marker);
      },
    }
  }
}
