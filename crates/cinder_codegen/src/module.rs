use std::collections::HashMap;

use cinder_bound::{FieldRef, MethodRef};
use cinder_diagnostics::{DiagnosticBag, DiagnosticMessage};
use cinder_il::Token;
use cinder_type::{
  span::Span,
  types::{TypeId, TypeStore},
};

/// Turns type and member references into metadata tokens.
///
/// Failures are reported into the diagnostics bag and produce [`Token::NIL`]; the caller keeps
/// emitting.
pub trait ModuleTranslator {
  fn types(&self) -> &TypeStore;

  fn translate_type(
    &mut self,
    ty: TypeId,
    syntax: &Span,
    diagnostics: &mut DiagnosticBag,
  ) -> Token;

  fn translate_method(
    &mut self,
    method: &MethodRef,
    syntax: &Span,
    diagnostics: &mut DiagnosticBag,
  ) -> Token;

  fn translate_field(
    &mut self,
    field: &FieldRef,
    syntax: &Span,
    diagnostics: &mut DiagnosticBag,
  ) -> Token;

  fn translate_string(
    &mut self,
    value: &str,
  ) -> Token;
}

/// Token tables shared by every method body of one compilation.
///
/// Rows are handed out in first-use order, so lowering the same bodies in the same order yields
/// the same tokens.
#[derive(Debug, Clone)]
pub struct CompilationModule {
  types: TypeStore,
  type_tokens: HashMap<TypeId, Token>,
  method_tokens: HashMap<MethodRef, Token>,
  field_tokens: HashMap<FieldRef, Token>,
  string_tokens: HashMap<String, Token>,
}

impl CompilationModule {
  pub fn new(types: TypeStore) -> Self {
    Self {
      types,
      type_tokens: HashMap::new(),
      method_tokens: HashMap::new(),
      field_tokens: HashMap::new(),
      string_tokens: HashMap::new(),
    }
  }

  pub fn types_mut(&mut self) -> &mut TypeStore {
    &mut self.types
  }

  pub fn type_count(&self) -> usize {
    self.type_tokens.len()
  }

  pub fn method_count(&self) -> usize {
    self.method_tokens.len()
  }

  fn method_is_resolvable(
    &self,
    method: &MethodRef,
  ) -> bool {
    !self.types.is_error(&method.declaring_type)
      && !self.types.is_error(&method.return_type)
      && method.parameters.iter().all(|p| !self.types.is_error(p))
  }
}

fn next_token<K>(
  table: &HashMap<K, Token>,
  kind: u8,
) -> Token {
  Token::new(kind, table.len() as u32 + 1)
}

impl ModuleTranslator for CompilationModule {
  fn types(&self) -> &TypeStore {
    &self.types
  }

  fn translate_type(
    &mut self,
    ty: TypeId,
    syntax: &Span,
    diagnostics: &mut DiagnosticBag,
  ) -> Token {
    if self.types.is_error(&ty) {
      diagnostics.report(DiagnosticMessage::UnresolvedType {
        name: self.types.type_name(&ty),
        span: syntax.clone(),
      });
      return Token::NIL;
    }

    if let Some(token) = self.type_tokens.get(&ty) {
      return *token;
    }

    let token = next_token(&self.type_tokens, Token::TYPE_TABLE);
    self.type_tokens.insert(ty, token);
    token
  }

  fn translate_method(
    &mut self,
    method: &MethodRef,
    syntax: &Span,
    diagnostics: &mut DiagnosticBag,
  ) -> Token {
    if !self.method_is_resolvable(method) {
      diagnostics.report(DiagnosticMessage::UnresolvedMethod {
        name: format!("{}::{}", self.types.type_name(&method.declaring_type), method.name),
        span: syntax.clone(),
      });
      return Token::NIL;
    }

    if let Some(token) = self.method_tokens.get(method) {
      return *token;
    }

    let token = next_token(&self.method_tokens, Token::METHOD_TABLE);
    self.method_tokens.insert(method.clone(), token);
    token
  }

  fn translate_field(
    &mut self,
    field: &FieldRef,
    syntax: &Span,
    diagnostics: &mut DiagnosticBag,
  ) -> Token {
    if self.types.is_error(&field.declaring_type) || self.types.is_error(&field.ty) {
      diagnostics.report(DiagnosticMessage::UnresolvedField {
        name: format!("{}::{}", self.types.type_name(&field.declaring_type), field.name),
        span: syntax.clone(),
      });
      return Token::NIL;
    }

    if let Some(token) = self.field_tokens.get(field) {
      return *token;
    }

    let token = next_token(&self.field_tokens, Token::FIELD_TABLE);
    self.field_tokens.insert(field.clone(), token);
    token
  }

  fn translate_string(
    &mut self,
    value: &str,
  ) -> Token {
    if let Some(token) = self.string_tokens.get(value) {
      return *token;
    }

    let token = next_token(&self.string_tokens, Token::STRING_HEAP);
    self.string_tokens.insert(value.to_string(), token);
    token
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn widget_method(types: &TypeStore) -> MethodRef {
    MethodRef {
      name: "Run".to_string(),
      declaring_type: types.object(),
      parameters: vec![types.i32()],
      return_type: types.void(),
      returns_void: true,
      is_static: true,
      is_virtual: false,
    }
  }

  #[test]
  fn test_tokens_are_stable_per_reference() {
    let mut module = CompilationModule::new(TypeStore::new());
    let mut diagnostics = DiagnosticBag::new();
    let i32_ty = module.types().i32();
    let string_ty = module.types().string();
    let span = Span::synthetic();

    let first = module.translate_type(i32_ty, &span, &mut diagnostics);
    let second = module.translate_type(string_ty, &span, &mut diagnostics);
    let again = module.translate_type(i32_ty, &span, &mut diagnostics);

    assert_eq!(first, Token(0x0200_0001));
    assert_eq!(second, Token(0x0200_0002));
    assert_eq!(again, first);
    assert_eq!(module.type_count(), 2);
    assert!(diagnostics.is_empty());
  }

  #[test]
  fn test_tables_are_separate() {
    let mut module = CompilationModule::new(TypeStore::new());
    let mut diagnostics = DiagnosticBag::new();
    let method = widget_method(module.types());

    let token = module.translate_method(&method, &Span::synthetic(), &mut diagnostics);
    let text = module.translate_string("hello");

    assert_eq!(token, Token(0x0600_0001));
    assert_eq!(text, Token(0x7000_0001));
    assert_eq!(module.translate_string("hello"), text);
  }

  #[test]
  fn test_error_type_reports_and_yields_nil() {
    let mut module = CompilationModule::new(TypeStore::new());
    let mut diagnostics = DiagnosticBag::new();
    let error = module.types().error();

    let token = module.translate_type(error, &Span::synthetic(), &mut diagnostics);

    assert!(token.is_nil());
    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.codes(), vec!["C0001"]);
  }

  #[test]
  fn test_member_of_error_type_reports() {
    let mut module = CompilationModule::new(TypeStore::new());
    let mut diagnostics = DiagnosticBag::new();
    let error = module.types().error();
    let mut method = widget_method(module.types());
    method.declaring_type = error;
    let field = FieldRef {
      name: "count".to_string(),
      declaring_type: error,
      ty: module.types().i32(),
      is_static: true,
    };

    assert!(module.translate_method(&method, &Span::synthetic(), &mut diagnostics).is_nil());
    assert!(module.translate_field(&field, &Span::synthetic(), &mut diagnostics).is_nil());
    assert_eq!(diagnostics.codes(), vec!["C0002", "C0003"]);
    assert_eq!(module.method_count(), 0);
  }
}
