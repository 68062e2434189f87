//! JavaScript sandbox backed by an embedded boa context.

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsObject, JsString, Source, js_string};

use super::{
  COMPILE_ENTRYPOINT, CompileError, ENGINE_GLOBAL, HelperGate, Sandbox, SandboxError, ScriptRuntime,
};

fn entrypoint_check() -> String {
  format!(
    "typeof {g} === 'object' && {g} !== null && typeof {g}.{f} === 'function'",
    g = ENGINE_GLOBAL,
    f = COMPILE_ENTRYPOINT
  )
}

fn compile_call() -> String {
  format!("{ENGINE_GLOBAL}.{COMPILE_ENTRYPOINT}(String(data), options)")
}

/// A JavaScript context with the engine evaluated into its global scope.
pub struct JsSandbox {
  context: Context,
}

impl JsSandbox {
  /// Evaluate `source` into a fresh context and check for the entrypoint.
  pub fn load(engine: &str, source: &str) -> Result<Self, SandboxError> {
    let load_error = |e: JsError| SandboxError::Load {
      engine: engine.to_string(),
      message: e.to_string(),
    };

    let mut context = Context::default();
    context.eval(Source::from_bytes(source)).map_err(load_error)?;

    let ready = context.eval(Source::from_bytes(&entrypoint_check())).map_err(load_error)?;
    if !ready.to_boolean() {
      return Err(SandboxError::MissingEntrypoint {
        engine: engine.to_string(),
      });
    }

    Ok(Self { context })
  }

  /// Evaluate arbitrary script in the sandbox and return its string value.
  pub fn eval_to_string(&mut self, script: &str) -> Result<String, CompileError> {
    let value = match self.context.eval(Source::from_bytes(script)) {
      Ok(value) => value,
      Err(e) => return Err(self.describe(e)),
    };
    match value.to_string(&mut self.context) {
      Ok(text) => Ok(text.to_std_string_escaped()),
      Err(e) => Err(self.describe(e)),
    }
  }

  /// Render a thrown value the way the engine would print it.
  fn describe(&mut self, e: JsError) -> CompileError {
    let message = e
      .to_opaque(&mut self.context)
      .to_string(&mut self.context)
      .map(|text| text.to_std_string_escaped())
      .unwrap_or_else(|_| e.to_string());
    CompileError::new(message)
  }

  /// Build the engine's `options` argument from the gate.
  ///
  /// Engines enumerate `knownHelpers`, so every known name becomes an
  /// enumerable `true` property. `knownHelpersOnly` is set only when strict.
  fn options_object(&mut self, gate: &HelperGate) -> JsObject {
    let known_helpers = {
      let mut helpers = ObjectInitializer::new(&mut self.context);
      for name in gate.names() {
        helpers.property(JsString::from(name), true, Attribute::all());
      }
      helpers.build()
    };

    let mut options = ObjectInitializer::new(&mut self.context);
    options.property(js_string!("knownHelpers"), known_helpers, Attribute::all());
    if gate.strict_only() {
      options.property(js_string!("knownHelpersOnly"), true, Attribute::all());
    }
    options.build()
  }
}

impl Sandbox for JsSandbox {
  fn runtime(&self) -> ScriptRuntime {
    ScriptRuntime::JavaScript
  }

  fn compile(&mut self, template: &str, gate: &HelperGate) -> Result<String, CompileError> {
    let options = self.options_object(gate);
    let global = self.context.global_object();
    let bound = global
      .set(js_string!("data"), JsString::from(template), true, &mut self.context)
      .and_then(|_| global.set(js_string!("options"), options, true, &mut self.context));
    if let Err(e) = bound {
      return Err(self.describe(e));
    }

    self.eval_to_string(&compile_call())
  }
}
