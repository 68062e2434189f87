//! Lua sandbox backed by an embedded Lua 5.4 state.
//!
//! The state is created with only the `table`, `string`, `utf8` and `math`
//! libraries, and the base functions that load code from disk or strings are
//! removed before the engine runs.

use mlua::prelude::*;
use mlua::{LuaOptions, StdLib};

use super::{
  COMPILE_ENTRYPOINT, CompileError, ENGINE_GLOBAL, HelperGate, Sandbox, SandboxError, ScriptRuntime,
};

const REMOVED_GLOBALS: &[&str] = &["load", "loadfile", "dofile", "collectgarbage"];

impl LuaUserData for HelperGate {
  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    // `knownHelpers[name]` answers membership for any name.
    methods.add_meta_method(LuaMetaMethod::Index, |_, gate, name: String| Ok(gate.is_known(&name)));
  }
}

/// A Lua state with the engine evaluated into its globals.
pub struct LuaSandbox {
  lua: Lua,
}

impl LuaSandbox {
  pub fn load(engine: &str, source: &str) -> Result<Self, SandboxError> {
    let load_error = |e: LuaError| SandboxError::Load {
      engine: engine.to_string(),
      message: e.to_string(),
    };

    let lua = Lua::new_with(
      StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH,
      LuaOptions::default(),
    )
    .map_err(load_error)?;
    restrict_globals(&lua).map_err(load_error)?;

    lua
      .load(source)
      .set_name(format!("@{}", engine))
      .exec()
      .map_err(load_error)?;

    if !has_entrypoint(&lua).map_err(load_error)? {
      return Err(SandboxError::MissingEntrypoint {
        engine: engine.to_string(),
      });
    }

    Ok(Self { lua })
  }

  fn precompile(&self, template: &str, gate: &HelperGate) -> LuaResult<String> {
    let handlebars: LuaTable = self.lua.globals().get(ENGINE_GLOBAL)?;
    let precompile: LuaFunction = handlebars.get(COMPILE_ENTRYPOINT)?;

    let options = self.lua.create_table()?;
    options.set("knownHelpers", gate.clone())?;
    if gate.strict_only() {
      options.set("knownHelpersOnly", true)?;
    }

    precompile.call::<String>((template, options))
  }
}

impl Sandbox for LuaSandbox {
  fn runtime(&self) -> ScriptRuntime {
    ScriptRuntime::Lua
  }

  fn compile(&mut self, template: &str, gate: &HelperGate) -> Result<String, CompileError> {
    self
      .precompile(template, gate)
      .map_err(|e| CompileError::new(e.to_string()))
  }
}

fn restrict_globals(lua: &Lua) -> LuaResult<()> {
  let globals = lua.globals();
  for name in REMOVED_GLOBALS {
    globals.set(*name, LuaValue::Nil)?;
  }
  Ok(())
}

fn has_entrypoint(lua: &Lua) -> LuaResult<bool> {
  let LuaValue::Table(handlebars) = lua.globals().get::<LuaValue>(ENGINE_GLOBAL)? else {
    return Ok(false);
  };
  Ok(matches!(handlebars.get::<LuaValue>(COMPILE_ENTRYPOINT)?, LuaValue::Function(_)))
}
