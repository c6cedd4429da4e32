use crate::error::CompileError;
use crate::registry::InstructionRegistry;
use crate::types::{ExecutionPlan, ExecutionStep, InstructionCall, InstructionKind, Params};
use serde_json::Value;
use tracing::{debug, warn};

/// Nesting bound for composite expansion.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Expands named instructions into flat plans of leaf steps.
///
/// Leaf steps are primitives and runtime composites; everything else is
/// expanded recursively with `{param}` placeholders filled in.
pub struct Compiler<'a> {
    registry: &'a InstructionRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a InstructionRegistry) -> Self {
        Self { registry }
    }

    /// Compile one named instruction.
    pub fn compile(&self, name: &str, params: &Params) -> Result<ExecutionPlan, CompileError> {
        let Some(instruction) = self.registry.get(name) else {
            warn!(%name, "cannot compile unknown instruction");
            return Err(CompileError::UnknownInstruction(name.to_string()));
        };
        let mut steps = Vec::new();
        let mut stack = Vec::new();
        self.expand(name, params, &mut stack, &mut steps)?;
        let composite_name = (instruction.kind != InstructionKind::Primitive).then(|| name.to_string());
        Ok(ExecutionPlan {
            steps,
            source_command: name.to_string(),
            composite_name,
            confidence: instruction.def.confidence.unwrap_or(1.0),
        })
    }

    /// Compile an explicit list of calls, skipping unknown entries.
    pub fn compile_sequence(
        &self,
        calls: &[InstructionCall],
        confidence: f64,
    ) -> Result<ExecutionPlan, CompileError> {
        let mut steps = Vec::new();
        let mut stack = Vec::new();
        for call in calls {
            self.expand(&call.instruction, &call.params, &mut stack, &mut steps)?;
        }
        let source_command = calls
            .iter()
            .map(|c| c.instruction.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        Ok(ExecutionPlan {
            steps,
            source_command,
            composite_name: None,
            confidence,
        })
    }

    fn expand(
        &self,
        name: &str,
        params: &Params,
        stack: &mut Vec<String>,
        out: &mut Vec<ExecutionStep>,
    ) -> Result<(), CompileError> {
        let Some((kind, def)) = self.registry.lookup(name) else {
            warn!(%name, "skipping unknown instruction");
            return Ok(());
        };
        if stack.iter().any(|n| n == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(CompileError::Cyclic {
                chain: chain.join(" -> "),
            });
        }
        if stack.len() >= MAX_EXPANSION_DEPTH {
            return Err(CompileError::DepthExceeded {
                name: name.to_string(),
                limit: MAX_EXPANSION_DEPTH,
            });
        }

        if kind == InstructionKind::Primitive || def.runtime {
            out.push(ExecutionStep::new(name, params.clone()));
            return Ok(());
        }

        debug!(%name, steps = def.sequence.len(), "expanding composite");
        stack.push(name.to_string());
        for template in &def.sequence {
            let sub_params = substitute_params(&template.params, params);
            self.expand(&template.instruction, &sub_params, stack, out)?;
        }
        stack.pop();
        Ok(())
    }
}

/// Fill `{key}` placeholders in a parameter template.
///
/// A string that is exactly one placeholder takes the argument's JSON value
/// unchanged; placeholders embedded in longer strings are spliced in as text.
pub fn substitute_params(template: &Params, args: &Params) -> Params {
    template
        .iter()
        .map(|(k, v)| (k.clone(), substitute_value(v, args)))
        .collect()
}

fn substitute_value(value: &Value, args: &Params) -> Value {
    match value {
        Value::String(s) => substitute_str(s, args),
        Value::Object(map) => Value::Object(substitute_params(map, args)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, args)).collect()),
        other => other.clone(),
    }
}

fn substitute_str(s: &str, args: &Params) -> Value {
    if let Some(key) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        if let Some(v) = args.get(key) {
            return v.clone();
        }
    }
    let mut out = s.to_string();
    for (key, v) in args {
        let placeholder = format!("{{{key}}}");
        if out.contains(&placeholder) {
            let text = match v {
                Value::String(t) => t.clone(),
                other => other.to_string(),
            };
            out = out.replace(&placeholder, &text);
        }
    }
    Value::String(out)
}
