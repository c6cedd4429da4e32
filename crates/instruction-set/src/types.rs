use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named instruction arguments, e.g. `{"item": "cheese"}`.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionKind {
    Primitive,
    Composite,
    Learned,
}

/// A call to an instruction, used both as a template step inside a composite
/// and as one entry of an interpreter-produced sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionCall {
    pub instruction: String,
    #[serde(default)]
    pub params: Params,
}

impl InstructionCall {
    pub fn new(instruction: impl Into<String>, params: Params) -> Self {
        Self {
            instruction: instruction.into(),
            params,
        }
    }

    pub fn bare(instruction: impl Into<String>) -> Self {
        Self::new(instruction, Params::new())
    }
}

/// Stored definition of one instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionDef {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<InstructionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_visible: Option<bool>,
    /// Executed whole by the domain sub-executor instead of being expanded.
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub runtime: bool,
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub learned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_phrase: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned_at: Option<String>,
}

/// A resolved registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: String,
    pub kind: InstructionKind,
    pub def: InstructionDef,
}

impl Instruction {
    /// Primitives are hidden from the model unless flagged; composites are shown by default.
    pub fn llm_visible(&self) -> bool {
        match self.kind {
            InstructionKind::Primitive => self.def.llm_visible.unwrap_or(false),
            InstructionKind::Composite | InstructionKind::Learned => {
                self.def.llm_visible.unwrap_or(true)
            }
        }
    }

    /// True when the instruction compiles to a single step of its own.
    pub fn is_leaf(&self) -> bool {
        self.kind == InstructionKind::Primitive || self.def.runtime
    }
}

/// On-disk instruction-set document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionSetDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default)]
    pub primitives: BTreeMap<String, InstructionDef>,
    #[serde(default)]
    pub composites: BTreeMap<String, InstructionDef>,
    #[serde(default)]
    pub learned_composites: BTreeMap<String, InstructionDef>,
}

/// One fully resolved step of an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub instruction: String,
    #[serde(default)]
    pub params: Params,
}

impl ExecutionStep {
    pub fn new(instruction: impl Into<String>, params: Params) -> Self {
        Self {
            instruction: instruction.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
    pub source_command: String,
    #[serde(default)]
    pub composite_name: Option<String>,
    pub confidence: f64,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

pub fn param_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Finite numeric parameter, accepting numbers and numeric strings.
pub fn param_f64(params: &Params, key: &str) -> Option<f64> {
    let value = match params.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}
