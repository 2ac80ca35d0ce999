//! Variable assignment and branching nodes

use crate::program::{Condition, Node, NodeId, NodePayload, ValueSource};
use crate::runtime::engine::TurnContext;
use crate::runtime::{Handler, HandlerError};
use crate::state::VariableStore;
use crate::trace::TraceEvent;
use async_trait::async_trait;
use serde_json::Value;

/// Writes variables and continues
pub struct SetVariablesHandler;

#[async_trait]
impl Handler for SetVariablesHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::SetVariables { .. })
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::SetVariables { assignments, next } = &node.payload else {
            return Err(HandlerError::wrong_node_type(node));
        };
        for assignment in assignments {
            let value = match &assignment.value {
                ValueSource::Literal { value } => value.clone(),
                ValueSource::Variable { name } => {
                    ctx.variables.get(name).cloned().unwrap_or(Value::Null)
                }
            };
            ctx.variables.set(assignment.variable.clone(), value);
        }
        Ok(next.clone())
    }
}

/// First-true branch dispatch
pub struct ConditionHandler;

#[async_trait]
impl Handler for ConditionHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::Condition { .. })
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::Condition {
            branches,
            otherwise,
        } = &node.payload
        else {
            return Err(HandlerError::wrong_node_type(node));
        };

        for (index, branch) in branches.iter().enumerate() {
            if evaluate(&branch.condition, &ctx.variables) {
                let label = branch
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("branch_{index}"));
                ctx.emit(TraceEvent::path(label));
                return Ok(branch.next.clone());
            }
        }
        ctx.emit(TraceEvent::path("otherwise"));
        Ok(otherwise.clone())
    }
}

fn evaluate(condition: &Condition, variables: &VariableStore) -> bool {
    match condition {
        Condition::Eq { variable, value } => variables.get(variable).is_some_and(|v| loose_eq(v, value)),
        Condition::Ne { variable, value } => variables.get(variable).is_none_or(|v| !loose_eq(v, value)),
        Condition::Gt { variable, value } => {
            as_number(variables.get(variable)).is_some_and(|n| n > *value)
        }
        Condition::Lt { variable, value } => {
            as_number(variables.get(variable)).is_some_and(|n| n < *value)
        }
        Condition::Contains { variable, value } => variables.get(variable).is_some_and(|v| match v {
            Value::String(s) => s.to_lowercase().contains(&value.to_lowercase()),
            Value::Array(items) => items.iter().any(|item| loose_eq(item, &Value::String(value.clone()))),
            _ => false,
        }),
        Condition::IsSet { variable } => variables
            .get(variable)
            .is_some_and(|v| !matches!(v, Value::Null)),
    }
}

/// Equality tolerant of the string/number mismatches captured values carry
fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (as_number(Some(left)), as_number(Some(right))) {
        (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
        _ => match (left, right) {
            (Value::String(l), r) | (r, Value::String(l)) => match r {
                Value::String(_) => false,
                other => l == &other.to_string(),
            },
            _ => false,
        },
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
