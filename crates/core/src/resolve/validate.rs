use crate::actor::Actor;
use crate::context::ExecutionContext;
use crate::error::{CommandError, InvalidReason};
use crate::node::ParameterNode;
use crate::param::ParamSpec;
use crate::value::{Value, numeric_value};

/// Checks a resolved value against a constraint.
///
/// Which validators apply to a parameter is decided once at registration
/// via [`applies_to`](Validator::applies_to); at dispatch the applicable ones
/// run in registration order after the resolver succeeds.
pub trait Validator<A: Actor>: Send + Sync {
    /// Whether this validator should run for `param`.
    fn applies_to(&self, param: &ParamSpec<A>) -> bool;

    /// Fail with a typed error if `value` violates the constraint. `input`
    /// is the text the value was resolved from.
    fn validate(
        &self,
        value: &Value,
        input: &str,
        param: &ParameterNode<A>,
        context: &ExecutionContext<A>,
    ) -> Result<(), CommandError>;
}

/// Enforces `ParamSpec::range` on numeric parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeValidator;

impl<A: Actor> Validator<A> for RangeValidator {
    fn applies_to(&self, param: &ParamSpec<A>) -> bool {
        param.attrs().range.is_some() && param.ty().is_numeric()
    }

    fn validate(
        &self,
        value: &Value,
        input: &str,
        param: &ParameterNode<A>,
        _: &ExecutionContext<A>,
    ) -> Result<(), CommandError> {
        let (Some((min, max)), Some(n)) = (param.attrs().range, numeric_value(value)) else {
            return Ok(());
        };
        if min.is_some_and(|lo| n < lo) || max.is_some_and(|hi| n > hi) {
            return Err(CommandError::invalid_value(
                param.name(),
                input,
                InvalidReason::OutOfRange { min, max },
            ));
        }
        Ok(())
    }
}

/// Enforces `ParamSpec::length` on string parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthValidator;

impl<A: Actor> Validator<A> for LengthValidator {
    fn applies_to(&self, param: &ParamSpec<A>) -> bool {
        param.attrs().length.is_some() && param.ty().is::<String>()
    }

    fn validate(
        &self,
        value: &Value,
        input: &str,
        param: &ParameterNode<A>,
        _: &ExecutionContext<A>,
    ) -> Result<(), CommandError> {
        let (Some((min, max)), Some(text)) = (param.attrs().length, value.get::<String>()) else {
            return Ok(());
        };
        let actual = text.chars().count();
        if actual < min || max.is_some_and(|hi| actual > hi) {
            return Err(CommandError::invalid_value(
                param.name(),
                input,
                InvalidReason::Length { min, max, actual },
            ));
        }
        Ok(())
    }
}
