//! Applies a binding plan to one request and calls the handler.

use crate::dispatch::RequestContext;
use crate::error::{DispatchError, InputError};
use crate::handler::args::{Arg, Args};
use crate::handler::binding::{Binding, BindingPlan, Source};
use crate::handler::reply::Reply;
use crate::handler::spec::DefaultValue;

/// Result of a call that did not fault.
#[derive(Debug)]
pub enum Invocation {
    /// The handler ran and returned this.
    Returned(Reply),
    /// An input could not be bound; answered with 400.
    Rejected(InputError),
}

pub struct HandlerInvoker;

impl HandlerInvoker {
    /// Build the argument list for `plan` from the current request.
    pub fn resolve(plan: &BindingPlan, ctx: &RequestContext) -> Result<Args, InputError> {
        let mut args = Args::new();
        for binding in &plan.bindings {
            args.push(binding.name.clone(), Self::resolve_one(binding, ctx)?);
        }
        Ok(args)
    }

    fn resolve_one(binding: &Binding, ctx: &RequestContext) -> Result<Arg, InputError> {
        let arg = match binding.source {
            Source::Connection => Arg::Connection(ctx.connection.clone()),
            Source::Request => Arg::Request(ctx.request.clone()),
            Source::Session => Arg::Session(ctx.session.clone()),
            Source::Query => Arg::Query(ctx.request.query()),
            Source::Post => Arg::Post(ctx.request.post()),
            Source::Files => Arg::Files(ctx.request.files()),
            Source::PathVariable => match (ctx.vars.get(&binding.name), &binding.default) {
                (Some(value), _) => Arg::Text(value.to_string()),
                (None, Some(DefaultValue::Null)) => Arg::Null,
                (None, Some(DefaultValue::Text(text))) => Arg::Text(text.to_string()),
                (None, None) => return Err(InputError::Missing(binding.name.to_string())),
            },
        };
        Ok(arg)
    }

    /// Resolve arguments and run `call`. Binding failures, including ones the
    /// call raises while converting its arguments, become [`Invocation::Rejected`].
    pub fn invoke<F>(
        plan: &BindingPlan,
        ctx: &RequestContext,
        call: F,
    ) -> Result<Invocation, DispatchError>
    where
        F: FnOnce(Args) -> anyhow::Result<Reply>,
    {
        let args = match Self::resolve(plan, ctx) {
            Ok(args) => args,
            Err(input) => return Ok(Invocation::Rejected(input)),
        };
        match call(args) {
            Ok(reply) => Ok(Invocation::Returned(reply)),
            Err(err) => match err.downcast::<InputError>() {
                Ok(input) => Ok(Invocation::Rejected(input)),
                Err(err) => Err(DispatchError::Handler(err)),
            },
        }
    }
}
