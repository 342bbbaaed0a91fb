//! Handlers, their declared parameters, and how they are called.

mod args;
mod binding;
mod callable;
mod controller;
mod invoker;
mod reply;
mod spec;

pub use args::{Arg, Args, FromArg};
pub use binding::{Binding, BindingPlan, ParameterResolver, Source};
pub use callable::{Handler, HandlerInstance, Target};
pub use controller::{Controller, ControllerBase, Locals};
pub use invoker::{HandlerInvoker, Invocation};
pub use reply::{Flow, IntoReply, Json, JsonBody, Reply};
pub use spec::{DefaultValue, HandlerSpec, ParamDecl};
