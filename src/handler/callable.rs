//! Type-erased handler references stored in the route table.

use crate::handler::args::Args;
use crate::handler::controller::{Controller, ControllerBase};
use crate::handler::reply::{Flow, IntoReply, Reply};
use crate::handler::spec::HandlerSpec;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

type CallFn = dyn Fn(Args) -> anyhow::Result<Reply> + Send + Sync;
type ConstructFn = dyn Fn(ControllerBase) -> Box<dyn HandlerInstance> + Send + Sync;

/// A controller constructed for one request, with its routed method bound.
pub trait HandlerInstance {
    /// Runs before the routed method and may answer in its place.
    fn before_route(&mut self) -> anyhow::Result<Flow>;

    /// Call the routed method.
    fn call(&mut self, args: Args) -> anyhow::Result<Reply>;
}

struct Bound<C, F> {
    controller: C,
    method: Arc<F>,
}

impl<C, F, R> HandlerInstance for Bound<C, F>
where
    C: Controller,
    F: Fn(&mut C, Args) -> R,
    R: IntoReply,
{
    fn before_route(&mut self) -> anyhow::Result<Flow> {
        self.controller.before_route()
    }

    fn call(&mut self, args: Args) -> anyhow::Result<Reply> {
        (self.method)(&mut self.controller, args).into_reply()
    }
}

/// What a route invokes.
#[derive(Clone)]
pub enum Target {
    /// A free function or closure.
    Function(Arc<CallFn>),
    /// A method on a controller type instantiated per request.
    Method {
        controller: &'static str,
        method: Cow<'static, str>,
        construct: Arc<ConstructFn>,
    },
}

/// A handler together with its declared parameters.
#[derive(Clone)]
pub struct Handler {
    spec: Arc<HandlerSpec>,
    target: Target,
}

impl Handler {
    /// Wrap a function taking resolved arguments.
    pub fn function<F, R>(spec: HandlerSpec, call: F) -> Self
    where
        F: Fn(Args) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Self {
            spec: Arc::new(spec),
            target: Target::Function(Arc::new(move |args| call(args).into_reply())),
        }
    }

    /// Wrap a method of controller `C`.
    pub fn method<C, F, R>(spec: HandlerSpec, method: impl Into<Cow<'static, str>>, call: F) -> Self
    where
        C: Controller,
        F: Fn(&mut C, Args) -> R + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        let call = Arc::new(call);
        let construct = move |base: ControllerBase| -> Box<dyn HandlerInstance> {
            Box::new(Bound {
                controller: C::new(base),
                method: call.clone(),
            })
        };
        Self {
            spec: Arc::new(spec),
            target: Target::Method {
                controller: C::name(),
                method: method.into(),
                construct: Arc::new(construct),
            },
        }
    }

    /// Stable identity, used as the binding plan key.
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Controller type name, for method handlers.
    pub fn controller(&self) -> Option<&'static str> {
        match &self.target {
            Target::Method { controller, .. } => Some(*controller),
            Target::Function(_) => None,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Handler");
        s.field("id", &self.spec.id);
        if let Target::Method { controller, method, .. } = &self.target {
            s.field("controller", controller).field("method", method);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::args::Arg;
    use crate::http::Response;

    struct Greeter {
        calls: u32,
    }

    impl Controller for Greeter {
        fn new(_base: ControllerBase) -> Self {
            Greeter { calls: 0 }
        }
    }

    #[test]
    fn test_function_handler_call() {
        let handler = Handler::function(HandlerSpec::named("hello").param("name"), |mut args: Args| {
            let name: String = args.take("name")?;
            Ok::<_, anyhow::Error>(Response::text(format!("hi {}", name)))
        });
        assert_eq!(handler.id(), "hello");
        assert!(handler.controller().is_none());

        let Target::Function(call) = handler.target() else {
            panic!("expected a function target");
        };
        let mut args = Args::new();
        args.push("name", Arg::Text("ada".into()));
        let Reply::Response(response) = call(args).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.text_body().as_deref(), Some("hi ada"));
    }

    #[test]
    fn test_method_handler_instance() {
        let handler = Handler::method::<Greeter, _, _>(
            HandlerSpec::named("Greeter::count"),
            "count",
            |this: &mut Greeter, _: Args| {
                this.calls += 1;
                Response::text(this.calls.to_string())
            },
        );
        assert_eq!(handler.controller(), Some("Greeter"));

        let Target::Method { construct, method, .. } = handler.target() else {
            panic!("expected a method target");
        };
        assert_eq!(method, "count");
        let mut instance = construct(ControllerBase::detached());
        assert!(matches!(instance.before_route().unwrap(), Flow::Continue));
        instance.call(Args::new()).unwrap();
        let Reply::Response(response) = instance.call(Args::new()).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.text_body().as_deref(), Some("2"));
    }

    #[test]
    fn test_debug_shows_identity() {
        let handler = Handler::function(HandlerSpec::named("ping"), |_| Response::ok());
        assert_eq!(format!("{:?}", handler), "Handler { id: \"ping\" }");
    }
}
