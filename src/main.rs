//! Switchyard demo server.
//!
//! Serves a small item API through a controller and two free-function
//! handlers. `APP_ENV` selects the environment.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use switchyard::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item {
    id: u64,
    name: String,
}

/// Item endpoints under `/items`.
struct Items {
    base: ControllerBase,
}

impl Controller for Items {
    fn new(base: ControllerBase) -> Self {
        Self { base }
    }

    fn before_route(&mut self) -> anyhow::Result<Flow> {
        self.base.locals_mut().insert("title", json!("Items"));
        Ok(Flow::Continue)
    }
}

#[routes]
impl Items {
    #[route("GET /")]
    fn index(&mut self, get: Params) -> Json<Vec<Item>> {
        let limit = get.get_as::<usize>("limit").unwrap_or(10);
        Json(
            (1..=limit as u64)
                .map(|id| Item {
                    id,
                    name: format!("item-{}", id),
                })
                .collect(),
        )
    }

    #[route("GET /{id:\\d+}")]
    fn show(&mut self, id: u64) -> anyhow::Result<Response> {
        Ok(self.base.json(&Item {
            id,
            name: format!("item-{}", id),
        })?)
    }

    #[route("POST")]
    fn remember(&mut self, session: Session, post: Params) -> anyhow::Result<Response> {
        let name = post.get("name").unwrap_or("unnamed");
        session.set("last_item", name)?;
        Ok(self.base.redirect("/items"))
    }
}

#[handler]
fn ping() -> Response {
    Response::text("pong")
}

#[handler]
fn greet(name: String, #[default_value("Hello")] greeting: String) -> Value {
    json!({ "message": format!("{}, {}!", greeting, name) })
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let environment = Environment::from_env()?;
    let config = ServerConfig::for_environment(environment).host("0.0.0.0");

    tracing::info!("Starting Switchyard demo server...");
    tracing::info!("Try: curl http://localhost:{}/items?limit=3", config.port);
    tracing::info!("Try: curl http://localhost:{}/greet/ada", config.port);

    Server::new(config).run(|dispatch| {
        let mut routes = RouteTable::new();
        routes.get("/ping", PingHandler)?;
        routes.get("/greet/{name}", GreetHandler)?;
        routes.scan::<Items>()?;
        Ok(Coordinator::new(routes.freeze(), dispatch.clone()))
    })
}
