//! Application factory.
//!
//! [`create_app`] wraps a caller supplied transformer. Every call to
//! [`AppFactory::build`] then:
//!
//! 1. installs the crash guard unless the crash policy is disabled,
//! 2. resolves an [`AppConfig`] from the options and environment,
//! 3. creates an empty [`App`],
//! 4. registers the built-in stages in a fixed order,
//! 5. registers `GET /ping` and `GET /teapot`,
//! 6. awaits the transformer,
//! 7. installs the unmatched-route fallback behind the transformer's layers,
//! 8. returns the app.
//!
//! The factory never binds a socket. Turn the result into a router with
//! [`App::into_router`] and serve it.
//!
//! ```rust,ignore
//! use app_factory::{create_app, AppOptions, Environment};
//! use axum::routing::get;
//!
//! let factory = create_app(|app, _config, _environment| async move {
//!     anyhow::Ok(app.route("/hello", get(|| async { "hello" })))
//! });
//! let app = factory.build(AppOptions::default(), Environment::Production).await?;
//! axum::serve(listener, app.into_router()).await?;
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::Request,
    response::IntoResponse,
    routing::{MethodRouter, Route},
    Router,
};
use futures::future::BoxFuture;
use strum::Display;
use tower::{Layer, Service};
use tracing::{debug, info, instrument};

use crate::api;
use crate::config::{AppConfig, AppOptions, BodyParserConfig, Environment};
use crate::error::{AppError, Result};
use crate::guard::{install_crash_guard, CrashPolicy};
use crate::metrics;
use crate::middleware::{body, cors, identity, logging, security, trace};

/// Built-in middleware stages, in the only order they are ever registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Request id and request span.
    RequestTracing,
    /// Security response headers.
    SecurityHeaders,
    /// Cross-origin resource sharing.
    Cors,
    /// JSON body parsing.
    JsonBody,
    /// On-behalf-of identity.
    OnBehalfOf,
    /// URL-encoded body parsing.
    UrlEncodedBody,
    /// Request logging.
    RequestLogging,
}

/// Whether the two body parsing stages follow configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyParsing {
    /// Include each body stage only when its flag is enabled.
    #[default]
    Configurable,
    /// Always include both body stages.
    Always,
}

impl Stage {
    /// Stages to register for the given body parser settings.
    pub fn pipeline(body_parser: &BodyParserConfig, mode: BodyParsing) -> Vec<Stage> {
        let always = mode == BodyParsing::Always;
        let mut stages = vec![Stage::RequestTracing, Stage::SecurityHeaders, Stage::Cors];
        if always || body_parser.json {
            stages.push(Stage::JsonBody);
        }
        stages.push(Stage::OnBehalfOf);
        if always || body_parser.url_encoded {
            stages.push(Stage::UrlEncodedBody);
        }
        stages.push(Stage::RequestLogging);
        stages
    }

    fn apply(self, router: Router, config: &AppConfig) -> Router {
        match self {
            Stage::RequestTracing => trace::apply(router, &config.trace),
            Stage::SecurityHeaders => security::apply(router, config.security),
            Stage::Cors => cors::apply(router, &config.cors),
            Stage::JsonBody => body::apply_json(router, config.body_parser.limit_bytes),
            Stage::OnBehalfOf => identity::apply(router),
            Stage::UrlEncodedBody => body::apply_url_encoded(router, config.body_parser.limit_bytes),
            Stage::RequestLogging => logging::apply(router, &config.logging),
        }
    }
}

type CallerLayer = Box<dyn Fn(Router) -> Router + Send + Sync>;

/// A configured application, not yet bound to a listener.
///
/// Routes are added builder style. `/ping` and `/teapot` are matched before any
/// caller route or layer; everything else goes to the caller's routes and then
/// the unmatched-route fallback. Built-in stages are recorded in registration
/// order and wrapped around all of it by [`App::into_router`]; the first
/// registered stage sees each request first.
///
/// Stages belong to the factory; a transformer cannot append one:
///
/// ```compile_fail
/// use app_factory::{App, Stage};
///
/// fn reorder(app: App) -> App {
///     app.with_stage(Stage::Cors)
/// }
/// ```
pub struct App {
    router: Router,
    caller_layers: Vec<CallerLayer>,
    stages: Vec<Stage>,
    config: Arc<AppConfig>,
    environment: Environment,
    diagnostics: bool,
    fallback: bool,
}

impl App {
    /// Create an empty application.
    pub fn new(config: Arc<AppConfig>, environment: Environment) -> Self {
        Self {
            router: Router::new(),
            caller_layers: Vec::new(),
            stages: Vec::new(),
            config,
            environment,
            diagnostics: false,
            fallback: false,
        }
    }

    fn with_stage(mut self, stage: Stage) -> Self {
        debug!(%stage, "registering stage");
        self.stages.push(stage);
        self
    }

    fn with_diagnostics(mut self) -> Self {
        self.diagnostics = true;
        self
    }

    /// Add a route.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Merge another router's routes.
    pub fn merge(mut self, other: Router) -> Self {
        self.router = self.router.merge(other);
        self
    }

    /// Nest a router under `path`.
    pub fn nest(mut self, path: &str, router: Router) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Wrap the routes registered so far, and the unmatched-route fallback, with
    /// `layer`.
    ///
    /// Routes added later are not affected, nor are `/ping` and `/teapot`.
    /// Built-in stages always wrap the result.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.router = self.router.layer(layer.clone());
        self.caller_layers
            .push(Box::new(move |router: Router| router.layer(layer.clone())));
        self
    }

    /// Resolved configuration.
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Environment the app was built for.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Registered built-in stages, in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Routes registered so far, without the built-in stages.
    pub fn routes(&self) -> Router {
        self.compose(self.router.clone())
    }

    /// Whether the unmatched-route fallback is installed.
    pub fn has_fallback(&self) -> bool {
        self.fallback
    }

    fn install_fallback(mut self) -> Self {
        let mut fallback = Router::new().fallback(api::unmatched);
        for layer in &self.caller_layers {
            fallback = layer(fallback);
        }
        self.router = self.router.fallback_service(fallback);
        self.fallback = true;
        self
    }

    fn compose(&self, rest: Router) -> Router {
        if self.diagnostics {
            api::diagnostic_routes(self.config.clone(), rest)
        } else {
            rest
        }
    }

    /// Finish the app: wrap every route in the built-in stages.
    pub fn into_router(self) -> Router {
        let mut router = self.compose(self.router.clone());
        for stage in self.stages.iter().rev() {
            router = stage.apply(router, &self.config);
        }
        router
    }
}

/// Caller customization run after the built-in routes and before the fallback.
///
/// Implemented for every `Fn(App, Arc<AppConfig>, Environment) -> impl Future<Output
/// = Result<App, E>>`.
pub trait Transformer: Send + Sync + 'static {
    /// Add routes and layers to `app` and hand it back.
    fn transform(
        &self,
        app: App,
        config: Arc<AppConfig>,
        environment: Environment,
    ) -> BoxFuture<'static, anyhow::Result<App>>;
}

impl<F, Fut, E> Transformer for F
where
    F: Fn(App, Arc<AppConfig>, Environment) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<App, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn transform(
        &self,
        app: App,
        config: Arc<AppConfig>,
        environment: Environment,
    ) -> BoxFuture<'static, anyhow::Result<App>> {
        let fut = self(app, config, environment);
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

/// Builds [`App`]s around a transformer.
pub struct AppFactory<T> {
    transformer: T,
    crash_policy: Option<CrashPolicy>,
    body_parsing: BodyParsing,
}

/// Create a factory from a transformer closure.
pub fn create_app<F, Fut, E>(transformer: F) -> AppFactory<F>
where
    F: Fn(App, Arc<AppConfig>, Environment) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<App, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    AppFactory::new(transformer)
}

impl<T: Transformer> AppFactory<T> {
    /// Create a factory from any [`Transformer`].
    pub fn new(transformer: T) -> Self {
        Self {
            transformer,
            crash_policy: None,
            body_parsing: BodyParsing::Configurable,
        }
    }

    /// Override the environment derived crash policy.
    pub fn with_crash_policy(mut self, policy: CrashPolicy) -> Self {
        self.crash_policy = Some(policy);
        self
    }

    /// Always register both body parsing stages, ignoring their flags.
    pub fn unconditional_body_parsing(mut self) -> Self {
        self.body_parsing = BodyParsing::Always;
        self
    }

    /// Build a new, independent application.
    ///
    /// Fails with [`AppError::Config`] before anything is registered when the
    /// options do not resolve, and with [`AppError::Transform`] when the
    /// transformer fails, in which case no fallback is ever installed.
    #[instrument(skip(self, options, environment), fields(environment = %environment))]
    pub async fn build(&self, options: AppOptions, environment: Environment) -> Result<App> {
        let policy = self
            .crash_policy
            .clone()
            .unwrap_or_else(|| CrashPolicy::for_environment(environment));
        if install_crash_guard(&policy) {
            debug!(?policy, "crash guard installed");
        }

        let config = Arc::new(AppConfig::resolve(options, environment)?);

        let mut app = App::new(config.clone(), environment);
        for stage in Stage::pipeline(&config.body_parser, self.body_parsing) {
            app = app.with_stage(stage);
        }
        app = app.with_diagnostics();

        let app = self
            .transformer
            .transform(app, config.clone(), environment)
            .await
            .map_err(AppError::Transform)?;
        let app = app.install_fallback();

        metrics::inc_apps_built();
        info!(
            name = %config.name,
            stages = app.stages().len(),
            "application built"
        );
        Ok(app)
    }
}
