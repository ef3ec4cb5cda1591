//! Example users-and-posts service built with Brewery.
//!
//! Manifests under `project/` declare the components; [`catalog`] supplies
//! the code behind them.
//!
//! # Layout
//!
//! ```text
//! project/
//! ├── brewery.toml
//! └── src/
//!     ├── app/                      use-cases
//!     ├── infra/
//!     │   ├── datasources/          main.toml (memory)
//!     │   ├── models/               User, Post
//!     │   └── repositories/         userRepository, postRepository
//!     └── interfaces/
//!         ├── controllers/          usersController, postsController
//!         ├── middlewares/          requestLog
//!         └── router.toml
//! ```

use async_trait::async_trait;
use brewery_app::{BootConfig, ComponentCatalog, Context, Flow, Middleware, Response, Router};
use brewery_datasource::{BaseRepository, DataType, Filter, MemoryModel, Model, RepositoryError};
use brewery_registry::BoxError;
use serde_json::{Value, json};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Repositories
// ─────────────────────────────────────────────────────────────────────────────

/// Posts, with a per-author query on top of the generic operations.
#[derive(Debug, Clone)]
pub struct PostRepository {
    base: BaseRepository,
}

impl PostRepository {
    /// Wraps the bound `Post` model.
    #[must_use]
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            base: BaseRepository::new(model),
        }
    }

    /// Generic operations.
    #[must_use]
    pub fn base(&self) -> &BaseRepository {
        &self.base
    }

    /// Posts written by `user_id`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn by_author(&self, user_id: u64) -> Result<Vec<Value>, RepositoryError> {
        let mut filter = Filter::new();
        filter.insert("userId".into(), json!(user_id));
        self.base.get_all(&filter).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Use-cases
// ─────────────────────────────────────────────────────────────────────────────

/// Lists every user.
pub struct ListUsers {
    users: Arc<BaseRepository>,
}

impl ListUsers {
    /// Runs the use-case.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn execute(&self) -> Result<Vec<Value>, RepositoryError> {
        self.users.get_all(&Filter::new()).await
    }
}

/// Registers a user.
pub struct CreateUser {
    users: Arc<BaseRepository>,
}

impl CreateUser {
    /// Runs the use-case.
    ///
    /// # Errors
    ///
    /// Fails if the payload does not match the `User` attributes.
    pub async fn execute(&self, payload: Value) -> Result<Value, RepositoryError> {
        self.users.add(payload).await
    }
}

/// Fetches one user with their posts.
pub struct GetUser {
    users: Arc<BaseRepository>,
    posts: Arc<PostRepository>,
}

impl GetUser {
    /// Runs the use-case.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] for an unknown id.
    pub async fn execute(&self, id: u64) -> Result<Value, RepositoryError> {
        let mut user = self.users.get_by_id(id).await?;
        let posts = self.posts.by_author(id).await?;
        user["posts"] = Value::Array(posts);
        Ok(user)
    }
}

/// Publishes a post for an existing user.
pub struct PublishPost {
    users: Arc<BaseRepository>,
    posts: Arc<PostRepository>,
}

impl PublishPost {
    /// Runs the use-case.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if the author does not exist.
    pub async fn execute(&self, user_id: u64, mut payload: Value) -> Result<Value, RepositoryError> {
        self.users.get_by_id(user_id).await?;
        payload["userId"] = json!(user_id);
        self.posts.base().add(payload).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controllers
// ─────────────────────────────────────────────────────────────────────────────

fn id_param(ctx: &Context) -> Result<u64, BoxError> {
    let raw = ctx.request.param("id").unwrap_or_default();
    raw.parse()
        .map_err(|_| format!("`{raw}` is not a valid id").into())
}

/// `/users` endpoints.
#[derive(Debug)]
pub struct UsersController {
    greeting: String,
}

impl UsersController {
    /// `GET /users`
    pub async fn list(self: Arc<Self>, ctx: Context) -> Result<Response, BoxError> {
        let users = ctx.resolve_as::<ListUsers>("listUsers")?.execute().await?;
        Ok(Response::ok(json!({ "greeting": self.greeting, "users": users })))
    }

    /// `POST /users`
    pub async fn create(self: Arc<Self>, ctx: Context) -> Result<Response, BoxError> {
        let user = ctx
            .resolve_as::<CreateUser>("createUser")?
            .execute(ctx.request.body.clone())
            .await?;
        Ok(Response::json(201, user))
    }

    /// `GET /users/:id`
    pub async fn show(self: Arc<Self>, ctx: Context) -> Result<Response, BoxError> {
        let id = id_param(&ctx)?;
        let user = ctx.resolve_as::<GetUser>("getUser")?.execute(id).await?;
        Ok(Response::ok(user))
    }
}

/// `/users/:id/posts` endpoints.
#[derive(Debug, Default)]
pub struct PostsController;

impl PostsController {
    /// `POST /users/:id/posts`
    pub async fn publish(self: Arc<Self>, ctx: Context) -> Result<Response, BoxError> {
        let id = id_param(&ctx)?;
        let post = ctx
            .resolve_as::<PublishPost>("publishPost")?
            .execute(id, ctx.request.body.clone())
            .await?;
        Ok(Response::json(201, post))
    }
}

/// Adapts a controller action to a route handler.
fn action<C, F, Fut>(controller: &Arc<C>, handler: F) -> impl Fn(Context) -> Fut + Send + Sync + 'static
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    let controller = Arc::clone(controller);
    move |ctx| handler(Arc::clone(&controller), ctx)
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Logs every request that reaches it.
#[derive(Debug, Default)]
pub struct RequestLog;

#[async_trait]
impl Middleware for RequestLog {
    fn name(&self) -> &str {
        "requestLog"
    }

    async fn handle(&self, ctx: &mut Context) -> Result<Flow, BoxError> {
        tracing::info!(method = %ctx.request.method, path = %ctx.request.path, "incoming request");
        Ok(Flow::Continue)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Every factory the `project/` manifests refer to.
#[must_use]
pub fn catalog() -> ComponentCatalog {
    let mut catalog = ComponentCatalog::new();
    catalog
        .model("User", |handle, _types| {
            let model = MemoryModel::define("User", handle)?
                .attribute("email", DataType::String)
                .attribute("name", DataType::String);
            Ok(Arc::new(model) as Arc<dyn Model>)
        })
        .model("Post", |handle, _types| {
            let model = MemoryModel::define("Post", handle)?
                .attribute("title", DataType::String)
                .attribute("body", DataType::Text)
                .attribute("userId", DataType::Integer)
                .belongs_to("User");
            Ok(Arc::new(model) as Arc<dyn Model>)
        })
        .repository("postRepository", |model| Ok(PostRepository::new(model)))
        .use_case("listUsers", ["userRepository"], |inj| {
            Ok(ListUsers {
                users: inj.get("userRepository")?,
            })
        })
        .use_case("createUser", ["userRepository"], |inj| {
            Ok(CreateUser {
                users: inj.get("userRepository")?,
            })
        })
        .use_case("getUser", ["userRepository", "postRepository"], |inj| {
            Ok(GetUser {
                users: inj.get("userRepository")?,
                posts: inj.get("postRepository")?,
            })
        })
        .use_case("publishPost", ["userRepository", "postRepository"], |inj| {
            Ok(PublishPost {
                users: inj.get("userRepository")?,
                posts: inj.get("postRepository")?,
            })
        })
        .controller("usersController", ["config"], |inj| {
            let config = inj.get::<BootConfig>("config")?;
            let greeting = config
                .setting("greeting")
                .and_then(Value::as_str)
                .unwrap_or("hello")
                .to_owned();
            Ok(UsersController { greeting })
        })
        .controller("postsController", Vec::<String>::new(), |_| Ok(PostsController))
        .middleware("requestLog", RequestLog)
        .router("router", |inj| {
            let users = inj.get::<UsersController>("usersController")?;
            let posts = inj.get::<PostsController>("postsController")?;
            let mut router = Router::new();
            router
                .get("/users", action(&users, UsersController::list))
                .post("/users", action(&users, UsersController::create))
                .get("/users/:id", action(&users, UsersController::show))
                .post("/users/:id/posts", action(&posts, PostsController::publish));
            Ok(router)
        });
    catalog
}
