//! Volunteer hub terminal client.

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use volunteer_client::HttpBackend;
use volunteer_common::{Config, Session};
use volunteer_core::{
    Backend, Comment, CommentTree, Event, Keyed, MutationController, Normalize, NormalizeContext,
    PaginatedCollection, Placement, Post, Reaction, Registration, Resource,
};

#[derive(Debug, Parser)]
#[command(name = "volunteer", version, about = "Volunteer hub terminal client")]
struct Cli {
    /// Configuration file (defaults to the layered `config/` directory)
    #[arg(short, long, env = "VOLUNTEER_CONFIG")]
    config: Option<PathBuf>,

    /// Print normalized entities as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the post feed
    Posts {
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// List volunteering events
    Events {
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show the comment thread under a post
    Comments { post_id: String },
    /// Publish a post
    Post { content: String },
    /// Like or unlike a post
    Like { post_id: String },
    /// Register or unregister for an event
    Register { event_id: String },
    /// Replace the text of a post
    Edit { post_id: String, content: String },
    /// Delete a post
    Delete { post_id: String },
}

struct App {
    backend: Arc<dyn Backend>,
    session: Session,
    ctx: NormalizeContext,
    page_size: u32,
    json: bool,
}

impl App {
    fn new(config: &Config, json: bool) -> Result<Self> {
        let backend = HttpBackend::from_config(config).context("failed to create HTTP backend")?;
        let ctx = NormalizeContext::from_config(config).context("invalid assets.base_url")?;
        let session = config
            .session
            .token
            .as_deref()
            .map_or_else(Session::anonymous, Session::bearer);

        Ok(Self {
            backend: Arc::new(backend),
            session,
            ctx,
            page_size: config.feed.page_size,
            json,
        })
    }

    fn collection<T>(&self, resource: Resource) -> Arc<PaginatedCollection<T>>
    where
        T: Normalize + Keyed + Clone + Send,
    {
        Arc::new(
            PaginatedCollection::new(
                Arc::clone(&self.backend),
                self.session.clone(),
                resource,
                self.ctx.clone(),
            )
            .with_page_size(self.page_size),
        )
    }

    fn print<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

/// Load the first page, then up to `pages - 1` more.
async fn load_pages<T>(collection: &PaginatedCollection<T>, pages: u32) -> Result<()>
where
    T: Normalize + Keyed + Clone + Send,
{
    collection.refresh().await?;
    for _ in 1..pages {
        if !collection.load_more().await? {
            break;
        }
    }
    Ok(())
}

/// Page forward until `id` is loaded.
async fn locate<T>(collection: &PaginatedCollection<T>, id: &str) -> Result<()>
where
    T: Normalize + Keyed + Clone + Send,
{
    collection.refresh().await?;
    while collection.get(id).is_none() {
        if !collection.load_more().await? {
            bail!("{} {id} not found", collection.resource());
        }
    }
    Ok(())
}

fn more_pages_hint(pages: u32) -> String {
    format!("(more posts available, use --pages {})", pages.saturating_add(1))
}

async fn run(app: App, command: Command) -> Result<()> {
    let now = Utc::now();

    match command {
        Command::Posts { pages } => {
            let feed = app.collection::<Post>(Resource::Posts);
            load_pages(&feed, pages).await?;
            let posts = feed.items();
            app.print(&posts, || {
                posts
                    .iter()
                    .map(|post| render::post(post, now))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })?;
            if !app.json && feed.has_more() {
                println!("\n{}", more_pages_hint(pages));
            }
        }
        Command::Events { pages } => {
            let events = app.collection::<Event>(Resource::Events);
            load_pages(&events, pages).await?;
            let items = events.items();
            app.print(&items, || {
                items
                    .iter()
                    .map(|event| render::event(event, now))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })?;
        }
        Command::Comments { post_id } => {
            let comments = app.collection::<Comment>(Resource::comments(&post_id));
            load_pages(&comments, u32::MAX).await?;
            let tree = CommentTree::from_collection(&comments);
            app.print(tree.comments(), || {
                tree.depth_first()
                    .into_iter()
                    .map(|(depth, comment)| render::comment(depth, comment, now))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            let orphans = tree.orphans().len();
            if !app.json && orphans > 0 {
                println!("({orphans} repl(ies) to removed comments not shown)");
            }
        }
        Command::Post { content } => {
            let feed = app.collection::<Post>(Resource::Posts);
            let controller = MutationController::new(feed);
            let post = controller
                .create(json!({ "content": content }), Placement::Front)
                .await?;
            info!(id = post.key(), "Post published");
            app.print(&post, || render::post(&post, now))?;
        }
        Command::Like { post_id } => {
            let feed = app.collection::<Post>(Resource::Posts);
            locate(&feed, &post_id).await?;
            let controller = MutationController::new(feed);
            let snapshot = controller.toggle(&post_id, Reaction).await?;
            let state = snapshot.after;
            let summary = json!({ "liked": state.active, "likeCount": state.count });
            app.print(&summary, || {
                let verb = if state.active { "Liked" } else { "Unliked" };
                format!("{verb} #{post_id} ({} like(s))", state.count)
            })?;
        }
        Command::Register { event_id } => {
            let events = app.collection::<Event>(Resource::Events);
            locate(&events, &event_id).await?;
            let controller = MutationController::new(events);
            let snapshot = controller.toggle(&event_id, Registration).await?;
            let state = snapshot.after;
            let summary = json!({ "registered": state.active, "registrationCount": state.count });
            app.print(&summary, || {
                let verb = if state.active { "Registered for" } else { "Unregistered from" };
                format!("{verb} #{event_id} ({} registered)", state.count)
            })?;
        }
        Command::Edit { post_id, content } => {
            let feed = app.collection::<Post>(Resource::Posts);
            locate(&feed, &post_id).await?;
            let controller = MutationController::new(feed);
            let post = controller.edit_content(&post_id, &content).await?;
            app.print(&post, || render::post(&post, now))?;
        }
        Command::Delete { post_id } => {
            let feed = app.collection::<Post>(Resource::Posts);
            let controller = MutationController::new(feed);
            controller.delete(&post_id).await?;
            info!(id = %post_id, "Post deleted");
            app.print(&json!({ "deleted": post_id }), || format!("Deleted #{post_id}"))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    // stdout carries command output only.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    info!(
        api = %config.api.base_url,
        authenticated = config.session.token.is_some(),
        "Starting volunteer client"
    );

    let app = App::new(&config, cli.json)?;
    run(app, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["volunteer", "posts", "--pages", "3", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Posts { pages: 3 }));

        let cli = Cli::parse_from(["volunteer", "comments", "42"]);
        assert!(matches!(cli.command, Command::Comments { post_id } if post_id == "42"));
    }

    #[test]
    fn test_more_pages_hint() {
        assert_eq!(more_pages_hint(3), "(more posts available, use --pages 4)");
        assert_eq!(
            more_pages_hint(u32::MAX),
            format!("(more posts available, use --pages {})", u32::MAX)
        );
    }
}
