use anyhow::Context;
use clap::{value_parser, Arg, Command};
use conduit_domain::{Article, Follow, UserId};
use conduit_grants::Component;
use conduit_index::MemoryIndex;
use conduit_pipeline::{
    run_with_retries, ChangeDispatcher, FeedMaterializer, JsonlDeadLetter, PipelineConfig,
    RetryPolicy, SearchSynchronizer,
};
use conduit_store::{ArticleStore, ChangeLogSource, FeedStore, FollowStore, MemoryStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Command::new("conduit-pipeline")
        .version(conduit_pipeline::VERSION)
        .about("Change propagation worker: feed fan-out and search-index sync")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Path to a TOML config file"),
        )
        .subcommand(
            Command::new("demo")
                .about("Seed an in-memory store and drain its change log")
                .arg(
                    Arg::new("authors")
                        .long("authors")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Number of authors to seed"),
                )
                .arg(
                    Arg::new("followers")
                        .long("followers")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Followers per author"),
                )
                .arg(
                    Arg::new("articles")
                        .long("articles")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Articles per author"),
                ),
        )
        .subcommand(
            Command::new("check-config").about("Load and print the effective configuration"),
        );

    let matches = cli.get_matches();
    let config = match matches.get_one::<String>("config") {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => PipelineConfig::default(),
    };

    match matches.subcommand() {
        Some(("demo", args)) => {
            let authors = *args.get_one::<usize>("authors").unwrap_or(&3);
            let followers = *args.get_one::<usize>("followers").unwrap_or(&5);
            let articles = *args.get_one::<usize>("articles").unwrap_or(&4);
            run_demo(&config, authors, followers, articles).await
        }
        Some(("check-config", _)) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn run_demo(
    config: &PipelineConfig,
    authors: usize,
    followers_per_author: usize,
    articles_per_author: usize,
) -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let index = Arc::new(MemoryIndex::new());

    let sample_follower =
        seed(&store, authors, followers_per_author, articles_per_author).await?;

    let handle = store.handle(Component::FeedMaterializer);
    let feed = FeedMaterializer::new(Arc::new(handle.clone()), Arc::new(handle))
        .with_follower_page_size(config.follower_page_size)
        .with_fan_out_batch(config.fan_out_batch);
    let search = SearchSynchronizer::new(index.clone());
    let dispatcher = ChangeDispatcher::new(feed, search);
    let dead_letter = JsonlDeadLetter::new(&config.dead_letter_path);
    let policy = RetryPolicy::with_max_attempts(config.max_attempts);

    let stream = store.handle(Component::ChangeDispatcher);
    let mut applied = 0;
    let mut dead_lettered = 0;
    loop {
        let batch = stream.next_batch(config.batch_size).await?;
        if batch.is_empty() {
            break;
        }
        let report = run_with_retries(&dispatcher, &batch, policy, &dead_letter).await?;
        applied += report.applied;
        dead_lettered += report.dead_lettered;
    }

    println!("Change log drained");
    println!("  Records applied: {applied}");
    println!("  Dead-lettered: {dead_lettered}");
    println!("  Documents indexed: {}", index.live_count());

    // Show one materialized feed, newest first
    if let Some(user) = sample_follower {
        let reader = store.handle(Component::FeedReader);
        let page = reader.feed_page(user, 5, None).await?;
        println!("  Sample feed for {user} ({} entries shown):", page.entries.len());
        for entry in page.entries {
            println!("    {} at {}", entry.article_id, entry.created_at);
        }
    }

    std::process::exit(if dead_lettered == 0 { 0 } else { 1 });
}

async fn seed(
    store: &Arc<MemoryStore>,
    authors: usize,
    followers_per_author: usize,
    articles_per_author: usize,
) -> anyhow::Result<Option<UserId>> {
    let writer = store.handle(Component::ArticleWriter);
    let follows = store.handle(Component::FollowWriter);
    let mut sample_follower = None;

    for a in 0..authors {
        let author = UserId::new();
        for _ in 0..followers_per_author {
            let follower = UserId::new();
            sample_follower.get_or_insert(follower);
            follows.follow(Follow::new(follower, author)?).await?;
        }
        for n in 0..articles_per_author {
            let article = Article::new(
                author,
                format!("Dispatch Notes {a}-{n}"),
                "how changes travel downstream",
                "ordered log, idempotent sinks",
                vec!["cdc".into()],
            )?;
            writer.put_article(&article).await?;
        }
    }
    Ok(sample_follower)
}
