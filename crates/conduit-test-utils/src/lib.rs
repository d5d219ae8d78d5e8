//! Testing utilities for the Conduit workspace
//!
//! Shared fixtures and seeding helpers.

#![allow(missing_docs)]

use conduit_domain::{Article, Follow, User, UserId};
use conduit_grants::Component;
use conduit_index::MemoryIndex;
use conduit_store::{ArticleStore, FollowStore, MemoryStore, StoreHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A user with a unique username and email
pub fn test_user() -> User {
    let n = unique();
    User::new(
        format!("user-{n}@example.com"),
        format!("user-{n}"),
        "hash",
    )
    .unwrap()
}

/// An article with a unique title, so slugs never collide across fixtures
pub fn test_article(author: UserId) -> Article {
    let n = unique();
    Article::new(
        author,
        format!("Test Article {n}"),
        "a description",
        "a body",
        vec!["test".to_string()],
    )
    .unwrap()
}

/// An article with the given title
pub fn test_article_titled(author: UserId, title: &str) -> Article {
    Article::new(author, title, "a description", "a body", vec![]).unwrap()
}

/// Store plus index plus commonly used handles
pub struct TestBackend {
    pub store: Arc<MemoryStore>,
    pub index: Arc<MemoryIndex>,
    pub writer: StoreHandle,
    pub follows: StoreHandle,
    pub stream: StoreHandle,
    pub reader: StoreHandle,
}

/// Fresh store and index with handles for the usual components
pub fn test_backend() -> TestBackend {
    let store = MemoryStore::new();
    TestBackend {
        writer: store.handle(Component::ArticleWriter),
        follows: store.handle(Component::FollowWriter),
        stream: store.handle(Component::ChangeDispatcher),
        reader: store.handle(Component::FeedReader),
        index: Arc::new(MemoryIndex::new()),
        store,
    }
}

/// Seed `count` followers for `author`, returning them in creation order
pub async fn seed_followers(backend: &TestBackend, author: UserId, count: usize) -> Vec<UserId> {
    let mut followers = Vec::with_capacity(count);
    for _ in 0..count {
        let follower = UserId::new();
        backend
            .follows
            .follow(Follow::new(follower, author).unwrap())
            .await
            .unwrap();
        followers.push(follower);
    }
    followers
}

/// Seed `count` articles by `author`, returning them in creation order
pub async fn seed_articles(backend: &TestBackend, author: UserId, count: usize) -> Vec<Article> {
    let mut articles = Vec::with_capacity(count);
    for _ in 0..count {
        let article = test_article(author);
        backend.writer.put_article(&article).await.unwrap();
        articles.push(article);
    }
    articles
}
