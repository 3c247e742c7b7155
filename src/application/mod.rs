//! # Application Layer
//!
//! Contains the core business logic and orchestration of the board.
//! This includes the submission lifecycle, sequence allocation, comments, rate limiting,
//! notification fanout, conversation sessions and command routing.

pub mod comments;
pub mod fanout;
pub mod lifecycle;
pub mod rate_limiter;
pub mod repo;
pub mod router;
pub mod sequence;
pub mod state;
pub mod text;

#[cfg(test)]
mod scenarios;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::comments::CommentService;
use crate::application::fanout::Fanout;
use crate::application::lifecycle::SubmissionService;
use crate::application::rate_limiter::RateLimiter;
use crate::application::repo::Repository;
use crate::application::sequence::SequenceAllocator;
use crate::application::state::BotState;
use crate::domain::config::AppConfig;
use crate::domain::traits::{Clock, Publisher, Store, Transport};

/// Everything a handler needs, wired once at startup.
pub struct Board {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub allocator: SequenceAllocator,
    pub submissions: SubmissionService,
    pub comments: CommentService,
    pub fanout: Fanout,
    pub state: Arc<Mutex<BotState>>,
}

impl Board {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let attempts = config.policy.allocator_retries;

        let id_key = Repository::id_key(config.board.id_secret.as_deref());
        let repo = Repository::new(store.clone(), clock.clone(), attempts, id_key);
        let allocator = SequenceAllocator::new(store.clone(), attempts);
        let limiter = RateLimiter::new(store, clock);
        let fanout = Fanout::new(transport);
        let submissions = SubmissionService::new(
            repo.clone(),
            allocator.clone(),
            limiter.clone(),
            fanout.clone(),
            publisher,
            config.clone(),
        );
        let comments = CommentService::new(
            repo.clone(),
            limiter,
            fanout.clone(),
            submissions.clone(),
            config.clone(),
        );
        let state = Arc::new(Mutex::new(BotState::new(config.policy.session_ttl_secs)));

        Self {
            config,
            repo,
            allocator,
            submissions,
            comments,
            fanout,
            state,
        }
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.config.is_admin(user)
    }

    pub fn now(&self) -> i64 {
        self.repo.now()
    }
}
