pub mod app;
pub mod config;
pub mod error;
pub mod state;
pub mod auth {
    pub mod middleware;
    pub mod models;
    pub mod password;
    pub mod session;
}
pub mod db {
    pub mod models;
    pub mod notification_repository;
    pub mod post_repository;
    pub mod session_repository;
    pub mod user_repository;
}
pub mod news {
    pub mod client;
    pub mod importer;
    pub mod migrate;
    pub mod scheduler;
    pub mod tags;
}
pub mod rendering {
    pub mod content;
    pub mod mentions;
}
pub mod api {
    pub mod comments;
    pub mod errors;
    pub mod health;
    pub mod news;
    pub mod notifications;
    pub mod posts;
    pub mod reactions;
    pub mod users;
}

#[cfg(test)]
pub(crate) mod test_support;
