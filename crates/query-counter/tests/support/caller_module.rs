//! Stand-in for application code that issues queries in a loop.

use query_counter::{EventSource, ExecutedStatement};

#[inline(never)]
pub fn load_posts_for_each_user(source: &EventSource, users: usize) {
    for _ in 0..users {
        source.dispatch(&ExecutedStatement::new("SELECT * FROM posts WHERE user_id = $1"));
    }
}

#[inline(never)]
pub fn load_user(source: &EventSource) {
    source.dispatch(&ExecutedStatement::new("SELECT * FROM users WHERE id = $1"));
}
