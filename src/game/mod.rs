pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod note;
pub mod scores;
pub mod session;
pub mod timeline;
pub mod timing;
