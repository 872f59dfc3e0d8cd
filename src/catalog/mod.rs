/// Domain managers behind the HTTP surface
pub mod categories;
pub mod comments;
pub mod playlists;
pub mod subscriptions;
pub mod users;
pub mod videos;
pub mod views;

pub use categories::CategoryIndex;
pub use comments::CommentThreads;
pub use playlists::PlaylistLibrary;
pub use subscriptions::SubscriptionManager;
pub use users::UserDirectory;
pub use videos::VideoCatalog;
pub use views::ViewTracker;
