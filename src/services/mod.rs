// Services - business logic between the HTTP boundary and the database

pub mod article_service;
pub mod comment_service;
pub mod comment_view_service;
pub mod taxonomy_service;
pub mod user_service;

pub use article_service::{ArticleInput, ArticleService};
pub use comment_service::{CommentChanges, CommentService, NewComment};
pub use comment_view_service::{CommentView, CommentViewService, MAX_REPLY_DEPTH};
pub use taxonomy_service::{TaxonomyChanges, TaxonomyInput, TaxonomyService};
pub use user_service::{ActivityEntry, NewUser, ProfileChanges, SiteStatistics, UserChanges, UserService};
