mod feed;

pub use feed::{Feed, FeedReceiver, Subscription, SubscriptionScope};
