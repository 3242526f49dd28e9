//! # agora-pubsub
//!
//! The change-notification fan-out core:
//!
//! - [`topic`]: topic keys (`ballot`, `ballot__12`, `post__hashtag__rust`)
//! - [`router`]: maps change events and subscribe requests onto topics
//! - [`registry`]: which sessions hold which topics, under which request ids
//! - [`session`]: a connected client's outbound handle
//! - [`render`]: per-subscriber payload rendering and visibility
//! - [`dispatcher`]: resolves, renders, and pushes one change
//! - [`feed`]: ordered in-process queue in front of the dispatcher
//!
//! Nothing here knows about WebSockets; `agora-server` owns the transport.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod feed;
pub mod metrics;
pub mod registry;
pub mod render;
pub mod router;
pub mod session;
pub mod topic;

pub use dispatcher::{ChangeDispatcher, DispatchReport};
pub use feed::{ChangeFeed, FeedError, FeedPublisher, FeedWorker};
pub use registry::{RegistryError, Subscriber, SubscriptionRegistry};
pub use render::{
    AllowAll, Authorizer, PolicyAuthorizer, RenderError, Rendered, Renderer, SnapshotRenderer,
    Visibility,
};
pub use router::{RouteError, RouteTable, SubscribeRequest, TopicRouter};
pub use session::{PushError, SessionHandle};
pub use topic::{Topic, TopicSet};
